//! A tiny subset-of-Python evaluator — just enough arithmetic, assignment,
//! and `print()` to drive the end-to-end scenarios in spec.md §8 against a
//! fake device. Not a Python interpreter; a scripted stand-in for one.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub stdout: String,
    pub error: Option<String>,
}

/// Execute `fragment` line-by-line against the device's persistent `vars`,
/// accumulating `print(...)` output. An undefined name is reported as a
/// `NameError` traceback with the 1-based line number it occurred on,
/// matching a real device's raw-REPL error report shape.
pub fn evaluate(fragment: &str, vars: &mut HashMap<String, i64>) -> EvalOutcome {
    let mut stdout = String::new();
    for (idx, line) in fragment.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(call) = line.strip_prefix("print(").and_then(|s| s.strip_suffix(')')) {
            match eval_value(call, vars) {
                Ok(v) => {
                    stdout.push_str(&v);
                    stdout.push('\n');
                }
                Err(name) => return name_error(&name, line_no),
            }
            continue;
        }
        if let Some((name, rhs)) = split_assignment(line) {
            match eval_expr(rhs, vars) {
                Ok(v) => {
                    vars.insert(name.to_string(), v);
                }
                Err(name) => return name_error(&name, line_no),
            }
            continue;
        }
        // A bare expression the caller sent unwrapped (shouldn't normally
        // happen — wrap_if_expression handles this on the host side — but
        // evaluate it anyway so a direct fragment still behaves sensibly).
        if let Err(name) = eval_expr(line, vars) {
            return name_error(&name, line_no);
        }
    }
    EvalOutcome { stdout: stdout.trim_end_matches('\n').to_string(), error: None }
}

fn name_error(name: &str, line_no: usize) -> EvalOutcome {
    EvalOutcome {
        stdout: String::new(),
        error: Some(format!(
            "Traceback (most recent call last):\n  File \"<stdin>\", line {line_no}, in <module>\nNameError: name '{name}' is not defined"
        )),
    }
}

fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let eq = line.find('=')?;
    if line.as_bytes().get(eq + 1) == Some(&b'=') || (eq > 0 && line.as_bytes()[eq - 1] == b'!') {
        return None; // `==` or `!=`
    }
    let (name, rhs) = (line[..eq].trim(), line[eq + 1..].trim());
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((name, rhs))
}

fn eval_value(token: &str, vars: &HashMap<String, i64>) -> Result<String, String> {
    if let Some(literal) = string_literal(token) {
        return Ok(literal.to_string());
    }
    eval_expr(token, vars).map(|v| v.to_string())
}

fn string_literal(token: &str) -> Option<&str> {
    let token = token.trim();
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'\'' && last == b'\'') || (first == b'"' && last == b'"') {
            return Some(&token[1..token.len() - 1]);
        }
    }
    None
}

/// Evaluate a left-to-right chain of `+ - * /` over integer literals and
/// variable names. Returns the offending identifier as `Err` on lookup
/// failure, so the caller can shape a `NameError`.
fn eval_expr(expr: &str, vars: &HashMap<String, i64>) -> Result<i64, String> {
    let expr = expr.trim();
    let mut acc: Option<i64> = None;
    let mut op = '+';
    for token in tokenize(expr) {
        if let Some(v) = parse_operand(&token, vars)? {
            acc = Some(match acc {
                None => v,
                Some(a) => apply(a, op, v),
            });
        } else {
            op = token.chars().next().unwrap_or('+');
        }
    }
    acc.ok_or_else(|| expr.to_string())
}

fn apply(a: i64, op: char, b: i64) -> i64 {
    match op {
        '+' => a + b,
        '-' => a - b,
        '*' => a * b,
        '/' => a / b,
        _ => b,
    }
}

fn parse_operand(token: &str, vars: &HashMap<String, i64>) -> Result<Option<i64>, String> {
    if matches!(token, "+" | "-" | "*" | "/") {
        return Ok(None);
    }
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Some(n));
    }
    vars.get(token).copied().map(Some).ok_or_else(|| token.to_string())
}

/// Split `"x*y"` / `"1 + 1"` into alternating operand/operator tokens.
fn tokenize(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in expr.chars() {
        if matches!(c, '+' | '-' | '*' | '/') {
            if !current.trim().is_empty() {
                tokens.push(current.trim().to_string());
            }
            tokens.push(c.to_string());
            current = String::new();
        } else {
            current.push(c);
        }
    }
    if !current.trim().is_empty() {
        tokens.push(current.trim().to_string());
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_bare_arithmetic_wrapped_as_print() {
        let mut vars = HashMap::new();
        let out = evaluate("print(1+1)", &mut vars);
        assert_eq!(out.stdout, "2");
        assert!(out.error.is_none());
    }

    #[test]
    fn multi_statement_block_assigns_and_prints() {
        let mut vars = HashMap::new();
        let out = evaluate("x=7\ny=6\nprint(x*y)", &mut vars);
        assert_eq!(out.stdout, "42");
        assert_eq!(vars.get("x"), Some(&7));
    }

    #[test]
    fn undefined_name_raises_name_error_with_line_number() {
        let mut vars = HashMap::new();
        let out = evaluate("print(x)", &mut vars);
        let error = out.error.unwrap();
        assert!(error.contains("NameError"));
        assert!(error.contains("line 1"));
    }

    #[test]
    fn accumulates_across_calls_via_shared_vars() {
        let mut vars = HashMap::new();
        evaluate("a=1", &mut vars);
        evaluate("b=2", &mut vars);
        let out = evaluate("print(a+b)", &mut vars);
        assert_eq!(out.stdout, "3");
    }

    #[test]
    fn string_literal_passes_through_unevaluated() {
        let mut vars = HashMap::new();
        let out = evaluate("print('Traceback')", &mut vars);
        assert_eq!(out.stdout, "Traceback");
        assert!(out.error.is_none());
    }
}
