//! Bare-expression wrapping heuristic (spec.md §4.3).

const STATEMENT_KEYWORDS: &[&str] = &[
    "def", "class", "if", "for", "while", "try", "with", "import", "from",
    "return", "raise", "print", "pass", "global", "nonlocal", "del",
    "assert", "yield", "async", "await",
];

/// Wrap `fragment` as `print(fragment)` if it is heuristically a single bare
/// expression. Multi-line fragments and fragments starting with a statement
/// keyword or an assignment pass through unchanged.
pub fn wrap_if_expression(fragment: &str) -> String {
    if is_bare_expression(fragment) {
        format!("print({fragment})")
    } else {
        fragment.to_string()
    }
}

fn is_bare_expression(fragment: &str) -> bool {
    if fragment.trim().is_empty() {
        return false;
    }
    if fragment.contains('\n') {
        return false;
    }
    let trimmed = fragment.trim_start();
    if starts_with_keyword(trimmed) {
        return false;
    }
    if looks_like_assignment(trimmed) {
        return false;
    }
    true
}

fn starts_with_keyword(text: &str) -> bool {
    STATEMENT_KEYWORDS.iter().any(|kw| {
        text.strip_prefix(kw)
            .map(|rest| rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_'))
            .unwrap_or(false)
    })
}

/// Recognizes `x = ...` and augmented assignment (`x += 1`, ...) as
/// statements; leaves comparison operators (`==`, `!=`, `<=`, `>=`) and the
/// walrus operator (`:=`) alone since those occur inside expressions.
fn looks_like_assignment(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            if bytes.get(i + 1) == Some(&b'=') {
                i += 2;
                continue;
            }
            let prev = if i > 0 { bytes[i - 1] } else { 0 };
            if matches!(prev, b'=' | b'!' | b'<' | b'>' | b':') {
                i += 1;
                continue;
            }
            return true;
        }
        i += 1;
    }
    false
}
