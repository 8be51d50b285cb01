//! Result converter (spec.md §4.7): turns a device's raw text result into a
//! host-typed value. Grounded on `rt-protocol`'s serde-first approach to
//! wire-text-to-typed-value conversion.

use thiserror::Error;

/// Raised when `text` cannot be converted to the requested type.
#[derive(Debug, Error)]
#[error("failed to convert '{text}' to {target_type}: {cause}")]
pub struct ConversionFailed {
    pub text: String,
    pub target_type: &'static str,
    pub cause: String,
}

impl ConversionFailed {
    fn new(text: &str, target_type: &'static str, cause: impl ToString) -> ConversionFailed {
        ConversionFailed { text: text.to_string(), target_type, cause: cause.to_string() }
    }
}

/// Implemented by every type `convert` can produce.
pub trait ConvertText: Sized {
    fn convert_text(text: &str) -> Result<Self, ConversionFailed>;
}

/// Convert `text` to `T`. Pure function, no I/O.
pub fn convert<T: ConvertText>(text: &str) -> Result<T, ConversionFailed> {
    T::convert_text(text)
}

/// Marker for structured record types converted via JSON rather than
/// primitive parsing. Implement this (it requires nothing beyond
/// `Deserialize`) to opt a type into `convert::<T>`.
pub trait JsonRecord: serde::de::DeserializeOwned {}

impl<T: JsonRecord> ConvertText for T {
    fn convert_text(text: &str) -> Result<T, ConversionFailed> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConversionFailed::new(text, "json", "empty text"));
        }
        serde_json::from_str(trimmed).map_err(|e| ConversionFailed::new(text, "json", e))
    }
}

impl ConvertText for i64 {
    fn convert_text(text: &str) -> Result<i64, ConversionFailed> {
        text.trim().parse().map_err(|e| ConversionFailed::new(text, "int", e))
    }
}

impl ConvertText for f64 {
    fn convert_text(text: &str) -> Result<f64, ConversionFailed> {
        text.trim().parse().map_err(|e| ConversionFailed::new(text, "float", e))
    }
}

impl ConvertText for bool {
    fn convert_text(text: &str) -> Result<bool, ConversionFailed> {
        match text.trim() {
            "True" | "true" => Ok(true),
            "False" | "false" => Ok(false),
            other => Err(ConversionFailed::new(other, "bool", "expected True/False or true/false")),
        }
    }
}

impl ConvertText for String {
    fn convert_text(text: &str) -> Result<String, ConversionFailed> {
        Ok(text.trim().to_string())
    }
}

/// Represents the device returning no value (`ResultRecord.value == ""`).
impl ConvertText for () {
    fn convert_text(text: &str) -> Result<(), ConversionFailed> {
        if text.trim().is_empty() {
            Ok(())
        } else {
            Err(ConversionFailed::new(text, "()", "expected empty text"))
        }
    }
}

impl<T: ConvertText> ConvertText for Option<T> {
    fn convert_text(text: &str) -> Result<Option<T>, ConversionFailed> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            T::convert_text(text).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reading {
        temp: f64,
        humidity: f64,
    }
    impl JsonRecord for Reading {}

    #[test]
    fn converts_int() {
        assert_eq!(convert::<i64>("42").unwrap(), 42);
    }

    #[test]
    fn converts_float() {
        assert_eq!(convert::<f64>("3.5").unwrap(), 3.5);
    }

    #[test]
    fn converts_bool_both_cases() {
        assert_eq!(convert::<bool>("True").unwrap(), true);
        assert_eq!(convert::<bool>("false").unwrap(), false);
    }

    #[test]
    fn converts_string_trims() {
        assert_eq!(convert::<String>("  hi  ").unwrap(), "hi");
    }

    #[test]
    fn empty_text_converts_to_none_for_option() {
        assert_eq!(convert::<Option<i64>>("").unwrap(), None);
        assert_eq!(convert::<Option<i64>>("7").unwrap(), Some(7));
    }

    #[test]
    fn empty_text_converts_to_unit() {
        assert!(convert::<()>("").is_ok());
        assert!(convert::<()>("x").is_err());
    }

    #[test]
    fn converts_json_record() {
        let got: Reading = convert("{\"temp\": 21.5, \"humidity\": 40.0}").unwrap();
        assert_eq!(got, Reading { temp: 21.5, humidity: 40.0 });
    }

    #[test]
    fn invalid_int_fails_with_cause() {
        let err = convert::<i64>("not a number").unwrap_err();
        assert_eq!(err.target_type, "int");
    }

    #[test]
    fn empty_json_record_fails() {
        assert!(convert::<Reading>("").is_err());
    }
}
