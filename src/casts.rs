//! Validated scalar casts.
//!
//! These are the only places where untyped external input (XML text, or text
//! handed to one of the entity setters) is turned into typed property values.
//! Every function passes `None` through unchanged and fails fast on anything
//! that does not represent the target domain.

use crate::error::{Error, Result};
use std::fmt::Display;

/// Casts text to a boolean.
///
/// Accepts `"0"`, `"1"`, `"true"` and `"false"`, ignoring surrounding
/// whitespace.
pub fn bool_cast(value: Option<&str>) -> Result<Option<bool>> {
    match value.map(str::trim) {
        None => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(other) => Err(Error::InvalidBool(other.to_string())),
    }
}

/// Casts an integer to a boolean. Only 0 and 1 are accepted.
pub fn bool_from_int(value: Option<i64>) -> Result<Option<bool>> {
    match value {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(other) => Err(Error::InvalidBool(other.to_string())),
    }
}

/// Casts decimal text to an integer of type `T`.
///
/// The text must be an optional leading `-` followed by at least one ASCII
/// digit, with optional surrounding whitespace. Values that do not fit in
/// `T` are rejected.
pub fn int_cast<T>(value: Option<&str>) -> Result<Option<T>>
where
    T: TryFrom<i128>,
{
    let Some(text) = value.map(str::trim) else {
        return Ok(None);
    };
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidInteger(text.to_string()));
    }
    let wide: i128 = text
        .parse()
        .map_err(|_| Error::InvalidInteger(text.to_string()))?;
    T::try_from(wide)
        .map(Some)
        .map_err(|_| Error::InvalidInteger(text.to_string()))
}

/// Casts text to a byte string by UTF-8 encoding it.
pub fn bytes_cast(value: Option<&str>) -> Option<Vec<u8>> {
    value.map(|s| s.as_bytes().to_vec())
}

/// Textual representation of any displayable value.
pub fn str_cast<T: Display>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_cast() {
        assert_eq!(bool_cast(None).unwrap(), None);
        assert_eq!(bool_cast(Some("1")).unwrap(), Some(true));
        assert_eq!(bool_cast(Some("0")).unwrap(), Some(false));
        assert_eq!(bool_cast(Some("true")).unwrap(), Some(true));
        assert_eq!(bool_cast(Some(" 1\n")).unwrap(), Some(true));
        assert!(matches!(bool_cast(Some("yes")), Err(Error::InvalidBool(_))));
        assert!(bool_cast(Some("2")).is_err());
        assert!(bool_cast(Some("")).is_err());
    }

    #[test]
    fn test_bool_from_int() {
        assert_eq!(bool_from_int(Some(1)).unwrap(), Some(true));
        assert_eq!(bool_from_int(Some(0)).unwrap(), Some(false));
        assert!(bool_from_int(Some(7)).is_err());
    }

    #[test]
    fn test_int_cast() {
        assert_eq!(int_cast::<i64>(None).unwrap(), None);
        assert_eq!(int_cast::<i64>(Some("42")).unwrap(), Some(42));
        assert_eq!(int_cast::<i64>(Some("-17")).unwrap(), Some(-17));
        assert_eq!(int_cast::<u32>(Some("\n 512 \n")).unwrap(), Some(512));
        assert_eq!(
            int_cast::<u64>(Some("18446744073709551615")).unwrap(),
            Some(u64::MAX)
        );
        assert!(int_cast::<i64>(Some("12a")).is_err());
        assert!(int_cast::<i64>(Some("-")).is_err());
        assert!(int_cast::<i64>(Some("+5")).is_err());
        assert!(int_cast::<u32>(Some("-1")).is_err());
        assert!(int_cast::<u8>(Some("256")).is_err());
    }

    #[test]
    fn test_bytes_and_str_cast() {
        assert_eq!(bytes_cast(Some("ab")), Some(b"ab".to_vec()));
        assert_eq!(bytes_cast(None), None);
        assert_eq!(str_cast(Some(12)), Some("12".to_string()));
        assert_eq!(str_cast::<u8>(None), None);
    }
}
