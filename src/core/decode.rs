//! Cell decoding.
//!
//! Converts the textual cell of a result table into a typed value. The set of
//! supported targets is closed over the [`Decode`] trait, so asking for an
//! unsupported type fails to compile rather than at runtime.

use std::str::FromStr;
use thiserror::Error;

/// Failure to turn one cell into a typed value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("NULL cannot be decoded as {target}")]
    UnexpectedNull { target: &'static str },

    #[error("'{text}' is not a valid {target}: {reason}")]
    Invalid {
        target: &'static str,
        text: String,
        reason: String,
    },

    #[error("empty text cannot be decoded as {target}")]
    Empty { target: &'static str },
}

/// A type a cell can be decoded into.
pub trait Decode: Sized {
    /// Human readable target name used in errors.
    const TARGET: &'static str;

    fn decode(cell: Option<&str>) -> Result<Self, DecodeError>;
}

fn require<'a>(cell: Option<&'a str>, target: &'static str) -> Result<&'a str, DecodeError> {
    cell.ok_or(DecodeError::UnexpectedNull { target })
}

fn parse<T>(cell: Option<&str>, target: &'static str) -> Result<T, DecodeError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = require(cell, target)?;
    text.trim().parse().map_err(|e: T::Err| DecodeError::Invalid {
        target,
        text: text.to_string(),
        reason: e.to_string(),
    })
}

macro_rules! impl_decode_parse {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl Decode for $ty {
                const TARGET: &'static str = $name;

                fn decode(cell: Option<&str>) -> Result<Self, DecodeError> {
                    parse(cell, Self::TARGET)
                }
            }
        )*
    };
}

impl_decode_parse! {
    i8 => "byte",
    i16 => "short",
    i32 => "integer",
    i64 => "long",
    u64 => "unsigned long",
    f32 => "float",
    f64 => "double",
}

impl Decode for String {
    const TARGET: &'static str = "string";

    fn decode(cell: Option<&str>) -> Result<Self, DecodeError> {
        require(cell, Self::TARGET).map(str::to_string)
    }
}

impl Decode for bool {
    const TARGET: &'static str = "boolean";

    /// `true` (any case), `t` and `1` are truthy; any other text is false.
    fn decode(cell: Option<&str>) -> Result<Self, DecodeError> {
        let text = require(cell, Self::TARGET)?;
        Ok(text.eq_ignore_ascii_case("true") || text == "t" || text == "1")
    }
}

impl Decode for char {
    const TARGET: &'static str = "character";

    fn decode(cell: Option<&str>) -> Result<Self, DecodeError> {
        let text = require(cell, Self::TARGET)?;
        text.chars().next().ok_or(DecodeError::Empty {
            target: Self::TARGET,
        })
    }
}

impl<T: Decode> Decode for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn decode(cell: Option<&str>) -> Result<Self, DecodeError> {
        match cell {
            None => Ok(None),
            Some(_) => T::decode(cell).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_numbers() {
        assert_eq!(i32::decode(Some("12")).unwrap(), 12);
        assert_eq!(i64::decode(Some(" -7 ")).unwrap(), -7);
        assert_eq!(i16::decode(Some("300")).unwrap(), 300);
        assert_eq!(i8::decode(Some("-3")).unwrap(), -3);
        assert_eq!(f64::decode(Some("1.5")).unwrap(), 1.5);
        assert!(matches!(
            i8::decode(Some("300")),
            Err(DecodeError::Invalid { target: "byte", .. })
        ));
    }

    #[test]
    fn test_decode_bool() {
        for truthy in ["true", "TRUE", "t", "1"] {
            assert!(bool::decode(Some(truthy)).unwrap(), "{truthy}");
        }
        for falsy in ["false", "f", "0", "yes"] {
            assert!(!bool::decode(Some(falsy)).unwrap(), "{falsy}");
        }
    }

    #[test]
    fn test_decode_char() {
        assert_eq!(char::decode(Some("éa")).unwrap(), 'é');
        assert_eq!(
            char::decode(Some("")),
            Err(DecodeError::Empty {
                target: "character"
            })
        );
    }

    #[test]
    fn test_decode_null() {
        assert_eq!(Option::<i32>::decode(None).unwrap(), None);
        assert_eq!(Option::<i32>::decode(Some("4")).unwrap(), Some(4));
        assert_eq!(
            i32::decode(None),
            Err(DecodeError::UnexpectedNull { target: "integer" })
        );
        assert!(String::decode(None).is_err());
    }

    #[test]
    fn test_require_borrows_cell() {
        let owned = String::from(" 12 ");
        let text = require(Some(owned.as_str()), "integer").unwrap();
        assert!(std::ptr::eq(text, owned.as_str()));
        assert_eq!(
            require(None, "text"),
            Err(DecodeError::UnexpectedNull { target: "text" })
        );
    }
}
