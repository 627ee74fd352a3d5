//! Statement model: text plus positional arguments.

use std::fmt;
use std::sync::Arc;

/// A single positional statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Int(i32),
    Long(i64),
    Short(i16),
    Byte(i8),
    Double(f64),
    Float(f32),
    Bool(bool),
    Char(char),
}

impl Value {
    /// Parse a literal typed on the command line.
    ///
    /// `null` (any case) becomes [`Value::Null`], integers become [`Value::Long`],
    /// decimals become [`Value::Double`], and anything else is kept as text.
    pub fn parse_literal(input: &str) -> Self {
        if input.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Ok(n) = input.parse::<i64>() {
            return Value::Long(n);
        }
        if let Ok(f) = input.parse::<f64>() {
            if f.is_finite() {
                return Value::Double(f);
            }
        }
        Value::Text(input.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Short(n) => write!(f, "{}", n),
            Value::Byte(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", c),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    String => Text,
    i32 => Int,
    i64 => Long,
    i16 => Short,
    i8 => Byte,
    f64 => Double,
    f32 => Float,
    bool => Bool,
    char => Char,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a `Vec<Value>` from heterogeneous arguments.
///
/// ```
/// use dbaction::args;
/// let args = args![12, "test", None::<i32>];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::models::query::Value>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::models::query::Value::from($arg)),+]
    };
}

/// An immutable statement: text plus ordered arguments.
///
/// The text is shared, so [`Query::with_args`] is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    text: Arc<str>,
    args: Arc<[Value]>,
}

impl Query {
    pub fn new(text: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            text: Arc::from(text.into()),
            args: Arc::from(args),
        }
    }

    /// A statement without arguments.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// Same statement text, new arguments.
    pub fn with_args(&self, args: Vec<Value>) -> Self {
        Self {
            text: Arc::clone(&self.text),
            args: Arc::from(args),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::text_only(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::text_only(text)
    }
}
