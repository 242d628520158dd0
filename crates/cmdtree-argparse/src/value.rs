use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// A decoded argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// An optional argument that was neither given nor defaulted.
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Absent => "nothing",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::UInt(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Path(_) => "path",
            Self::List(_) => "list",
        }
    }

    /// Render a scalar back into the text a user would type for it.
    pub fn to_raw(&self) -> Option<String> {
        match self {
            Self::Absent | Self::List(_) => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(n) => Some(n.to_string()),
            Self::UInt(n) => Some(n.to_string()),
            Self::Float(n) => Some(n.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Path(p) => Some(p.display().to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<PathBuf> for Value {
    fn from(v: PathBuf) -> Self {
        Self::Path(v)
    }
}

type DecodeFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;
type EncodeFn = dyn Fn(&Value) -> Option<String> + Send + Sync;

/// Converts raw argument text into a [`Value`], and optionally back.
///
/// Parsers are cheap to clone and shared read-only between parse calls.
#[derive(Clone)]
pub struct ValueParser {
    name: String,
    decode: Arc<DecodeFn>,
    encode: Arc<EncodeFn>,
    possible_values: Vec<String>,
}

impl fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueParser")
            .field("name", &self.name)
            .field("possible_values", &self.possible_values)
            .finish_non_exhaustive()
    }
}

impl Default for ValueParser {
    fn default() -> Self {
        Self::string()
    }
}

impl ValueParser {
    /// Build a parser from a decode closure. Encoding falls back to
    /// [`Value::to_raw`].
    pub fn custom<F>(name: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            decode: Arc::new(decode),
            encode: Arc::new(Value::to_raw),
            possible_values: Vec::new(),
        }
    }

    /// Replace the encoder used to turn values back into raw text.
    pub fn with_encoder<F>(mut self, encode: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.encode = Arc::new(encode);
        self
    }

    pub fn string() -> Self {
        Self::custom("string", |raw| Ok(Value::Str(raw.to_string())))
    }

    pub fn int() -> Self {
        Self::from_str::<i64>("integer")
    }

    pub fn uint() -> Self {
        Self::from_str::<u64>("unsigned integer")
    }

    pub fn float() -> Self {
        Self::from_str::<f64>("float")
    }

    /// `true` / `false` literals.
    pub fn boolean() -> Self {
        Self::from_str::<bool>("boolean")
    }

    pub fn path() -> Self {
        Self::custom("path", |raw| {
            if raw.is_empty() {
                Err("path cannot be empty".to_string())
            } else {
                Ok(Value::Path(PathBuf::from(raw)))
            }
        })
    }

    /// Accept only one of `values` (exact, case-sensitive).
    pub fn choice<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let allowed = values.clone();
        let mut parser = Self::custom("choice", move |raw| {
            if allowed.iter().any(|v| v == raw) {
                Ok(Value::Str(raw.to_string()))
            } else {
                Err(format!("possible values: {}", allowed.join(", ")))
            }
        });
        parser.possible_values = values;
        parser
    }

    /// Decode through `T: FromStr`, storing the result as the matching
    /// [`Value`] variant.
    pub fn from_str<T>(name: impl Into<String>) -> Self
    where
        T: FromStr + Into<Value> + 'static,
        T::Err: fmt::Display,
    {
        Self::custom(name, |raw| {
            raw.parse::<T>()
                .map(Into::into)
                .map_err(|err| err.to_string())
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn possible_values(&self) -> &[String] {
        &self.possible_values
    }

    pub fn decode(&self, raw: &str) -> Result<Value, String> {
        (self.decode)(raw)
    }

    pub fn encode(&self, value: &Value) -> Option<String> {
        (self.encode)(value)
    }
}

/// Typed extraction from a decoded [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, found: &Value) -> String {
    format!("expected {expected}, found {}", found.type_name())
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Path(p) => Ok(p.display().to_string()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromValue for PathBuf {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Path(p) => Ok(p.clone()),
            Value::Str(s) => Ok(PathBuf::from(s)),
            other => Err(mismatch("path", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(n) => Ok(*n),
            Value::Int(n) => Ok(*n as f64),
            Value::UInt(n) => Ok(*n as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

macro_rules! int_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self, String> {
                    match value {
                        Value::Int(n) => <$ty>::try_from(*n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        Value::UInt(n) => <$ty>::try_from(*n)
                            .map_err(|_| format!("{n} is out of range for {}", stringify!($ty))),
                        other => Err(mismatch("integer", other)),
                    }
                }
            }
        )*
    };
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Absent => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Absent => Ok(Vec::new()),
            Value::List(items) => items.iter().map(T::from_value).collect(),
            other => T::from_value(other).map(|v| vec![v]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_parsers_round_trip() {
        let cases = [
            (ValueParser::string(), "hello"),
            (ValueParser::int(), "-42"),
            (ValueParser::uint(), "7"),
            (ValueParser::boolean(), "true"),
            (ValueParser::path(), "out/file.txt"),
        ];
        for (parser, raw) in cases {
            let value = parser.decode(raw).unwrap();
            assert_eq!(parser.encode(&value).as_deref(), Some(raw), "{}", parser.name());
        }
    }

    #[test]
    fn choice_rejects_unknown_values() {
        let parser = ValueParser::choice(["plain", "json"]);
        assert_eq!(parser.decode("json").unwrap(), Value::Str("json".to_string()));
        let err = parser.decode("xml").unwrap_err();
        assert!(err.contains("plain, json"), "{err}");
        assert_eq!(parser.possible_values(), ["plain", "json"]);
    }

    #[test]
    fn int_parser_reports_reason() {
        let err = ValueParser::int().decode("twelve").unwrap_err();
        assert!(err.contains("invalid digit"), "{err}");
    }

    #[test]
    fn from_value_conversions() {
        assert_eq!(u8::from_value(&Value::Int(12)), Ok(12));
        assert!(u8::from_value(&Value::Int(-1)).is_err());
        assert_eq!(Option::<String>::from_value(&Value::Absent), Ok(None));
        assert_eq!(
            Vec::<i64>::from_value(&Value::List(vec![Value::Int(1), Value::Int(2)])),
            Ok(vec![1, 2])
        );
        assert!(bool::from_value(&Value::Str("true".to_string())).is_err());
    }
}
