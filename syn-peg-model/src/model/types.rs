use itertools::Itertools;
use std::fmt;

/// The value domain shared by grammar literals, matcher input and rule results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    Char(char),
    Str(String),
    List(Vec<Value>),
    /// Ordered key/value pairs. Keys are expected to be unique.
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Builds an object value from key/value pairs, keeping their order.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Explodes text into a stream of `Char` values.
    pub fn chars(text: &str) -> Vec<Value> {
        text.chars().map(Value::Char).collect()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Looks up a property of an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Concatenates a list of characters and strings into one string.
    /// Returns `None` if any element is neither.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Char(c) => Some(c.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::List(items) => items.iter().map(Value::to_text).collect(),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Char(c) => write!(f, "{:?}", c),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Object(fields) => write!(
                f,
                "{{{}}}",
                fields
                    .iter()
                    .format_with(", ", |(k, v), g| g(&format_args!("{}: {}", k, v)))
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_source_form() {
        let v = Value::object([("a", Value::Int(1)), ("b", Value::from("x"))]);
        assert_eq!(v.to_string(), r#"{a: 1, b: "x"}"#);
        assert_eq!(Value::List(Value::chars("ab")).to_string(), "['a', 'b']");
    }

    #[test]
    fn test_to_text_flattens_characters() {
        let v = Value::List(vec![Value::Char('a'), Value::from("bc")]);
        assert_eq!(v.to_text().as_deref(), Some("abc"));
        assert_eq!(Value::List(vec![Value::Int(1)]).to_text(), None);
    }
}
