use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{GuideError, Result};

/// The only value shapes a template context may hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<TemplateValue>),
    Map(BTreeMap<String, TemplateValue>),
}

impl TemplateValue {
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Insert into a map value; other variants are left untouched.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TemplateValue>) -> Self {
        if let Self::Map(entries) = &mut self {
            entries.insert(key.into(), value.into());
        }
        self
    }

    /// Falsy: null, false, 0, "", empty list, empty map.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Self::String(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Child by map key or list index.
    pub fn get(&self, key: &str) -> Option<&TemplateValue> {
        match self {
            Self::Map(entries) => entries.get(key),
            Self::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text substituted for `{{name}}`. Lists and maps render as JSON.
    pub fn render_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Convert a TOML value, rejecting types templates cannot hold.
    pub fn from_toml(key: &str, value: toml::Value) -> Result<Self> {
        Ok(match value {
            toml::Value::String(s) => Self::String(s),
            toml::Value::Integer(i) => Self::from(i),
            toml::Value::Float(f) => number_from_f64(key, f)?,
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_toml(&format!("{}.{}", key, i), item))
                    .collect::<Result<_>>()?,
            ),
            toml::Value::Table(table) => Self::Map(
                table
                    .into_iter()
                    .map(|(k, v)| {
                        let child = Self::from_toml(&format!("{}.{}", key, k), v)?;
                        Ok((k, child))
                    })
                    .collect::<Result<_>>()?,
            ),
            toml::Value::Datetime(dt) => {
                return Err(GuideError::InvalidContextValue {
                    key: key.to_string(),
                    reason: format!(
                        "TOML datetime {} is not a template value; quote it as a string",
                        dt
                    ),
                })
            }
        })
    }
}

fn number_from_f64(key: &str, f: f64) -> Result<TemplateValue> {
    serde_json::Number::from_f64(f)
        .map(TemplateValue::Number)
        .ok_or_else(|| GuideError::InvalidContextValue {
            key: key.to_string(),
            reason: format!("{} is not a finite number", f),
        })
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => {
                Self::Map(entries.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for TemplateValue {
    fn from(i: i64) -> Self {
        Self::Number(i.into())
    }
}

impl From<u64> for TemplateValue {
    fn from(u: u64) -> Self {
        Self::Number(u.into())
    }
}

impl From<u32> for TemplateValue {
    fn from(u: u32) -> Self {
        Self::Number(u.into())
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, TemplateValue>> for TemplateValue {
    fn from(entries: BTreeMap<String, TemplateValue>) -> Self {
        Self::Map(entries)
    }
}
