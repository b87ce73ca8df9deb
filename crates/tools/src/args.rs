//! Loosely-typed tool arguments.
//!
//! Models emit numbers as strings, points as arrays or objects, and deltas in
//! several spellings. Everything is converted into [`ArgValue`] once and read
//! through typed accessors, so downstream code only sees concrete fields.

use crate::error::ActionError;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ArgValue>),
    Object(BTreeMap<String, ArgValue>),
}

impl From<&Value> for ArgValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map(Self::Number).unwrap_or(Self::Null),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from(v)))
                    .collect(),
            ),
        }
    }
}

impl ArgValue {
    /// Numeric view; numeric strings are accepted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ArgValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, ArgValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Point-like value: `[x, y]`, `{x, y}` or `{left, top}`.
    fn as_pair(&self, keys: &[(&str, &str)]) -> Option<(f64, f64)> {
        if let Some([a, b]) = self.as_array() {
            return Some((a.as_f64()?, b.as_f64()?));
        }
        let map = self.as_object()?;
        keys.iter().find_map(|(kx, ky)| {
            let x = map.get(*kx)?.as_f64()?;
            let y = map.get(*ky)?.as_f64()?;
            Some((x, y))
        })
    }
}

const POINT_KEYS: [&str; 4] = ["coordinate", "point", "position", "coordinates"];
const DEFAULT_SCROLL_AMOUNT: f64 = 3.0;

/// Top-level argument object of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs {
    fields: BTreeMap<String, ArgValue>,
}

impl ToolArgs {
    pub fn from_json(input: &Value) -> Result<Self, ActionError> {
        match ArgValue::from(input) {
            ArgValue::Object(fields) => Ok(Self { fields }),
            ArgValue::Null => Ok(Self {
                fields: BTreeMap::new(),
            }),
            _ => Err(ActionError::Malformed(
                "tool input must be a JSON object".into(),
            )),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.fields.get(key).filter(|v| !matches!(v, ArgValue::Null))
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ArgValue::as_str)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ArgValue::as_f64)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ActionError> {
        self.str(key)
            .ok_or_else(|| ActionError::Malformed(format!("missing string field '{}'", key)))
    }

    /// Absolute point, first matching shape wins:
    /// top-level `x`/`y`, then a point key holding an array or object.
    pub fn point(&self) -> Option<(f64, f64)> {
        if let (Some(x), Some(y)) = (self.f64("x"), self.f64("y")) {
            return Some((x, y));
        }
        POINT_KEYS.iter().find_map(|key| {
            self.get(key)?
                .as_pair(&[("x", "y"), ("left", "top")])
        })
    }

    pub fn require_point(&self) -> Result<(f64, f64), ActionError> {
        self.point()
            .ok_or_else(|| ActionError::Malformed("missing or invalid coordinate".into()))
    }

    /// Scroll delta. Explicit `dx`/`dy` win, then a `delta` pair, then
    /// `direction` + `amount`, where up and right are positive.
    pub fn delta(&self) -> Result<(f64, f64), ActionError> {
        let (dx, dy) = (self.f64("dx"), self.f64("dy"));
        if dx.is_some() || dy.is_some() {
            return Ok((dx.unwrap_or(0.0), dy.unwrap_or(0.0)));
        }

        if let Some(pair) = self
            .get("delta")
            .and_then(|v| v.as_pair(&[("dx", "dy"), ("x", "y")]))
        {
            return Ok(pair);
        }

        let direction = self
            .str("direction")
            .or_else(|| self.str("scroll_direction"))
            .ok_or_else(|| ActionError::Malformed("scroll needs dx/dy or a direction".into()))?;
        let amount = self
            .f64("amount")
            .or_else(|| self.f64("scroll_amount"))
            .unwrap_or(DEFAULT_SCROLL_AMOUNT)
            .abs();

        match direction.trim().to_ascii_lowercase().as_str() {
            "up" => Ok((0.0, amount)),
            "down" => Ok((0.0, -amount)),
            "right" => Ok((amount, 0.0)),
            "left" => Ok((-amount, 0.0)),
            other => Err(ActionError::Malformed(format!(
                "unknown scroll direction '{}'",
                other
            ))),
        }
    }
}
