//! Device state as read over the wire.
//!
//! A [`Snapshot`] is one read of the effect list; [`Statistics`] is one read
//! of the device's resource counters. Both are immutable once decoded.
//!
//! The device names the effect list `Effects` and the selected index
//! `currentEffect`; the decoder accepts those as well as `effects` and
//! `currentEffectIndex`. Unknown keys on an effect are kept, in wire order, as
//! stat fields.

use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// StatValue / StatFields
// ---------------------------------------------------------------------------

/// Value of one named stat field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Text(String),
    Flag(bool),
    /// Present on the wire as `null`; excluded from charting.
    Missing,
}

impl StatValue {
    /// Numeric value, if this field can be charted.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl From<Value> for StatValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Flag(b),
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) => Self::Text(s),
            nested @ (Value::Array(_) | Value::Object(_)) => Self::Text(nested.to_string()),
        }
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Ordered set of named stat fields. Order is the order seen on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatFields(Vec<(String, StatValue)>);

impl StatFields {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&StatValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Insert or replace a field, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<StatValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of these fields without the names in `ignored`.
    pub fn without(&self, ignored: &[String]) -> Self {
        self.0
            .iter()
            .filter(|(n, _)| !ignored.iter().any(|i| i == n))
            .cloned()
            .collect()
    }

    /// Copy restricted to `allowed`; an empty allow-list keeps everything.
    pub fn only(&self, allowed: &[String]) -> Self {
        if allowed.is_empty() {
            return self.clone();
        }
        self.0
            .iter()
            .filter(|(n, _)| allowed.iter().any(|a| a == n))
            .cloned()
            .collect()
    }
}

impl FromIterator<(String, StatValue)> for StatFields {
    fn from_iter<I: IntoIterator<Item = (String, StatValue)>>(iter: I) -> Self {
        let mut fields = Self::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

impl From<Map<String, Value>> for StatFields {
    fn from(map: Map<String, Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, StatValue::from(v))).collect()
    }
}

impl Serialize for StatFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StatFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from)
    }
}

/// Anything that carries chartable stat fields.
pub trait StatSource {
    fn stat_fields(&self) -> &StatFields;
}

static NO_FIELDS: StatFields = StatFields::new();

// ---------------------------------------------------------------------------
// Effect / Snapshot
// ---------------------------------------------------------------------------

/// One selectable effect on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub enabled: bool,
    #[serde(flatten)]
    pub stats: StatFields,
}

impl Effect {
    /// Display name, falling back to the position in the list.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("effect #{index}"))
    }
}

impl StatSource for Effect {
    fn stat_fields(&self) -> &StatFields {
        &self.stats
    }
}

/// Point-in-time read of the effect list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(alias = "Effects")]
    pub effects: Vec<Effect>,
    #[serde(alias = "currentEffect")]
    pub current_effect_index: usize,
    /// Milliseconds each effect runs before the device advances.
    pub effect_interval: u64,
    /// Milliseconds until the device advances on its own.
    pub milliseconds_remaining: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_count: Option<usize>,
}

impl Snapshot {
    /// Decode a snapshot from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(body)
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    pub fn current_effect(&self) -> Option<&Effect> {
        self.effects.get(self.current_effect_index)
    }

    pub fn enabled_effects(&self) -> usize {
        self.enabled_count
            .unwrap_or_else(|| self.effects.iter().filter(|e| e.enabled).count())
    }
}

impl StatSource for Snapshot {
    /// Stat fields of the effect currently running.
    fn stat_fields(&self) -> &StatFields {
        self.current_effect().map_or(&NO_FIELDS, |e| &e.stats)
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Flat resource counters reported by the device (`/getStatistics`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics {
    pub fields: StatFields,
}

impl Statistics {
    pub fn from_json(body: &[u8]) -> Result<Self, GatewayError> {
        serde_json::from_slice(body)
            .map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

impl StatSource for Statistics {
    fn stat_fields(&self) -> &StatFields {
        &self.fields
    }
}
