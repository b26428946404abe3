//! Node parameters.
//!
//! Every node kind declares a fixed set of parameter names with defaults
//! when it is built. Updates can change the values of declared names but
//! never add or drop a name.

use core::fmt;
use core::str::FromStr;

use delegate::delegate;

/// A single parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Number(f32),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Number(_) => None,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Number(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v as f32)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<Waveform> for ParamValue {
    fn from(w: Waveform) -> Self {
        ParamValue::Text(w.as_str().to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Oscillator wave shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }
}

impl FromStr for Waveform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            other => Err(format!("unknown waveform '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Entry {
    name: &'static str,
    default: ParamValue,
    value: ParamValue,
}

/// Outcome of writing one value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Update {
    Changed,
    Unchanged,
    Unknown,
}

/// The declared parameters of a node, in declaration order.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Parameters {
    entries: Vec<Entry>,
}

impl Parameters {
    /// Declare a parameter set. Every value starts at its default.
    pub fn declare<I>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, ParamValue)>,
    {
        let entries = defaults
            .into_iter()
            .map(|(name, default)| Entry {
                name,
                value: default.clone(),
                default,
            })
            .collect();
        Self { entries }
    }

    delegate! {
        to self.entries {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entry(name).map(|e| &e.value)
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        self.get(name).and_then(ParamValue::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_text)
    }

    pub fn default_of(&self, name: &str) -> Option<&ParamValue> {
        self.entry(name).map(|e| &e.default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> + '_ {
        self.entries.iter().map(|e| (e.name, &e.value))
    }

    /// Every declared name paired with its default value.
    pub fn defaults(&self) -> Vec<(&'static str, ParamValue)> {
        self.entries
            .iter()
            .map(|e| (e.name, e.default.clone()))
            .collect()
    }

    pub(crate) fn write(&mut self, name: &str, value: &ParamValue) -> Update {
        match self.entries.iter_mut().find(|e| e.name == name) {
            None => Update::Unknown,
            Some(e) if e.value == *value => Update::Unchanged,
            Some(e) => {
                e.value = value.clone();
                Update::Changed
            }
        }
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }
}
