//! Hyperparameter knob declarations
//!
//! A model declares its tunable hyperparameters as a [`KnobConfig`]: a
//! mapping from knob name to a value domain. The config is exported as JSON
//! to an external tuning orchestrator, which samples concrete values and
//! passes them back as a [`KnobSet`] when constructing the model.
//!
//! Domains are immutable once declared. Four kinds are supported:
//!
//! - `Fixed` - a constant the orchestrator must not change
//! - `Float` - a continuous range, optionally log-scaled
//! - `Int` - an inclusive integer range
//! - `Categorical` - an explicit set of choices
//!
//! # Example
//!
//! ```
//! use afinar::knob::{Knob, KnobConfig, KnobValue};
//!
//! let mut config = KnobConfig::new();
//! config.insert("lr", Knob::Float { low: 1e-4, high: 1.0, log_scale: true });
//! config.insert("batch_size", Knob::Categorical(vec![
//!     KnobValue::Int(32), KnobValue::Int(64), KnobValue::Int(128),
//! ]));
//! config.insert("max_epochs", Knob::Fixed(KnobValue::Int(200)));
//!
//! let knobs = config.baseline();
//! assert_eq!(knobs.i64("max_epochs").unwrap(), 200);
//! assert_eq!(knobs.i64("batch_size").unwrap(), 32);
//! ```

mod error;

pub use error::{KnobError, Result};

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete hyperparameter value (declared as fixed, or sampled from a domain)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KnobValue {
    Float(f64),
    Int(i64),
    Str(String),
    Bool(bool),
}

impl KnobValue {
    /// Get as float (converts int to float if needed)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KnobValue::Float(v) => Some(*v),
            KnobValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KnobValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KnobValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            KnobValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for KnobValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnobValue::Float(v) => write!(f, "{v}"),
            KnobValue::Int(v) => write!(f, "{v}"),
            KnobValue::Str(s) => write!(f, "{s}"),
            KnobValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A knob domain (the search space for one hyperparameter)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Knob {
    /// Constant value, not subject to tuning
    Fixed(KnobValue),
    /// Continuous range [low, high], optionally log-scaled
    Float { low: f64, high: f64, log_scale: bool },
    /// Inclusive integer range [low, high]
    Int { low: i64, high: i64 },
    /// Explicit set of choices
    Categorical(Vec<KnobValue>),
}

impl Knob {
    /// Sample a value from this domain (log-uniform for log-scaled floats)
    pub fn sample<R: Rng>(&self, rng: &mut R) -> KnobValue {
        match self {
            Knob::Fixed(value) => value.clone(),
            Knob::Float { low, high, log_scale } => {
                let value = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (log_low + rng.random::<f64>() * (log_high - log_low)).exp()
                } else {
                    low + rng.random::<f64>() * (high - low)
                };
                KnobValue::Float(value)
            }
            Knob::Int { low, high } => {
                let range = (*high - *low + 1) as f64;
                let offset = (rng.random::<f64>() * range).floor() as i64;
                KnobValue::Int((*low + offset).min(*high))
            }
            Knob::Categorical(choices) => {
                let idx = (rng.random::<f64>() * choices.len() as f64).floor() as usize;
                choices[idx.min(choices.len() - 1)].clone()
            }
        }
    }

    /// Deterministic default resolution: the fixed value, the (geometric)
    /// midpoint of a range, or the first categorical choice
    pub fn baseline(&self) -> KnobValue {
        match self {
            Knob::Fixed(value) => value.clone(),
            Knob::Float { low, high, log_scale } => {
                let value = if *log_scale {
                    ((low.ln() + high.ln()) / 2.0).exp()
                } else {
                    (low + high) / 2.0
                };
                KnobValue::Float(value)
            }
            Knob::Int { low, high } => KnobValue::Int(low + (high - low) / 2),
            Knob::Categorical(choices) => choices[0].clone(),
        }
    }

    /// Check if a value lies in this domain
    pub fn is_valid(&self, value: &KnobValue) -> bool {
        match (self, value) {
            (Knob::Fixed(fixed), v) => fixed == v,
            (Knob::Float { low, high, .. }, KnobValue::Float(v)) => *v >= *low && *v <= *high,
            (Knob::Int { low, high }, KnobValue::Int(v)) => *v >= *low && *v <= *high,
            (Knob::Categorical(choices), v) => choices.contains(v),
            _ => false,
        }
    }
}

/// Knob declaration for one model: name -> domain
///
/// This is the contract consumed by the external tuning orchestrator.
/// Serializes to a stable JSON document (names are ordered).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnobConfig {
    knobs: BTreeMap<String, Knob>,
}

impl KnobConfig {
    /// Create an empty knob config
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a knob
    pub fn insert(&mut self, name: &str, knob: Knob) {
        self.knobs.insert(name.to_string(), knob);
    }

    /// Get a knob domain
    pub fn get(&self, name: &str) -> Option<&Knob> {
        self.knobs.get(name)
    }

    /// Number of declared knobs
    pub fn len(&self) -> usize {
        self.knobs.len()
    }

    /// Check if no knobs are declared
    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    /// Iterate over declared knobs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Knob)> {
        self.knobs.iter()
    }

    /// Sample a full configuration
    pub fn sample<R: Rng>(&self, rng: &mut R) -> KnobSet {
        KnobSet {
            values: self
                .knobs
                .iter()
                .map(|(name, knob)| (name.clone(), knob.sample(rng)))
                .collect(),
        }
    }

    /// Resolve every knob to its baseline value
    pub fn baseline(&self) -> KnobSet {
        KnobSet {
            values: self
                .knobs
                .iter()
                .map(|(name, knob)| (name.clone(), knob.baseline()))
                .collect(),
        }
    }

    /// Validate a resolved set against the declared domains
    ///
    /// Every declared knob must be present and in-domain; keys that were
    /// never declared are rejected.
    pub fn validate(&self, set: &KnobSet) -> Result<()> {
        for (name, knob) in &self.knobs {
            match set.values.get(name) {
                Some(value) if knob.is_valid(value) => {}
                Some(value) => {
                    return Err(KnobError::InvalidValue(name.clone(), value.to_string()))
                }
                None => return Err(KnobError::Missing(name.clone())),
            }
        }
        for name in set.values.keys() {
            if !self.knobs.contains_key(name) {
                return Err(KnobError::Unknown(name.clone()));
            }
        }
        Ok(())
    }

    /// Export as a JSON document for the orchestrator
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A resolved set of knob values, as passed to a model constructor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnobSet {
    values: BTreeMap<String, KnobValue>,
}

impl KnobSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any existing one
    pub fn set(&mut self, name: &str, value: KnobValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Builder-style override
    pub fn with(mut self, name: &str, value: KnobValue) -> Self {
        self.set(name, value);
        self
    }

    /// Apply a batch of overrides (e.g. from a trial plan)
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, KnobValue>) {
        for (name, value) in overrides {
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Get a raw value
    pub fn get(&self, name: &str) -> Option<&KnobValue> {
        self.values.get(name)
    }

    /// Iterate over resolved values
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KnobValue)> {
        self.values.iter()
    }

    fn require(&self, name: &str) -> Result<&KnobValue> {
        self.values
            .get(name)
            .ok_or_else(|| KnobError::Missing(name.to_string()))
    }

    /// Get a float knob (int values coerce)
    pub fn f64(&self, name: &str) -> Result<f64> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| KnobError::WrongType(name.to_string(), "float"))
    }

    /// Get an integer knob
    pub fn i64(&self, name: &str) -> Result<i64> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| KnobError::WrongType(name.to_string(), "int"))
    }

    /// Get a non-negative integer knob as usize
    pub fn usize(&self, name: &str) -> Result<usize> {
        let value = self.i64(name)?;
        usize::try_from(value)
            .map_err(|_| KnobError::InvalidValue(name.to_string(), value.to_string()))
    }

    /// Get a bool knob
    pub fn bool(&self, name: &str) -> Result<bool> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| KnobError::WrongType(name.to_string(), "bool"))
    }

    /// Get a string knob
    pub fn str(&self, name: &str) -> Result<&str> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| KnobError::WrongType(name.to_string(), "string"))
    }
}
