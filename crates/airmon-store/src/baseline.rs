//! Calibration baseline storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use airmon_types::Baseline;

use crate::error::{Error, Result};
use crate::snapshot;

/// The two baseline words plus companion data, as kept in `airmon_config.json`.
///
/// Anything other than `eco2` and `tvoc` belongs to other collaborators (user
/// records, for instance). It is never interpreted here, only carried through
/// load and save unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineStore {
    #[serde(default)]
    eco2: u16,
    #[serde(default)]
    tvoc: u16,
    #[serde(flatten)]
    companion: Map<String, Value>,
}

impl BaselineStore {
    /// An uncalibrated store with no companion data.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored baseline.
    ///
    /// Fails with [`Error::BaselineNotSet`] when either word is zero. The
    /// error carries the stored values, so callers that only want to display
    /// them can still do so.
    pub fn get(&self) -> Result<Baseline> {
        let baseline = Baseline::new(self.eco2, self.tvoc);
        if baseline.is_set() {
            Ok(baseline)
        } else {
            Err(Error::BaselineNotSet(baseline))
        }
    }

    /// Overwrite both words.
    pub fn set(&mut self, eco2: u16, tvoc: u16) {
        self.eco2 = eco2;
        self.tvoc = tvoc;
    }

    /// A companion field by key.
    pub fn companion(&self, key: &str) -> Option<&Value> {
        self.companion.get(key)
    }

    /// Insert or replace a companion field, returning the previous value.
    pub fn set_companion(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.companion.insert(key.into(), value)
    }

    /// Serialize as the `airmon_config.json` object.
    pub fn encode(&self, pretty: bool) -> Result<Vec<u8>> {
        snapshot::to_json(self, pretty)
    }

    /// Parse an `airmon_config.json` object; missing words default to zero.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(Error::Decode)
    }
}
