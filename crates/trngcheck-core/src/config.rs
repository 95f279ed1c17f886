//! Protocol configuration.
//!
//! Both sides of the reset must run with identical values: the phase-2
//! lifetime trusts that the persisted buffer has the length it was built with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::driver::DriverKind;
use crate::error::{Result, TrngError};
use crate::oracle::DEFAULT_THRESHOLD_PERCENT;
use crate::protocol::{STEP1_KEY, STEP2_KEY};

/// Longest command key the device accepts.
pub const MSG_KEY_LEN: usize = 32;
/// Longest value the device accepts.
pub const MSG_VALUE_LEN: usize = 128;
/// Bytes per random buffer.
pub const BUFFER_LEN: usize = MSG_VALUE_LEN / 2;
/// Store key for the persisted buffer.
pub const STORE_KEY: u16 = 1;
/// Host-side deadline for a whole two-lifetime run.
pub const SUITE_TIMEOUT_SECS: u64 = 100;

/// Where the phase-1 buffer waits out the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    /// Local durable store.
    Store,
    /// Relayed through the host as a codec token.
    Host,
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Host => write!(f, "host"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub key_max_len: usize,
    pub value_max_len: usize,
    pub buffer_len: usize,
    pub threshold_percent: u8,
    pub store_key: u16,
    pub persistence: PersistenceMode,
    pub driver: DriverKind,
    /// Seed for [`DriverKind::Seeded`].
    pub seed: u64,
    /// Upper bound on a single driver read.
    pub max_read: usize,
    /// How long the host waits for both lifetimes before killing the device.
    pub suite_timeout_secs: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            key_max_len: MSG_KEY_LEN,
            value_max_len: MSG_VALUE_LEN,
            buffer_len: BUFFER_LEN,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            store_key: STORE_KEY,
            persistence: PersistenceMode::Host,
            driver: DriverKind::Os,
            seed: 0x5EED,
            max_read: 32,
            suite_timeout_secs: SUITE_TIMEOUT_SECS,
        }
    }
}

impl ProtocolConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    ///
    /// The result is not validated: callers apply their overrides first and
    /// then call [`ProtocolConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrngError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| TrngError::Config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_len == 0 {
            return Err(TrngError::Config("buffer_len must be nonzero".into()));
        }
        if self.suite_timeout_secs == 0 {
            return Err(TrngError::Config("suite_timeout_secs must be nonzero".into()));
        }
        if !(1..=100).contains(&self.threshold_percent) {
            return Err(TrngError::Config(format!(
                "threshold_percent must be 1..=100, got {}",
                self.threshold_percent
            )));
        }
        for key in [STEP1_KEY, STEP2_KEY] {
            if key.len() > self.key_max_len {
                return Err(TrngError::Config(format!(
                    "command key '{key}' exceeds key_max_len {}",
                    self.key_max_len
                )));
            }
        }
        if self.persistence == PersistenceMode::Host {
            let needed = codec::encoded_len(self.buffer_len);
            if needed > self.value_max_len {
                return Err(TrngError::Config(format!(
                    "host relay needs {needed} symbols for a {} byte buffer, value_max_len is {}",
                    self.buffer_len, self.value_max_len
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ProtocolConfig::default();
        assert_eq!(config.buffer_len, 64);
        assert_eq!(config.threshold_percent, 99);
        config.validate().unwrap();
    }

    #[test]
    fn test_host_mode_bounds_buffer_len() {
        let config = ProtocolConfig {
            buffer_len: 256,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(TrngError::Config(_))));

        let store = ProtocolConfig {
            buffer_len: 256,
            persistence: PersistenceMode::Store,
            ..Default::default()
        };
        store.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_threshold_and_empty_buffer() {
        for config in [
            ProtocolConfig {
                threshold_percent: 0,
                ..Default::default()
            },
            ProtocolConfig {
                threshold_percent: 101,
                ..Default::default()
            },
            ProtocolConfig {
                buffer_len: 0,
                ..Default::default()
            },
            ProtocolConfig {
                key_max_len: 4,
                ..Default::default()
            },
            ProtocolConfig {
                suite_timeout_secs: 0,
                ..Default::default()
            },
        ] {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trng.json");
        std::fs::write(&path, r#"{"persistence": "store", "driver": "seeded"}"#).unwrap();
        let config = ProtocolConfig::load(&path).unwrap();
        assert_eq!(config.persistence, PersistenceMode::Store);
        assert_eq!(config.driver, DriverKind::Seeded);
        assert_eq!(config.buffer_len, BUFFER_LEN);
        assert_eq!(config.suite_timeout_secs, SUITE_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trng.json");
        std::fs::write(&path, r#"{"buffer_len": 256, "threshold_percent": 0}"#).unwrap();

        let mut config = ProtocolConfig::load(&path).unwrap();
        assert!(config.validate().is_err());

        config.persistence = PersistenceMode::Store;
        config.threshold_percent = 99;
        config.validate().unwrap();
    }

    #[test]
    fn test_load_rejects_unknown_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trng.json");
        std::fs::write(&path, r#"{"persistence": "flash"}"#).unwrap();
        assert!(matches!(
            ProtocolConfig::load(&path),
            Err(TrngError::Config(_))
        ));
    }
}
