pub mod check;
pub mod codec;
pub mod device;
pub mod host;
pub mod simulate;

use std::path::Path;

use trngcheck_core::{DriverKind, PersistenceMode, ProtocolConfig, TrngError};

use crate::ProtocolArgs;

/// Store file used when `--store` is not given.
pub const DEFAULT_STORE_PATH: &str = "trngcheck-nvstore.json";

/// Build the effective config, exiting with a message if it is unusable.
pub fn load_config(args: &ProtocolArgs) -> ProtocolConfig {
    match build_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// `--config` file (or defaults) with command-line overrides applied.
pub fn build_config(args: &ProtocolArgs) -> Result<ProtocolConfig, TrngError> {
    let mut config = match &args.config {
        Some(path) => ProtocolConfig::load(Path::new(path))?,
        None => ProtocolConfig::default(),
    };

    if let Some(p) = &args.persistence {
        config.persistence = parse_persistence(p)?;
    }
    if let Some(d) = &args.driver {
        config.driver = parse_driver(d)?;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_read) = args.max_read {
        config.max_read = max_read;
    }
    if let Some(len) = args.buffer_len {
        config.buffer_len = len;
    }
    if let Some(t) = args.threshold {
        config.threshold_percent = t;
    }
    if let Some(secs) = args.suite_timeout {
        config.suite_timeout_secs = secs;
    }

    config.validate()?;
    Ok(config)
}

pub fn parse_persistence(s: &str) -> Result<PersistenceMode, TrngError> {
    match s {
        "store" => Ok(PersistenceMode::Store),
        "host" => Ok(PersistenceMode::Host),
        other => Err(TrngError::Config(format!("unknown persistence '{other}'"))),
    }
}

pub fn parse_driver(s: &str) -> Result<DriverKind, TrngError> {
    match s {
        "os" => Ok(DriverKind::Os),
        "seeded" => Ok(DriverKind::Seeded),
        other => Err(TrngError::Config(format!("unknown driver '{other}'"))),
    }
}

/// Protocol arguments that reproduce `config` exactly, via a config file.
pub fn config_args(config_path: &Path) -> Vec<String> {
    vec!["--config".into(), config_path.display().to_string()]
}
