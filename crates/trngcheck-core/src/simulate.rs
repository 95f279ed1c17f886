//! Both device lifetimes in one process.
//!
//! Each lifetime gets a freshly opened driver, a fresh channel and a fresh
//! compressor. The only thing carried from the first lifetime to the second is
//! what the relay persisted: the store contents, or the token the device sent
//! to the host. The reset itself is a [`SimulatedReset`] unwind caught here.

use std::panic::{self, AssertUnwindSafe};

use crate::buffer::ConcatenatedBuffer;
use crate::channel::MemoryChannel;
use crate::config::{PersistenceMode, ProtocolConfig};
use crate::driver::RandomSource;
use crate::error::{Result, TrngError};
use crate::oracle::DeflateCompressor;
use crate::protocol::{DUMMY_VALUE, Device, Outcome, Peripherals, STEP1_KEY, STEP2_KEY};
use crate::relay::{BUFFER_KEY, HostRelay, PersistenceRelay, StoreRelay};
use crate::reset::{SimulatedReset, is_reset_signal};
use crate::store::MemoryStore;

/// What each lifetime produced.
#[derive(Debug)]
pub struct SimulationReport {
    /// `Ok` once phase 1 passed its check and reset.
    pub step1: Result<()>,
    /// `None` when phase 1 failed and phase 2 never ran.
    pub step2: Option<Result<ConcatenatedBuffer>>,
    /// The token relayed through the host, in host mode.
    pub token: Option<String>,
}

impl SimulationReport {
    pub fn passed(&self) -> bool {
        self.step1.is_ok() && matches!(self.step2, Some(Ok(_)))
    }
}

enum Lifetime {
    Reset,
    Returned(Result<Outcome>),
}

/// Run phase 1, reset, then phase 2, opening a new driver for each lifetime.
pub fn run_two_phase<F>(config: &ProtocolConfig, mut open_driver: F) -> Result<SimulationReport>
where
    F: FnMut() -> Box<dyn RandomSource>,
{
    config.validate()?;
    let mut store = MemoryStore::new();

    log::info!("simulated lifetime 1: {STEP1_KEY}");
    let mut channel = MemoryChannel::new();
    channel.push_inbound(STEP1_KEY, DUMMY_VALUE);
    let mut driver = open_driver();
    let first = run_lifetime(config, driver.as_mut(), &mut channel, &mut store);
    drop(driver);

    let step1 = match first {
        Lifetime::Reset => Ok(()),
        Lifetime::Returned(Err(e)) => Err(e),
        Lifetime::Returned(Ok(outcome)) => Err(TrngError::Protocol(format!(
            "phase 1 returned {outcome:?} instead of resetting"
        ))),
    };
    if step1.is_err() {
        return Ok(SimulationReport {
            step1,
            step2: None,
            token: None,
        });
    }

    let token = match config.persistence {
        PersistenceMode::Host => Some(
            channel
                .last_sent(BUFFER_KEY)
                .ok_or_else(|| TrngError::Protocol("phase 1 reset without relaying its buffer".into()))?
                .to_string(),
        ),
        PersistenceMode::Store => None,
    };

    log::info!("simulated lifetime 2: {STEP2_KEY}");
    let mut channel = MemoryChannel::new();
    channel.push_inbound(STEP2_KEY, token.as_deref().unwrap_or(DUMMY_VALUE));
    let mut driver = open_driver();
    let second = run_lifetime(config, driver.as_mut(), &mut channel, &mut store);

    let step2 = match second {
        Lifetime::Returned(Ok(Outcome::Completed { checked })) => Ok(checked),
        Lifetime::Returned(Ok(Outcome::Ignored { key })) => Err(TrngError::Protocol(format!(
            "phase 2 ignored command '{key}'"
        ))),
        Lifetime::Returned(Err(e)) => Err(e),
        Lifetime::Reset => Err(TrngError::Protocol("phase 2 requested a reset".into())),
    };

    Ok(SimulationReport {
        step1,
        step2: Some(step2),
        token,
    })
}

fn run_lifetime(
    config: &ProtocolConfig,
    source: &mut dyn RandomSource,
    channel: &mut MemoryChannel,
    store: &mut MemoryStore,
) -> Lifetime {
    let mut host_relay;
    let mut store_relay;
    let relay: &mut dyn PersistenceRelay = match config.persistence {
        PersistenceMode::Host => {
            host_relay = HostRelay::new(config.value_max_len);
            &mut host_relay
        }
        PersistenceMode::Store => {
            store_relay = StoreRelay::new(&mut *store, config.store_key);
            &mut store_relay
        }
    };
    let mut reset = SimulatedReset;
    let mut compressor = DeflateCompressor::new();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        Device::new(
            config,
            Peripherals {
                source,
                channel,
                relay,
                reset: &mut reset,
                compressor: &mut compressor,
            },
        )
        .run()
    }));

    match result {
        Ok(returned) => Lifetime::Returned(returned),
        Err(payload) if is_reset_signal(payload.as_ref()) => Lifetime::Reset,
        Err(payload) => panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{OsTrng, SeededTrng};

    #[test]
    fn test_host_mode_passes_with_os_driver() {
        let config = ProtocolConfig::default();
        let report = run_two_phase(&config, || Box::new(OsTrng::new(16))).unwrap();
        assert!(report.passed(), "{report:?}");
        assert_eq!(report.token.as_deref().map(str::len), Some(88));
    }

    #[test]
    fn test_store_mode_passes_with_os_driver() {
        let config = ProtocolConfig {
            persistence: PersistenceMode::Store,
            ..Default::default()
        };
        let report = run_two_phase(&config, || Box::new(OsTrng::new(64))).unwrap();
        assert!(report.passed(), "{report:?}");
        assert!(report.token.is_none());
    }

    #[test]
    fn test_reseeding_driver_fails_phase_two() {
        let config = ProtocolConfig::default();
        let report = run_two_phase(&config, || Box::new(SeededTrng::new(0xBAD, 16))).unwrap();
        assert!(report.step1.is_ok());
        assert!(matches!(
            report.step2,
            Some(Err(TrngError::OracleFailure { len: 128, .. }))
        ));
        assert!(!report.passed());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let config = ProtocolConfig {
            buffer_len: 0,
            ..Default::default()
        };
        assert!(run_two_phase(&config, || Box::new(OsTrng::new(16))).is_err());
    }
}
