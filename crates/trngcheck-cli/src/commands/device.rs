//! One device lifetime on stdin/stdout.
//!
//! Stdout carries only `{{key;value}}` pairs; everything human-readable goes
//! through the logger to stderr. A phase-1 run that passes ends the process
//! with [`RESET_EXIT_CODE`](trngcheck_core::RESET_EXIT_CODE) and never
//! reports a suite result.

use std::io;

use trngcheck_core::protocol::SUITE_ENDED_KEY;
use trngcheck_core::{
    DeflateCompressor, Device, FailurePolicy, FileStore, Harness, HostRelay, MessageChannel,
    Outcome, Peripherals, PersistenceMode, PersistenceRelay, ProcessReset, ProtocolConfig,
    StoreRelay, TextChannel,
};

pub fn run(config: &ProtocolConfig, store_path: &str) {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut channel = TextChannel::new(stdin.lock(), stdout.lock());

    let mut source = config.driver.open(config.seed, config.max_read);
    let mut relay: Box<dyn PersistenceRelay> = match config.persistence {
        PersistenceMode::Store => Box::new(StoreRelay::new(
            FileStore::open(store_path),
            config.store_key,
        )),
        PersistenceMode::Host => Box::new(HostRelay::new(config.value_max_len)),
    };
    let mut reset = ProcessReset;
    let mut compressor = DeflateCompressor::new();

    log::info!(
        "device lifetime: driver={} persistence={} relay={}",
        config.driver,
        config.persistence,
        relay.name()
    );

    let mut harness = Harness::new();
    harness.case("TRNG: trng_test", FailurePolicy::Continue, || {
        let outcome = Device::new(
            config,
            Peripherals {
                source: source.as_mut(),
                channel: &mut channel,
                relay: relay.as_mut(),
                reset: &mut reset,
                compressor: &mut compressor,
            },
        )
        .run()?;
        if let Outcome::Ignored { key } = outcome {
            log::warn!("command '{key}' matched no phase; nothing was checked");
        }
        Ok(())
    });
    let summary = harness.run();

    let verdict = if summary.success() { "pass" } else { "fail" };
    if let Err(e) = channel.send_pair(SUITE_ENDED_KEY, verdict) {
        eprintln!("Error reporting suite result: {e}");
        std::process::exit(1);
    }

    if !summary.success() {
        std::process::exit(1);
    }
}
