//! # trngcheck-core
//!
//! **Does your TRNG survive a reboot?**
//!
//! A hardware random source can look perfectly random inside one boot and
//! still replay the same stream after every reset. `trngcheck-core` checks
//! both, with a two-phase protocol that straddles a device reset:
//!
//! 1. Phase 1 draws `N` bytes, checks they do not compress, persists them and
//!    resets the device.
//! 2. Phase 2, in a fresh lifetime, restores those bytes, draws `N` more and
//!    checks that the `2N`-byte concatenation does not compress either.
//!
//! ## Quick Start
//!
//! ```no_run
//! use trngcheck_core::{DriverKind, ProtocolConfig, simulate};
//!
//! let config = ProtocolConfig::default();
//! let report = simulate::run_two_phase(&config, || DriverKind::Os.open(0, 32)).unwrap();
//! assert!(report.passed());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RandomSource → RandomBuffer → oracle ──pass──▶ PersistenceRelay → DeviceReset
//!                                                     │
//!                 next lifetime ◀─────────────────────┘
//! PersistenceRelay + RandomSource → ConcatenatedBuffer → oracle
//! ```
//!
//! The relay either writes to a [`DurableStore`] or, when the target has no
//! durable storage, encodes the buffer with [`codec`] and relays it through
//! the host over the [`MessageChannel`].

pub mod buffer;
pub mod channel;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod harness;
pub mod oracle;
pub mod protocol;
pub mod relay;
pub mod reset;
pub mod simulate;
pub mod store;

pub use buffer::{ConcatenatedBuffer, RandomBuffer};
pub use channel::{MemoryChannel, MessageChannel, TextChannel};
pub use config::{PersistenceMode, ProtocolConfig};
pub use driver::{DriverKind, OsTrng, RandomSource, SeededTrng, fill_random_buffer};
pub use error::{DriverError, StoreError, TrngError};
pub use harness::{FailurePolicy, Harness, Summary};
pub use oracle::{Compressor, DeflateCompressor, Verdict};
pub use protocol::{Command, Device, Outcome, Peripherals, State};
pub use relay::{HostRelay, PersistenceRelay, StoreRelay};
pub use reset::{DeviceReset, ProcessReset, SimulatedReset, RESET_EXIT_CODE};
pub use store::{DurableStore, FileStore, MemoryStore};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
