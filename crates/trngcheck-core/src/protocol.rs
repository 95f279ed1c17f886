//! Two-phase reset-boundary protocol.
//!
//! ```text
//! AwaitCommand ──check_step1──▶ RunningStep1 ──reset──▶ (next lifetime)
//! AwaitCommand ──check_step2──▶ RunningStep2 ──────────▶ Done
//! ```
//!
//! Phase 1 samples the driver, checks the sample on its own, persists it and
//! resets. Phase 2 runs in a fresh lifetime: it restores the persisted sample,
//! draws a new one and checks `persisted || fresh`. A driver that replays the
//! same stream after every boot passes phase 1 and fails phase 2.

use std::convert::Infallible;

use crate::buffer::ConcatenatedBuffer;
use crate::channel::MessageChannel;
use crate::config::ProtocolConfig;
use crate::driver::{RandomSource, fill_random_buffer};
use crate::error::{Result, TrngError};
use crate::oracle::{self, Compressor};
use crate::relay::PersistenceRelay;
use crate::reset::DeviceReset;

pub const READY_KEY: &str = "ready";
pub const STEP1_KEY: &str = "check_step1";
pub const STEP2_KEY: &str = "check_step2";
pub const FINISH_KEY: &str = "finish";
pub const SUITE_ENDED_KEY: &str = "Test_suite_ended";
/// Placeholder value for pairs that carry no data.
pub const DUMMY_VALUE: &str = "0";

/// A command received while awaiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Step1,
    /// `payload` is the relayed token in host mode; ignored in store mode.
    Step2 { payload: String },
    Unrecognized { key: String },
}

impl Command {
    pub fn parse(key: &str, value: String) -> Self {
        match key {
            STEP1_KEY => Self::Step1,
            STEP2_KEY => Self::Step2 { payload: value },
            _ => Self::Unrecognized {
                key: key.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitCommand,
    RunningStep1,
    RunningStep2,
    Done,
}

/// How one device lifetime ended, when it did not reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Phase 2 passed. `checked` is the buffer the oracle saw.
    Completed { checked: ConcatenatedBuffer },
    /// The command key matched neither phase and nothing was done.
    Ignored { key: String },
}

/// Everything the device borrows for one lifetime.
pub struct Peripherals<'a> {
    pub source: &'a mut dyn RandomSource,
    pub channel: &'a mut dyn MessageChannel,
    pub relay: &'a mut dyn PersistenceRelay,
    pub reset: &'a mut dyn DeviceReset,
    pub compressor: &'a mut dyn Compressor,
}

/// The device side of the protocol for a single lifetime.
pub struct Device<'a> {
    config: &'a ProtocolConfig,
    io: Peripherals<'a>,
    state: State,
}

impl<'a> Device<'a> {
    pub fn new(config: &'a ProtocolConfig, io: Peripherals<'a>) -> Self {
        Self {
            config,
            io,
            state: State::AwaitCommand,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Announce readiness, take one command and act on it.
    ///
    /// Phase 1 never returns `Ok`: it either resets or fails.
    pub fn run(&mut self) -> Result<Outcome> {
        self.state = State::AwaitCommand;
        self.io.channel.send_pair(READY_KEY, DUMMY_VALUE)?;
        let (key, value) = self
            .io
            .channel
            .receive_pair(self.config.key_max_len, self.config.value_max_len)?;

        match Command::parse(&key, value) {
            Command::Step1 => {
                log::info!("****** {STEP1_KEY} ******");
                self.state = State::RunningStep1;
                match self.run_step1()? {}
            }
            Command::Step2 { payload } => {
                log::info!("****** {STEP2_KEY} ******");
                self.state = State::RunningStep2;
                let checked = self.run_step2(&payload)?;
                self.state = State::Done;
                Ok(Outcome::Completed { checked })
            }
            Command::Unrecognized { key } => {
                log::debug!("ignoring unrecognized command '{key}'");
                Ok(Outcome::Ignored { key })
            }
        }
    }

    fn run_step1(&mut self) -> Result<Infallible> {
        let n = self.config.buffer_len;
        let sample = fill_random_buffer(&mut *self.io.source, n)?;
        oracle::ensure_incompressible(
            &mut *self.io.compressor,
            sample.as_bytes(),
            self.config.threshold_percent,
        )?;
        log::info!("compression of trng buffer did not succeed - trng is successful");

        self.io.relay.save(&mut *self.io.channel, &sample)?;
        self.io.reset.reset();
        log::error!("reset returned control to the device");
        Err(TrngError::ResetNonReturn)
    }

    fn run_step2(&mut self, payload: &str) -> Result<ConcatenatedBuffer> {
        let n = self.config.buffer_len;
        let persisted = self.io.relay.load(payload, n)?;
        let fresh = fill_random_buffer(&mut *self.io.source, n)?;
        let joined = ConcatenatedBuffer::new(&persisted, &fresh)?;
        oracle::ensure_incompressible(
            &mut *self.io.compressor,
            joined.as_bytes(),
            self.config.threshold_percent,
        )?;
        log::info!(
            "compression of {} byte concatenation did not succeed - trng is successful",
            joined.as_bytes().len()
        );
        self.io.channel.send_pair(FINISH_KEY, DUMMY_VALUE)?;
        Ok(joined)
    }
}
