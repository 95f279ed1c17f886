//! Carry the phase-1 buffer across the reset.
//!
//! Two implementations behind one trait, chosen by configuration:
//! - [`StoreRelay`] writes to a local durable store.
//! - [`HostRelay`] encodes the buffer and hands it to the host, which sends it
//!   back as the payload of the phase-2 command.

use crate::buffer::RandomBuffer;
use crate::channel::MessageChannel;
use crate::codec;
use crate::error::{Result, TrngError};
use crate::store::DurableStore;

/// Key the host relay uses for the encoded buffer. Distinct from every
/// command key.
pub const BUFFER_KEY: &str = "buffer";

/// Persists exactly one buffer from phase 1 to phase 2.
pub trait PersistenceRelay {
    fn name(&self) -> &'static str;

    /// Store `buffer` so the next device lifetime can read it.
    fn save(&mut self, channel: &mut dyn MessageChannel, buffer: &RandomBuffer) -> Result<()>;

    /// Restore a `len`-byte buffer. `payload` is the value that arrived with
    /// the phase-2 command; relays that do not use it ignore it.
    fn load(&mut self, payload: &str, len: usize) -> Result<RandomBuffer>;
}

// ---------------------------------------------------------------------------
// StoreRelay
// ---------------------------------------------------------------------------

pub struct StoreRelay<S> {
    store: S,
    key: u16,
}

impl<S: DurableStore> StoreRelay<S> {
    pub fn new(store: S, key: u16) -> Self {
        Self { store, key }
    }
}

impl<S: DurableStore> PersistenceRelay for StoreRelay<S> {
    fn name(&self) -> &'static str {
        "store"
    }

    fn save(&mut self, _channel: &mut dyn MessageChannel, buffer: &RandomBuffer) -> Result<()> {
        self.store.set(self.key, buffer.as_bytes())?;
        log::info!("saved {} byte buffer under store key {}", buffer.len(), self.key);
        Ok(())
    }

    fn load(&mut self, _payload: &str, len: usize) -> Result<RandomBuffer> {
        let mut bytes = vec![0u8; len];
        let actual = self.store.get(self.key, &mut bytes).map_err(|e| {
            TrngError::PersistenceMismatch(format!("store key {}: {e}", self.key))
        })?;
        if actual != len {
            return Err(TrngError::PersistenceMismatch(format!(
                "store key {} holds {actual} bytes, expected {len}",
                self.key
            )));
        }
        Ok(RandomBuffer::from_bytes(bytes))
    }
}

// ---------------------------------------------------------------------------
// HostRelay
// ---------------------------------------------------------------------------

/// Round-trips the buffer through the host as a codec token.
pub struct HostRelay {
    value_max_len: usize,
}

impl HostRelay {
    pub fn new(value_max_len: usize) -> Self {
        Self { value_max_len }
    }
}

impl PersistenceRelay for HostRelay {
    fn name(&self) -> &'static str {
        "host"
    }

    fn save(&mut self, channel: &mut dyn MessageChannel, buffer: &RandomBuffer) -> Result<()> {
        let token = codec::encode(buffer.as_bytes());
        if token.len() > self.value_max_len {
            return Err(TrngError::Config(format!(
                "{} byte buffer encodes to {} symbols, value limit is {}",
                buffer.len(),
                token.len(),
                self.value_max_len
            )));
        }
        channel.send_pair(BUFFER_KEY, &token)?;
        log::info!("relayed {} byte buffer to host as {} symbols", buffer.len(), token.len());
        Ok(())
    }

    fn load(&mut self, payload: &str, len: usize) -> Result<RandomBuffer> {
        let mut bytes = codec::decode(payload);
        if bytes.len() < len {
            return Err(TrngError::PersistenceMismatch(format!(
                "host payload decodes to {} bytes, expected {len}",
                bytes.len()
            )));
        }
        bytes.truncate(len);
        Ok(RandomBuffer::from_bytes(bytes))
    }
}
