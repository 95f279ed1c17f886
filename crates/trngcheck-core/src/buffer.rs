//! Fixed-length sample buffers.

use crate::error::{Result, TrngError};

/// Exactly `len` bytes, all of them produced by the RNG driver or restored
/// verbatim from the persistence relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomBuffer(Box<[u8]>);

impl RandomBuffer {
    /// Wrap bytes that are already complete.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    pub(crate) fn zeroed(len: usize) -> Self {
        Self(vec![0u8; len].into_boxed_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsRef<[u8]> for RandomBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// `persisted || fresh`, the input of the phase-2 check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcatenatedBuffer(Vec<u8>);

impl ConcatenatedBuffer {
    /// Lay the persisted buffer first and the fresh one after it.
    pub fn new(persisted: &RandomBuffer, fresh: &RandomBuffer) -> Result<Self> {
        if persisted.len() != fresh.len() {
            return Err(TrngError::PersistenceMismatch(format!(
                "persisted half is {} bytes, fresh half is {}",
                persisted.len(),
                fresh.len()
            )));
        }
        let mut joined = Vec::with_capacity(persisted.len() * 2);
        joined.extend_from_slice(persisted.as_bytes());
        joined.extend_from_slice(fresh.as_bytes());
        Ok(Self(joined))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The persisted half.
    pub fn head(&self) -> &[u8] {
        &self.0[..self.0.len() / 2]
    }

    /// The freshly generated half.
    pub fn tail(&self) -> &[u8] {
        &self.0[self.0.len() / 2..]
    }
}
