//! Compression-based randomness oracle.
//!
//! A buffer passes when the compressor cannot squeeze it into
//! `threshold_percent` of its own length. Any structure a real TRNG should not
//! have (repeats, bias, a second half that mirrors the first) shows up as a
//! successful compression.

use flate2::{Compress, Compression, FlushCompress, Status};

use crate::error::{Result, TrngError};

/// Threshold used by both protocol phases unless configured otherwise.
pub const DEFAULT_THRESHOLD_PERCENT: u8 = 99;

/// A compression routine with caller-owned scratch state.
pub trait Compressor {
    /// Compress `input` into `output`.
    ///
    /// Returns the compressed size, or 0 if the result does not fit in
    /// `output.len()` bytes. Scratch state is reset before every call so
    /// verdicts never depend on call history.
    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize>;
}

/// Raw DEFLATE (no zlib header) at maximum effort.
///
/// The `flate2::Compress` stream owns the match-finder hash tables; one
/// instance is reused across calls and reset to a zeroed state each time.
pub struct DeflateCompressor {
    engine: Compress,
}

impl DeflateCompressor {
    pub fn new() -> Self {
        Self {
            engine: Compress::new(Compression::best(), false),
        }
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for DeflateCompressor {
    fn compress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.engine.reset();
        loop {
            let consumed = self.engine.total_in() as usize;
            let produced = self.engine.total_out() as usize;
            let status = self.engine.compress(
                &input[consumed..],
                &mut output[produced..],
                FlushCompress::Finish,
            )?;
            if status == Status::StreamEnd {
                return Ok(self.engine.total_out() as usize);
            }
            let progressed = self.engine.total_in() as usize != consumed
                || self.engine.total_out() as usize != produced;
            if self.engine.total_out() as usize >= output.len() || !progressed {
                return Ok(0);
            }
        }
    }
}

/// Outcome of one oracle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Did not fit within the threshold. The buffer behaves as random.
    Incompressible,
    /// Fit within the threshold. The buffer has exploitable structure.
    Compressible { size: usize },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Incompressible)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incompressible => write!(f, "incompressible"),
            Self::Compressible { size } => write!(f, "compressible ({size} bytes)"),
        }
    }
}

/// Output capacity granted to the compressor for a `len`-byte input.
pub fn capacity_for(len: usize, threshold_percent: u8) -> usize {
    len * threshold_percent as usize / 100
}

/// Run the compressor against `buffer` with an output capped at
/// `threshold_percent` of its length.
pub fn check<C: Compressor + ?Sized>(
    compressor: &mut C,
    buffer: &[u8],
    threshold_percent: u8,
) -> Result<Verdict> {
    let mut out = vec![0u8; capacity_for(buffer.len(), threshold_percent)];
    let size = compressor.compress(buffer, &mut out)?;
    let verdict = if size == 0 {
        Verdict::Incompressible
    } else {
        Verdict::Compressible { size }
    };
    log::debug!(
        "oracle: {} bytes at {}% (capacity {}) -> {}",
        buffer.len(),
        threshold_percent,
        out.len(),
        verdict
    );
    Ok(verdict)
}

/// [`check`], turning a compressible verdict into [`TrngError::OracleFailure`].
pub fn ensure_incompressible<C: Compressor + ?Sized>(
    compressor: &mut C,
    buffer: &[u8],
    threshold_percent: u8,
) -> Result<()> {
    match check(compressor, buffer, threshold_percent)? {
        Verdict::Incompressible => Ok(()),
        Verdict::Compressible { size } => Err(TrngError::OracleFailure {
            len: buffer.len(),
            compressed: size,
            capacity: capacity_for(buffer.len(), threshold_percent),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn random_bytes(seed: u64, n: usize) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut buf = vec![0u8; n];
        rng.fill_bytes(&mut buf);
        buf
    }

    #[test]
    fn test_zero_buffer_is_compressible() {
        let mut c = DeflateCompressor::new();
        let verdict = check(&mut c, &[0u8; 64], 99).unwrap();
        assert!(matches!(verdict, Verdict::Compressible { size } if size > 0 && size <= 63));
    }

    #[test]
    fn test_random_buffer_is_incompressible() {
        let mut c = DeflateCompressor::new();
        for seed in 0..32 {
            let data = random_bytes(seed, 64);
            assert_eq!(check(&mut c, &data, 99).unwrap(), Verdict::Incompressible);
        }
    }

    #[test]
    fn test_verdict_is_deterministic_across_reuse() {
        let mut c = DeflateCompressor::new();
        let zeros = [0u8; 64];
        let noise = random_bytes(7, 64);
        let first = check(&mut c, &zeros, 99).unwrap();
        let _ = check(&mut c, &noise, 99).unwrap();
        assert_eq!(check(&mut c, &zeros, 99).unwrap(), first);
        assert_eq!(check(&mut c, &noise, 99).unwrap(), Verdict::Incompressible);
    }

    #[test]
    fn test_repeated_halves_are_compressible() {
        let mut c = DeflateCompressor::new();
        let half = random_bytes(11, 64);
        let mut doubled = half.clone();
        doubled.extend_from_slice(&half);
        assert!(!check(&mut c, &doubled, 99).unwrap().passed());
    }

    #[test]
    fn test_independent_halves_are_incompressible() {
        let mut c = DeflateCompressor::new();
        let data = random_bytes(12, 128);
        assert!(check(&mut c, &data, 99).unwrap().passed());
    }

    #[test]
    fn test_ensure_reports_sizes() {
        let mut c = DeflateCompressor::new();
        match ensure_incompressible(&mut c, &[0u8; 64], 99) {
            Err(TrngError::OracleFailure { len, capacity, .. }) => {
                assert_eq!(len, 64);
                assert_eq!(capacity, 63);
            }
            other => panic!("expected oracle failure, got {other:?}"),
        }
    }

    #[test]
    fn test_capacity_rounds_down() {
        assert_eq!(capacity_for(64, 99), 63);
        assert_eq!(capacity_for(128, 99), 126);
        assert_eq!(capacity_for(0, 99), 0);
    }
}
