//! RNG driver abstraction and the fill-until-complete loop.
//!
//! Drivers may hand back fewer bytes than asked for. [`fill_random_buffer`]
//! keeps reading until the buffer is exactly full; a driver error ends the
//! phase immediately.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::buffer::RandomBuffer;
use crate::error::{DriverError, Result, TrngError};

/// A hardware random-number source.
///
/// Construction acquires the device and `Drop` releases it.
pub trait RandomSource {
    /// Short name for logs (e.g. `"os"`).
    fn name(&self) -> &'static str;

    /// Write up to `buf.len()` random bytes and return how many were written.
    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DriverError>;
}

/// Collect exactly `len` bytes from `source`.
pub fn fill_random_buffer<S: RandomSource + ?Sized>(
    source: &mut S,
    len: usize,
) -> Result<RandomBuffer> {
    let mut buffer = RandomBuffer::zeroed(len);
    let mut filled = 0;
    let mut reads = 0u32;
    while filled < len {
        let n = source.read(&mut buffer.as_mut_bytes()[filled..])?;
        if n > len - filled {
            return Err(TrngError::Driver(DriverError::new(
                -1,
                format!("driver reported {n} bytes for a {} byte request", len - filled),
            )));
        }
        filled += n;
        reads += 1;
    }
    log::debug!(
        "collected {len} bytes from '{}' in {reads} read(s)",
        source.name()
    );
    Ok(buffer)
}

// ---------------------------------------------------------------------------
// OsTrng
// ---------------------------------------------------------------------------

/// The platform random source, read through `getrandom`.
///
/// `max_read` caps every read so the short-read path is exercised the same
/// way a peripheral with a small FIFO would exercise it.
pub struct OsTrng {
    max_read: usize,
}

impl OsTrng {
    pub fn new(max_read: usize) -> Self {
        log::debug!("trng init: os (max read {max_read})");
        Self {
            max_read: max_read.max(1),
        }
    }
}

impl RandomSource for OsTrng {
    fn name(&self) -> &'static str {
        "os"
    }

    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DriverError> {
        let n = buf.len().min(self.max_read);
        getrandom::fill(&mut buf[..n])
            .map_err(|e| DriverError::new(e.raw_os_error().unwrap_or(-1), e.to_string()))?;
        Ok(n)
    }
}

impl Drop for OsTrng {
    fn drop(&mut self) {
        log::debug!("trng free: os");
    }
}

// ---------------------------------------------------------------------------
// SeededTrng
// ---------------------------------------------------------------------------

/// A driver that reseeds from the same constant every time it is created.
///
/// Each device lifetime therefore replays the same byte stream. Individual
/// buffers look random; the phase-2 concatenation does not.
pub struct SeededTrng {
    rng: StdRng,
    max_read: usize,
}

impl SeededTrng {
    pub fn new(seed: u64, max_read: usize) -> Self {
        log::debug!("trng init: seeded (seed {seed:#x}, max read {max_read})");
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_read: max_read.max(1),
        }
    }
}

impl RandomSource for SeededTrng {
    fn name(&self) -> &'static str {
        "seeded"
    }

    fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DriverError> {
        let n = buf.len().min(self.max_read);
        self.rng.fill_bytes(&mut buf[..n]);
        Ok(n)
    }
}

impl Drop for SeededTrng {
    fn drop(&mut self) {
        log::debug!("trng free: seeded");
    }
}

/// Driver selection, as named on the command line and in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Os,
    Seeded,
}

impl DriverKind {
    /// Acquire a fresh driver handle.
    pub fn open(self, seed: u64, max_read: usize) -> Box<dyn RandomSource> {
        match self {
            Self::Os => Box::new(OsTrng::new(max_read)),
            Self::Seeded => Box::new(SeededTrng::new(seed, max_read)),
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Os => write!(f, "os"),
            Self::Seeded => write!(f, "seeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hands out a scripted sequence of read results.
    struct Scripted {
        steps: Vec<std::result::Result<usize, DriverError>>,
        calls: usize,
    }

    impl RandomSource for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DriverError> {
            let step = self.steps[self.calls].clone();
            self.calls += 1;
            let n = step?;
            buf[..n].fill(0xA5);
            Ok(n)
        }
    }

    #[test]
    fn test_short_reads_accumulate() {
        let mut src = Scripted {
            steps: vec![Ok(3), Ok(0), Ok(4), Ok(1)],
            calls: 0,
        };
        let buf = fill_random_buffer(&mut src, 8).unwrap();
        assert_eq!(buf.len(), 8);
        assert!(buf.as_bytes().iter().all(|&b| b == 0xA5));
        assert_eq!(src.calls, 4);
    }

    #[test]
    fn test_driver_error_mid_loop_aborts() {
        let mut src = Scripted {
            steps: vec![Ok(4), Err(DriverError::new(5, "fifo underrun"))],
            calls: 0,
        };
        let err = fill_random_buffer(&mut src, 8).unwrap_err();
        assert!(matches!(err, TrngError::Driver(DriverError { status: 5, .. })));
    }

    #[test]
    fn test_overlong_read_is_a_driver_error() {
        struct Liar;
        impl RandomSource for Liar {
            fn name(&self) -> &'static str {
                "liar"
            }
            fn read(&mut self, buf: &mut [u8]) -> std::result::Result<usize, DriverError> {
                Ok(buf.len() + 1)
            }
        }
        assert!(matches!(
            fill_random_buffer(&mut Liar, 4),
            Err(TrngError::Driver(_))
        ));
    }

    #[test]
    fn test_os_trng_honours_max_read() {
        let mut src = OsTrng::new(5);
        let mut buf = [0u8; 16];
        assert_eq!(src.read(&mut buf).unwrap(), 5);
        let full = fill_random_buffer(&mut src, 64).unwrap();
        assert_eq!(full.len(), 64);
    }

    #[test]
    fn test_seeded_trng_replays_after_reopen() {
        let a = fill_random_buffer(&mut SeededTrng::new(42, 7), 64).unwrap();
        let b = fill_random_buffer(&mut SeededTrng::new(42, 7), 64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_length_needs_no_reads() {
        let mut src = Scripted {
            steps: vec![],
            calls: 0,
        };
        assert!(fill_random_buffer(&mut src, 0).unwrap().is_empty());
    }
}
