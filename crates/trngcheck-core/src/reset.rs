//! Device reset.
//!
//! A reset ends the current device lifetime. Nothing in memory survives it;
//! only the persistence relay links one lifetime to the next.

use std::io::Write;

/// Exit status a process-backed device uses to signal "reset requested".
pub const RESET_EXIT_CODE: i32 = 3;

/// Restarts the device.
///
/// Implementations must not return. A caller that regains control after
/// `reset` reports [`crate::TrngError::ResetNonReturn`].
pub trait DeviceReset {
    fn reset(&mut self);
}

/// Ends the process with [`RESET_EXIT_CODE`]; the supervising host starts
/// the next lifetime.
pub struct ProcessReset;

impl DeviceReset for ProcessReset {
    fn reset(&mut self) {
        log::info!("resetting device");
        let _ = std::io::stdout().flush();
        std::process::exit(RESET_EXIT_CODE);
    }
}

/// Unwind payload used by [`SimulatedReset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSignal;

/// Unwinds out of the running lifetime with a [`ResetSignal`] payload.
///
/// Uses `resume_unwind`, so no panic hook runs. The in-process simulator
/// catches the payload and starts the next lifetime.
pub struct SimulatedReset;

impl DeviceReset for SimulatedReset {
    fn reset(&mut self) {
        log::info!("resetting simulated device");
        std::panic::resume_unwind(Box::new(ResetSignal));
    }
}

/// Did this unwind payload come from [`SimulatedReset`]?
pub fn is_reset_signal(payload: &(dyn std::any::Any + Send)) -> bool {
    payload.is::<ResetSignal>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_reset_unwinds_with_signal() {
        let caught = std::panic::catch_unwind(|| {
            SimulatedReset.reset();
        })
        .unwrap_err();
        assert!(is_reset_signal(caught.as_ref()));
    }

    #[test]
    fn test_ordinary_panic_is_not_a_reset() {
        let caught = std::panic::catch_unwind(|| {
            std::panic::resume_unwind(Box::new("boom"));
        })
        .unwrap_err();
        assert!(!is_reset_signal(caught.as_ref()));
    }
}
