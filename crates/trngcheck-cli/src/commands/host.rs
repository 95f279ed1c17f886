//! Host side of the two-phase check.
//!
//! Spawns `trngcheck device` for each lifetime with piped stdin/stdout and
//! plays the host half of the conversation. Both lifetimes read the same
//! config file, so their constants always agree. The whole run shares one
//! deadline of `suite_timeout_secs`; a device still running past it is killed.

use std::io::{self, BufReader, ErrorKind, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use trngcheck_core::protocol::{
    DUMMY_VALUE, FINISH_KEY, READY_KEY, STEP1_KEY, STEP2_KEY, SUITE_ENDED_KEY,
};
use trngcheck_core::relay::BUFFER_KEY;
use trngcheck_core::{
    MessageChannel, PersistenceMode, ProtocolConfig, RESET_EXIT_CODE, TextChannel, TrngError,
};

pub fn run(config: &ProtocolConfig, store_path: &str) {
    println!(
        "trngcheck host: driver={} persistence={} buffer={}B threshold={}% timeout={}s",
        config.driver,
        config.persistence,
        config.buffer_len,
        config.threshold_percent,
        config.suite_timeout_secs
    );

    match drive(config, store_path) {
        Ok(()) => println!("PASS: TRNG survived the reset"),
        Err(e) => {
            println!("FAIL: {e}");
            std::process::exit(1);
        }
    }
}

/// Run both device lifetimes and return `Ok` only if the device reported a pass.
pub fn drive(config: &ProtocolConfig, store_path: &str) -> Result<(), TrngError> {
    let exe = std::env::current_exe().map_err(TrngError::Launch)?;

    let mut config_file = tempfile::NamedTempFile::new().map_err(TrngError::Launch)?;
    serde_json::to_writer_pretty(&mut config_file, config)
        .map_err(|e| TrngError::Config(e.to_string()))?;
    config_file.flush().map_err(TrngError::Launch)?;

    let mut args = super::config_args(config_file.path());
    args.extend(["--store".to_string(), store_path.to_string()]);
    let deadline = Instant::now() + Duration::from_secs(config.suite_timeout_secs);

    log::info!("lifetime 1: sending {STEP1_KEY}");
    let device = DeviceProcess::spawn(device_command(&exe, &args), config, deadline)?;
    let token = first_lifetime(device)?;
    if config.persistence == PersistenceMode::Host && token.is_none() {
        return Err(TrngError::Protocol(
            "device reset without relaying its buffer".into(),
        ));
    }

    log::info!("lifetime 2: sending {STEP2_KEY}");
    let device = DeviceProcess::spawn(device_command(&exe, &args), config, deadline)?;
    second_lifetime(device, token.as_deref().unwrap_or(DUMMY_VALUE))
}

fn device_command(exe: &Path, args: &[String]) -> Command {
    let mut command = Command::new(exe);
    command.arg("device").args(args);
    command
}

/// Drive STEP1. Returns the relayed token, if the device sent one, once the
/// device has exited with [`RESET_EXIT_CODE`].
fn first_lifetime(mut device: DeviceProcess) -> Result<Option<String>, TrngError> {
    device.wait_for(READY_KEY)?;
    device.send(STEP1_KEY, DUMMY_VALUE)?;

    let mut token = None;
    let mut suite_result = None;
    while let Some((key, value)) = device.next_pair()? {
        match key.as_str() {
            BUFFER_KEY => {
                log::info!("captured relayed buffer ({} symbols)", value.len());
                token = Some(value);
            }
            SUITE_ENDED_KEY => suite_result = Some(value),
            _ => log::debug!("lifetime 1: ignoring '{key}'"),
        }
    }

    let status = device.finish()?;
    match suite_result.as_deref() {
        Some("pass") => {
            return Err(TrngError::Protocol(
                "phase 1 ended the suite instead of resetting".into(),
            ));
        }
        Some(result) => {
            return Err(TrngError::SuiteFailed(format!(
                "phase 1 ended with '{result}'"
            )));
        }
        None => {}
    }
    if status.code() != Some(RESET_EXIT_CODE) {
        return Err(TrngError::Protocol(format!(
            "device did not reset after phase 1 ({status})"
        )));
    }
    log::info!("device reset");
    Ok(token)
}

/// Drive STEP2 with `payload`. Passes only if the device sent `finish` and
/// then ended the suite with `pass`.
fn second_lifetime(mut device: DeviceProcess, payload: &str) -> Result<(), TrngError> {
    device.wait_for(READY_KEY)?;
    device.send(STEP2_KEY, payload)?;

    let mut finished = false;
    let result = loop {
        let Some((key, value)) = device.next_pair()? else {
            return Err(TrngError::Protocol(
                "device exited before ending the suite".into(),
            ));
        };
        match key.as_str() {
            FINISH_KEY => finished = true,
            SUITE_ENDED_KEY => break value,
            _ => log::debug!("lifetime 2: ignoring '{key}'"),
        }
    };

    let status = device.finish()?;
    log::info!("device exited ({status})");
    match (result.as_str(), finished) {
        ("pass", true) => Ok(()),
        ("pass", false) => Err(TrngError::Protocol(
            "suite passed without completing phase 2".into(),
        )),
        _ => Err(TrngError::SuiteFailed(format!(
            "phase 2 ended with '{result}'"
        ))),
    }
}

type Received = io::Result<(String, String)>;

/// A running device child. Its stdout is read on a separate thread so every
/// wait can be bounded by the suite deadline.
struct DeviceProcess {
    child: Child,
    writer: TextChannel<io::Empty, ChildStdin>,
    pairs: mpsc::Receiver<Received>,
    deadline: Instant,
    timeout_secs: u64,
}

impl DeviceProcess {
    fn spawn(
        mut command: Command,
        config: &ProtocolConfig,
        deadline: Instant,
    ) -> Result<Self, TrngError> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(TrngError::Launch)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrngError::Launch(io::Error::other("device stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrngError::Launch(io::Error::other("device stdout not captured")))?;

        let (tx, pairs) = mpsc::channel::<Received>();
        let (key_max, value_max) = (config.key_max_len, config.value_max_len);
        thread::spawn(move || {
            let mut reader = TextChannel::new(BufReader::new(stdout), io::sink());
            loop {
                let received = reader.receive_pair(key_max, value_max);
                let closed = received.is_err();
                if tx.send(received).is_err() || closed {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            writer: TextChannel::new(io::empty(), stdin),
            pairs,
            deadline,
            timeout_secs: config.suite_timeout_secs,
        })
    }

    fn send(&mut self, key: &str, value: &str) -> Result<(), TrngError> {
        self.writer.send_pair(key, value)?;
        Ok(())
    }

    /// Next pair from the device; `None` once it has closed its stdout.
    fn next_pair(&mut self) -> Result<Option<(String, String)>, TrngError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        match self.pairs.recv_timeout(remaining) {
            Ok(Ok(pair)) => Ok(Some(pair)),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Ok(Err(e)) => Err(TrngError::Channel(e)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => {
                Err(kill_on_timeout(&mut self.child, self.timeout_secs))
            }
        }
    }

    /// Read pairs until `key` arrives; returns its value.
    fn wait_for(&mut self, key: &str) -> Result<String, TrngError> {
        loop {
            match self.next_pair()? {
                Some((k, v)) if k == key => return Ok(v),
                Some((k, _)) => log::debug!("waiting for '{key}', skipping '{k}'"),
                None => {
                    return Err(TrngError::Protocol(format!(
                        "device exited before sending '{key}'"
                    )));
                }
            }
        }
    }

    /// Close stdin and wait for the child to exit, up to the deadline.
    fn finish(mut self) -> Result<ExitStatus, TrngError> {
        drop(self.writer);
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= self.deadline {
                return Err(kill_on_timeout(&mut self.child, self.timeout_secs));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

fn kill_on_timeout(child: &mut Child, timeout_secs: u64) -> TrngError {
    log::error!("device still running after {timeout_secs} s, killing it");
    let _ = child.kill();
    let _ = child.wait();
    TrngError::SuiteTimeout(timeout_secs)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// A device stand-in: `script` runs under `sh` with the host pipes.
    fn scripted(script: &str, timeout: Duration) -> DeviceProcess {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        DeviceProcess::spawn(command, &ProtocolConfig::default(), Instant::now() + timeout)
            .unwrap()
    }

    const WAIT: Duration = Duration::from_secs(20);

    #[test]
    fn test_first_lifetime_captures_token_and_reset() {
        let device = scripted(
            "echo '{{ready;0}}'; read cmd; echo 'boot noise'; \
             echo '{{buffer;QUJD}}'; exit 3",
            WAIT,
        );
        assert_eq!(first_lifetime(device).unwrap().as_deref(), Some("QUJD"));
    }

    #[test]
    fn test_first_lifetime_requires_reset_exit_code() {
        let device = scripted("echo '{{ready;0}}'; read cmd; exit 0", WAIT);
        assert!(matches!(first_lifetime(device), Err(TrngError::Protocol(_))));
    }

    #[test]
    fn test_first_lifetime_reports_device_failure() {
        let device = scripted(
            "echo '{{ready;0}}'; read cmd; echo '{{Test_suite_ended;fail}}'; exit 1",
            WAIT,
        );
        assert!(matches!(first_lifetime(device), Err(TrngError::SuiteFailed(_))));
    }

    #[test]
    fn test_second_lifetime_relays_payload_and_passes() {
        let device = scripted(
            "echo '{{ready;0}}'; read cmd; \
             if [ \"$cmd\" = '{{check_step2;QUJD}}' ]; then \
               echo '{{finish;0}}'; echo '{{Test_suite_ended;pass}}'; \
             else echo '{{Test_suite_ended;fail}}'; fi",
            WAIT,
        );
        second_lifetime(device, "QUJD").unwrap();
    }

    #[test]
    fn test_second_lifetime_rejects_pass_without_finish() {
        let device = scripted(
            "echo '{{ready;0}}'; read cmd; echo '{{Test_suite_ended;pass}}'",
            WAIT,
        );
        assert!(matches!(
            second_lifetime(device, DUMMY_VALUE),
            Err(TrngError::Protocol(_))
        ));
    }

    #[test]
    fn test_second_lifetime_reports_device_failure() {
        let device = scripted(
            "echo '{{ready;0}}'; read cmd; echo '{{Test_suite_ended;fail}}'; exit 1",
            WAIT,
        );
        assert!(matches!(
            second_lifetime(device, DUMMY_VALUE),
            Err(TrngError::SuiteFailed(_))
        ));
    }

    #[test]
    fn test_silent_device_is_killed_at_deadline() {
        let started = Instant::now();
        let device = scripted("exec sleep 30", Duration::from_millis(300));
        assert!(matches!(
            first_lifetime(device),
            Err(TrngError::SuiteTimeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_device_that_hangs_after_ready_is_killed() {
        let device = scripted("echo '{{ready;0}}'; exec sleep 30", Duration::from_millis(300));
        assert!(matches!(
            second_lifetime(device, DUMMY_VALUE),
            Err(TrngError::SuiteTimeout(_))
        ));
    }
}
