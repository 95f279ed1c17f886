//! CLI for trngcheck: does your TRNG survive a reboot?

mod commands;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trngcheck")]
#[command(about = "trngcheck: two-phase TRNG validation across a device reset")]
#[command(version = trngcheck_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Protocol settings shared by every subcommand that runs the protocol.
/// Flags override values read from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ProtocolArgs {
    /// JSON protocol config; missing fields take their defaults
    #[arg(long)]
    config: Option<String>,

    /// Where the phase-1 buffer waits out the reset: store (local file) or host (relayed)
    #[arg(long, value_parser = ["store", "host"])]
    persistence: Option<String>,

    /// RNG driver: os (platform RNG) or seeded (reseeds identically every boot)
    #[arg(long, value_parser = ["os", "seeded"])]
    driver: Option<String>,

    /// Seed for the seeded driver
    #[arg(long)]
    seed: Option<u64>,

    /// Largest single driver read in bytes (forces short reads)
    #[arg(long)]
    max_read: Option<usize>,

    /// Bytes per random buffer
    #[arg(long)]
    buffer_len: Option<usize>,

    /// Compression threshold as a percentage of the input length
    #[arg(long)]
    threshold: Option<u8>,

    /// Seconds the host waits for both lifetimes before killing the device
    #[arg(long)]
    suite_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one device lifetime, talking {{key;value}} pairs on stdin/stdout
    Device {
        #[command(flatten)]
        protocol: ProtocolArgs,

        /// Durable store file used in store mode
        #[arg(long, default_value = commands::DEFAULT_STORE_PATH)]
        store: String,
    },

    /// Drive the full check: spawn the device, send step 1, wait for the
    /// reset, respawn, send step 2
    Host {
        #[command(flatten)]
        protocol: ProtocolArgs,

        /// Durable store file handed to the device in store mode
        #[arg(long, default_value = commands::DEFAULT_STORE_PATH)]
        store: String,
    },

    /// Run both lifetimes in-process with a simulated reset
    Simulate {
        #[command(flatten)]
        protocol: ProtocolArgs,
    },

    /// Compression verdict for a file's bytes (stdin if no path)
    Check {
        /// Input file
        path: Option<String>,

        /// Compression threshold as a percentage of the input length
        #[arg(long, default_value = "99")]
        threshold: u8,
    },

    /// Encode stdin bytes into a relay token
    Encode,

    /// Decode a relay token on stdin back into bytes
    Decode,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Device { protocol, store } => {
            commands::device::run(&commands::load_config(&protocol), &store)
        }
        Commands::Host { protocol, store } => {
            commands::host::run(&commands::load_config(&protocol), &store)
        }
        Commands::Simulate { protocol } => {
            commands::simulate::run(&commands::load_config(&protocol))
        }
        Commands::Check { path, threshold } => commands::check::run(path.as_deref(), threshold),
        Commands::Encode => commands::codec::encode(),
        Commands::Decode => commands::codec::decode(),
    }
}
