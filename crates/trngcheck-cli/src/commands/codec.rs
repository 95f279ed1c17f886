//! Relay-token encoding on stdin/stdout.

use std::io::{self, Read, Write};

use trngcheck_core::codec as token;

pub fn encode() {
    let mut input = Vec::new();
    if let Err(e) = io::stdin().read_to_end(&mut input) {
        eprintln!("Error reading stdin: {e}");
        std::process::exit(1);
    }
    println!("{}", token::encode(&input));
}

pub fn decode() {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("Error reading stdin: {e}");
        std::process::exit(1);
    }
    let bytes = token::decode(input.trim());
    let mut out = io::stdout().lock();
    if let Err(e) = out.write_all(&bytes).and_then(|()| out.flush()) {
        eprintln!("Error writing stdout: {e}");
        std::process::exit(1);
    }
}
