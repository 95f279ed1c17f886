use std::io::Read;

use trngcheck_core::DeflateCompressor;
use trngcheck_core::oracle::{self, capacity_for};

pub fn run(path: Option<&str>, threshold: u8) {
    if !(1..=100).contains(&threshold) {
        eprintln!("Error: threshold must be 1..=100, got {threshold}");
        std::process::exit(1);
    }

    let data = match read_input(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.unwrap_or("stdin"));
            std::process::exit(1);
        }
    };
    if data.is_empty() {
        eprintln!("Error: no input bytes");
        std::process::exit(1);
    }

    let mut compressor = DeflateCompressor::new();
    let verdict = match oracle::check(&mut compressor, &data, threshold) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!(
        "{} bytes, capacity {} ({threshold}%): {verdict}",
        data.len(),
        capacity_for(data.len(), threshold)
    );
    if !verdict.passed() {
        std::process::exit(1);
    }
}

fn read_input(path: Option<&str>) -> std::io::Result<Vec<u8>> {
    match path {
        Some(p) => std::fs::read(p),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}
