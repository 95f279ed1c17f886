use trngcheck_core::{ProtocolConfig, simulate};

pub fn run(config: &ProtocolConfig) {
    println!(
        "Simulating two lifetimes: driver={} persistence={} buffer={}B threshold={}%",
        config.driver, config.persistence, config.buffer_len, config.threshold_percent
    );

    let report = match simulate::run_two_phase(config, || {
        config.driver.open(config.seed, config.max_read)
    }) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match &report.step1 {
        Ok(()) => println!("  phase 1: incompressible, persisted, reset"),
        Err(e) => println!("  phase 1: FAIL ({e})"),
    }
    if let Some(token) = &report.token {
        println!("  relayed: {token}");
    }
    match &report.step2 {
        Some(Ok(checked)) => println!(
            "  phase 2: {} byte concatenation incompressible",
            checked.as_bytes().len()
        ),
        Some(Err(e)) => println!("  phase 2: FAIL ({e})"),
        None => println!("  phase 2: skipped"),
    }

    if report.passed() {
        println!("PASS");
    } else {
        println!("FAIL");
        std::process::exit(1);
    }
}
