// Sweep Runner - Load and execute diffusion sweep scenarios
//
// Usage:
//   cargo run --release --bin sweep_runner
//   cargo run --release --bin sweep_runner scenarios/default_sweep.yaml
//   cargo run --release --bin sweep_runner scenarios/default_sweep.yaml --seed 0x1234...

mod sweep;

use std::env;
use std::fs;
use std::path::Path;

use log::info;
use simple_logger::SimpleLogger;

use sweep::{seed_hex, SweepRunner, SweepScenario};

fn main() {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let args: Vec<String> = env::args().collect();

    let mut scenario_path: Option<&str> = None;
    let mut seed: Option<[u8; 32]> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                seed = Some(parse_seed_hex(&args[i + 1]));
                i += 2;
            }
            "-h" | "--help" => {
                print_usage(&args[0]);
                return;
            }
            arg => {
                scenario_path = Some(arg);
                i += 1;
            }
        }
    }

    let scenario = match scenario_path {
        Some(path) => load_scenario(Path::new(path)),
        None => {
            info!("no scenario given, running the default sweep");
            SweepScenario::default()
        }
    };

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!(
        "║  {}",
        scenario.meta.name.as_deref().unwrap_or("Diffusion sweep")
    );
    println!("╚════════════════════════════════════════════════════════╝\n");
    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    let csv_dir = scenario.output.csv_dir.clone();
    let runner = SweepRunner::new(scenario, seed);
    let report = runner.run().unwrap_or_else(|e| {
        eprintln!("Sweep failed: {}", e);
        std::process::exit(1);
    });

    report.print_summary();

    if let Some(dir) = csv_dir {
        match report.write_csv(&dir) {
            Ok(paths) => info!("wrote {} CSV tables to {}", paths.len(), dir),
            Err(e) => {
                eprintln!("Failed to write CSV tables to {}: {}", dir, e);
                std::process::exit(1);
            }
        }
    }

    info!("rerun with --seed {}", seed_hex(&report.seed_used));
    println!("\n✓ Sweep complete!\n");
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [scenario.yaml] [--seed SEED_HEX]", program);
    eprintln!("\nExamples:");
    eprintln!("  {}", program);
    eprintln!("  {} scenarios/default_sweep.yaml", program);
    eprintln!("  {} scenarios/default_sweep.yaml --seed 0x123456...", program);
}

fn load_scenario(path: &Path) -> SweepScenario {
    info!("loading scenario from {}", path.display());

    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn parse_seed_hex(hex: &str) -> [u8; 32] {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut seed = [0u8; 32];

    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        if i >= 32 {
            break;
        }
        let byte = std::str::from_utf8(chunk)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok());
        seed[i] = byte.unwrap_or_else(|| {
            eprintln!("Invalid hex seed: {}", hex);
            std::process::exit(1);
        });
    }

    seed
}
