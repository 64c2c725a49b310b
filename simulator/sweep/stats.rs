//! Results and reporting for sweep scenarios

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gossip_rust::{Percent, RoundCurves};

/// Complete sweep result
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Scenario name
    pub name: String,

    /// Seed used for the whole scenario
    pub seed_used: [u8; 32],

    /// Trials per sweep point
    pub samples: usize,

    pub size_sweeps: Vec<SizeSweepResult>,
    pub percent_sweeps: Vec<PercentSweepResult>,
}

/// Mean rounds by graph size at a fixed fan-out
#[derive(Debug, Clone)]
pub struct SizeSweepResult {
    pub percent: Percent,
    pub points: Vec<SizePoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizePoint {
    pub size: usize,
    pub mean_rounds: f64,
    pub trials: usize,
}

/// Round curves by fan-out at a fixed graph size
#[derive(Debug, Clone)]
pub struct PercentSweepResult {
    pub size: usize,
    pub points: Vec<PercentPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PercentPoint {
    pub percent: Percent,
    pub curves: RoundCurves,
}

impl PercentPoint {
    /// Fraction of trials that reached every node
    pub fn full_diffusion_rate(&self) -> f64 {
        if self.curves.trials == 0 {
            return 0.0;
        }
        self.curves.full_diffusion_histogram.iter().sum::<usize>() as f64
            / self.curves.trials as f64
    }
}

impl SweepReport {
    /// Print a summary of the sweep results
    pub fn print_summary(&self) {
        println!("\n╔════════════════════════════════════════════════════════╗");
        println!("║        Gossip Diffusion Sweep Results                  ║");
        println!("╚════════════════════════════════════════════════════════╝\n");

        println!("Configuration:");
        println!("  Scenario: {}", self.name);
        println!("  Seed: {}", seed_hex(&self.seed_used));
        println!("  Samples per point: {}\n", self.samples);

        for sweep in &self.size_sweeps {
            println!("Rounds until termination, {}% neighbors chosen:", sweep.percent);
            println!("  {:>6}  {:>12}", "nodes", "avg rounds");
            for point in &sweep.points {
                println!("  {:>6}  {:>12.3}", point.size, point.mean_rounds);
            }
            println!();
        }

        for sweep in &self.percent_sweeps {
            println!("Diffusion on {} node graphs:", sweep.size);
            println!(
                "  {:>8}  {:>7}  {:>10}  {:>14}",
                "percent", "rounds", "full rate", "final informed"
            );
            for point in &sweep.points {
                println!(
                    "  {:>7}%  {:>7}  {:>9.0}%  {:>14.1}",
                    point.percent,
                    point.curves.trial_counts.len().saturating_sub(1),
                    point.full_diffusion_rate() * 100.0,
                    point.curves.mean_final_informed
                );
            }
            println!();
        }
    }

    /// Write one CSV table per sweep point into `dir`, returning the paths
    pub fn write_csv<P: AsRef<Path>>(&self, dir: P) -> std::io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        for sweep in &self.size_sweeps {
            let path = dir.join(format!("rounds_by_size_{}pct.csv", sweep.percent));
            let mut writer = BufWriter::new(File::create(&path)?);
            writeln!(writer, "size,mean_rounds,trials")?;
            for point in &sweep.points {
                writeln!(
                    writer,
                    "{},{},{}",
                    point.size, point.mean_rounds, point.trials
                )?;
            }
            writer.flush()?;
            written.push(path);
        }

        for sweep in &self.percent_sweeps {
            for point in &sweep.points {
                let path = dir.join(format!(
                    "diffusion_{}n_{}pct.csv",
                    sweep.size, point.percent
                ));
                write_curves(&path, &point.curves)?;
                written.push(path);
            }
        }

        Ok(written)
    }
}

fn write_curves(path: &Path, curves: &RoundCurves) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "round,average_informed,trials,terminations,full_diffusions"
    )?;
    for round in 0..curves.trial_counts.len() {
        writeln!(
            writer,
            "{},{},{},{},{}",
            round,
            curves.averages[round],
            curves.trial_counts[round],
            curves.terminations_on_round[round],
            curves.full_diffusion_histogram[round]
        )?;
    }
    writer.flush()
}

pub fn seed_hex(seed: &[u8; 32]) -> String {
    let mut hex = String::from("0x");
    for byte in seed {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curves() -> RoundCurves {
        // trials: [0,2,4] full, [0,1] stalled
        RoundCurves {
            averages: vec![0.0, 1.5, 4.0],
            trial_counts: vec![2, 2, 1],
            terminations_on_round: vec![0, 1, 1],
            full_diffusion_histogram: vec![0, 0, 1],
            mean_final_informed: 2.5,
            trials: 2,
        }
    }

    #[test]
    fn test_percent_point_rates() {
        let point = PercentPoint {
            percent: 50,
            curves: curves(),
        };
        assert_eq!(point.full_diffusion_rate(), 0.5);
        assert_eq!(point.curves.mean_final_informed, 2.5);
    }

    #[test]
    fn test_seed_hex() {
        let mut seed = [0u8; 32];
        seed[0] = 0xab;
        seed[31] = 0x01;
        let hex = seed_hex(&seed);
        assert_eq!(hex.len(), 66);
        assert!(hex.starts_with("0xab00"));
        assert!(hex.ends_with("01"));
    }

    #[test]
    fn test_write_csv_tables() {
        let report = SweepReport {
            name: "csv".to_string(),
            seed_used: [0u8; 32],
            samples: 2,
            size_sweeps: vec![SizeSweepResult {
                percent: 100,
                points: vec![SizePoint {
                    size: 5,
                    mean_rounds: 2.5,
                    trials: 2,
                }],
            }],
            percent_sweeps: vec![PercentSweepResult {
                size: 10,
                points: vec![PercentPoint {
                    percent: 50,
                    curves: curves(),
                }],
            }],
        };

        let dir = std::env::temp_dir().join("gossip_diffusion_report_test");
        let written = report.write_csv(&dir).unwrap();
        assert_eq!(written.len(), 2);

        let sizes = fs::read_to_string(dir.join("rounds_by_size_100pct.csv")).unwrap();
        assert_eq!(sizes, "size,mean_rounds,trials\n5,2.5,2\n");

        let diffusion = fs::read_to_string(dir.join("diffusion_10n_50pct.csv")).unwrap();
        let lines: Vec<&str> = diffusion.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1,1.5,2,1,0");
        assert_eq!(lines[3], "2,4,1,1,1");

        let _ = fs::remove_dir_all(&dir);
    }
}
