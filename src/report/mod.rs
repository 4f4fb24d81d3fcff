pub mod table;
pub mod json;

use crate::config::Config;
use crate::engine::ScanReport;

pub fn print(report: &ScanReport, config: &Config) {
    if config.json_output {
        match json::render(report) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: failed to serialize report: {e}"),
        }
    } else {
        print!("{}", table::render(report));
        print_scan_info(report, config.verbose);
        print_diagnostics(report, config.verbose);
    }
}

fn print_scan_info(report: &ScanReport, verbose: bool) {
    if let Some(duration_ms) = report.duration_ms {
        let duration_sec = duration_ms as f64 / 1000.0;
        println!(
            "\nscan completed in {duration_sec:.2}s ({} of {} files considered)",
            report.files_considered, report.files_seen
        );

        if verbose {
            if let Some(peak_bytes) = report.peak_memory_bytes {
                println!("peak memory: {}", format_bytes(peak_bytes as u64));
            }
        }
    }
}

fn print_diagnostics(report: &ScanReport, verbose: bool) {
    if report.diagnostics.is_empty() {
        return;
    }

    println!();
    if verbose {
        println!("Diagnostics:");
        println!("{}", "-".repeat(40));
        for diagnostic in &report.diagnostics {
            println!("  {diagnostic}");
        }
    } else {
        for diagnostic in &report.diagnostics {
            println!("[diagnostic] {diagnostic}");
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
