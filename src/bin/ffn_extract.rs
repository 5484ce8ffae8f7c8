//! CLI tool for extracting incident records from a report PDF

use ffn_report::{process_report, ExtractionConfig};
use std::env;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [--json]", args[0]);
        eprintln!();
        eprintln!("Extracts the incident tables of a monthly food-fraud report.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let json_output = args.iter().skip(2).any(|a| a == "--json");
    let config = ExtractionConfig::default();

    let result = match process_report(pdf_path, &config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error processing {}: {}", pdf_path, e);
            process::exit(1);
        }
    };

    if json_output {
        let output = serde_json::json!({
            "report": result.report,
            "records": result.records,
            "warnings": result.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
            "processing_time_ms": result.processing_time_ms,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    println!("Food Fraud Report Extraction");
    println!("============================");
    println!("File: {}", pdf_path);
    println!("Period: {}", result.report.period);
    println!("Declared total: {}", result.report.declared_total);
    println!("Records: {}", result.records.len());
    println!(
        "Pages: {} read, {} skipped",
        result.stats.pages_read, result.stats.pages_skipped
    );
    println!(
        "Grids: {} seen, {} rejected, {} continued",
        result.stats.grids_seen, result.stats.grids_rejected, result.stats.continuation_grids
    );
    println!("Processing time: {}ms", result.processing_time_ms);

    if !result.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    println!();
    for record in &result.records {
        println!(
            "[{}] {} | {} | {} | {} | {} | {}",
            record.fraud_type,
            record.classification,
            record.product_category,
            record.commodity,
            record.issue,
            record.origin,
            record.notified_by
        );
    }
}
