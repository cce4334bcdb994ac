//! Output formatting for CLI responses

use std::path::Path;

use anyhow::Error;
use aviutl2_conformance::{CheckStatus, ConformanceConfig, ConformanceReport, RegistrationSummary, check_names};
use colored::*;
use serde_json::json;

use crate::error;

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    print_json(&json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error::type_name(error),
            "exit_code": error::exit_code(error),
        }
    }));
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

pub fn print_success(message: &str, json: bool) {
    if json {
        print_json(&json!({ "success": true, "message": message }));
    } else {
        println!("{} {}", "✓".green(), message);
    }
}

fn status_label(status: CheckStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        CheckStatus::Pass => text.green().bold(),
        CheckStatus::Fail => text.red().bold(),
        CheckStatus::Gap => text.yellow().bold(),
        CheckStatus::Skipped => text.dimmed(),
    }
}

/// Print a conformance report
pub fn print_report(report: &ConformanceReport, json: bool) {
    if json {
        print_json(&json!({
            "success": report.passed(),
            "report": report,
        }));
        return;
    }

    println!("{} {}", "Plugin:".bold(), report.plugin);
    println!("  Host version: {}", report.host_version);
    if report.strict {
        println!("  Mode: {}", "strict".yellow());
    }
    let width = report.outcomes.iter().map(|o| o.name.len()).max().unwrap_or(0);
    for outcome in &report.outcomes {
        println!(
            "  {:<6} {:<width$}  {}",
            status_label(outcome.status),
            outcome.name,
            outcome.detail.dimmed()
        );
    }
    let [pass, fail, gap, skipped] = report.counts();
    let summary = format!("{pass} passed, {fail} failed, {gap} gaps, {skipped} skipped");
    if report.passed() {
        println!("{} {}", "✓".green(), summary);
    } else {
        println!("{} {}", "✗".red(), summary);
    }
}

/// Print what a library exports and registers
pub fn print_summary(library: &Path, exported: &[&str], summary: &RegistrationSummary, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "library": library.display().to_string(),
            "exports": exported,
            "registration": summary,
        }));
        return;
    }

    println!("{} {}", "Library:".bold(), library.display());
    println!("  Exports: {}", exported.join(", "));
    if let Some(version) = summary.required_version {
        println!("  Required host version: {version}");
    }
    if let Some(information) = &summary.information {
        println!("  Information: {information}");
    }
    print_names("Inputs", &summary.inputs);
    print_names("Outputs", &summary.outputs);
    print_names("Filters", &summary.filters);
    print_names("Script modules", &summary.scripts);
    print_names("Windows", &summary.windows);
    if !summary.menus.is_empty() {
        println!("  {}", "Menus:".bold());
        for (kind, name) in &summary.menus {
            println!("    {} {name}", format!("[{kind:?}]").cyan());
        }
    }
    if summary.project_handlers > 0 {
        println!("  Project handlers: {}", summary.project_handlers);
    }
}

fn print_names(label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("  {}", format!("{label}:").bold());
    for name in names {
        println!("    {} {name}", "●".green());
    }
}

/// Print the checks in run order
pub fn print_check_names(json: bool) {
    let names = check_names();
    if json {
        print_json(&json!({ "success": true, "checks": names }));
    } else {
        for (i, name) in names.iter().enumerate() {
            println!("{:>3}. {name}", i + 1);
        }
    }
}

/// Print an effective configuration
pub fn print_config(config: &ConformanceConfig, json: bool) {
    if json {
        print_json(&json!({ "success": true, "config": config }));
        return;
    }
    println!("{}", "Configuration:".bold());
    println!("  Host version: {}", config.host_version);
    println!("  Threads: {} x {} reads", config.concurrent_threads, config.reads_per_thread);
    println!(
        "  Output: {} frames, abort after {}",
        config.output_frames, config.abort_after_frames
    );
    println!("  Strict: {}", config.strict);
    if config.input_files.is_empty() {
        println!("  Inputs: {}", "none".dimmed());
    } else {
        for path in &config.input_files {
            println!("  Input: {}", path.display());
        }
    }
}
