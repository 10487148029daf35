use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BatchResult, FetchRecord, ProgressEvent, ProgressSink};
use crate::daemon::DaemonWritten;
use crate::domain::{Preset, SOURCES};
use crate::monitor::{MonitorSummary, StopReason};
use crate::resolver::ResolvedDate;

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceListing {
    pub key: &'static str,
    pub source_id: u32,
    pub direct_code: &'static str,
    pub name: &'static str,
    pub wavelength: &'static str,
    pub description: &'static str,
}

pub fn source_listing() -> Vec<SourceListing> {
    SOURCES
        .iter()
        .map(|source| SourceListing {
            key: source.key,
            source_id: source.source_id,
            direct_code: source.direct_code,
            name: source.name,
            wavelength: source.wavelength,
            description: source.description,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TimestampResult {
    pub latest: Option<String>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_record(record: &FetchRecord) -> io::Result<()> {
        Self::print_json(record)
    }

    pub fn print_batch(result: &BatchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_monitor(summary: &MonitorSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_sources() -> io::Result<()> {
        Self::print_json(&source_listing())
    }

    pub fn print_timestamp(result: &TimestampResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_date(date: &ResolvedDate) -> io::Result<()> {
        Self::print_json(date)
    }

    pub fn print_daemon(written: &DaemonWritten) -> io::Result<()> {
        Self::print_json(written)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable progress on stdout.
pub struct ConsoleOutput;

impl ProgressSink for ConsoleOutput {
    fn event(&self, event: ProgressEvent) {
        let (color, message) = match event.message.split_once("; ") {
            Some((phase, rest)) if phase.starts_with("phase=") => {
                let color = match phase {
                    "phase=Fail" => RED,
                    "phase=Store" => GREEN,
                    _ => CYAN,
                };
                (color, rest.to_string())
            }
            _ => (YELLOW, event.message.clone()),
        };
        match event.elapsed {
            Some(elapsed) => println!("{color}{message} [{} ms]{RESET}", elapsed.as_millis()),
            None => println!("{color}{message}{RESET}"),
        }
    }
}

impl ConsoleOutput {
    pub fn print_sources() {
        println!("{CYAN}Available SDO data sources{RESET}");
        println!("{RULE}");
        for source in SOURCES {
            println!(
                "  {:<20} - {} ({}): {}",
                source.key, source.name, source.wavelength, source.description
            );
        }
        println!("{RULE}");
    }

    pub fn print_record(record: &FetchRecord) {
        println!("{GREEN}✓ {} saved: {}{RESET}", record.source, record.filepath);
        if record.observation_date != crate::app::UNKNOWN_DATE {
            println!("  observation: {}", record.observation_date);
        }
        if let Some(last_modified) = &record.last_modified {
            println!("  image last updated: {last_modified}");
        }
    }

    pub fn print_batch(result: &BatchResult, preset: Option<Preset>) {
        println!("{RULE}");
        if let Some(preset) = preset {
            println!("{CYAN}{}{RESET}", preset.title());
        }
        println!(
            "{GREEN}Successfully downloaded {}/{} images{RESET}",
            result.items.len(),
            result.attempted()
        );
        for record in &result.items {
            println!("{GREEN}  ✓ {} -> {}{RESET}", record.source, record.filepath);
        }
        for failure in &result.failures {
            println!("{RED}  ✗ {}: {}{RESET}", failure.source, failure.message);
        }
        if let Some(preset) = preset.filter(|preset| !preset.hints().is_empty()) {
            println!("Check these images for:");
            for hint in preset.hints() {
                println!("  - {hint}");
            }
        }
        println!("{RULE}");
    }

    pub fn print_monitor(summary: &MonitorSummary) {
        let reason = match summary.stopped_by {
            StopReason::Interrupted => "interrupted",
            StopReason::IterationLimit => "iteration limit reached",
        };
        println!("{RULE}");
        println!(
            "{CYAN}Monitoring stopped ({reason}). Ran {} iterations.{RESET}",
            summary.iterations
        );
        println!(
            "{GREEN}Downloaded {} images, {} failed attempts{RESET}",
            summary.downloaded, summary.failed
        );
        println!("Images saved in: {}", summary.output_dir);
        println!("{RULE}");
    }

    pub fn print_timestamp(result: &TimestampResult) {
        match &result.latest {
            Some(latest) => println!("Latest SDO data available at: {latest}"),
            None => println!("{YELLOW}The data source listing has no SDO/AIA window{RESET}"),
        }
    }

    pub fn print_daemon(written: &DaemonWritten) {
        println!("{GREEN}✓ Created '{}'{RESET}", written.path);
        println!("Run it with: sh {}", written.path);
        println!(
            "It downloads SDO images every {} seconds until stopped",
            written.interval_secs
        );
    }
}
