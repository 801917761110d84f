//! Sample command implementation.
//!
//! Runs a few ticks against the real sources (or test data) with an
//! in-memory sink and prints what the monitor would have recorded.

use herakles_perf_monitor::display::{render_frame, render_process_table};
use herakles_perf_monitor::sink::MemorySink;
use herakles_perf_monitor::source::{ProcfsMemorySource, ProcfsProcessSource, TestDataSource};
use herakles_perf_monitor::{Config, Decision, Orchestrator};
use std::path::Path;
use std::sync::Arc;
use std::thread;

/// Samples `iterations` ticks without touching the database.
pub fn command_sample(
    iterations: usize,
    verbose: bool,
    config: &Config,
    test_data_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Herakles Performance Monitor - Sampling");
    println!("=========================================");

    let settings = config.monitor_settings();
    let sink = MemorySink::new();
    let mut orchestrator = match test_data_file {
        Some(path) => {
            println!("Using test data from {}", path.display());
            let source = Arc::new(TestDataSource::from_file(path)?);
            Orchestrator::new(
                settings.clone(),
                Box::new(source.clone()),
                Box::new(source),
                Box::new(sink.clone()),
            )
        }
        None => Orchestrator::new(
            settings.clone(),
            Box::new(ProcfsProcessSource::default()),
            Box::new(ProcfsMemorySource),
            Box::new(sink.clone()),
        ),
    };

    println!(
        "Thresholds: CPU {:.1}%, RAM {:.1}% - interval {:.3}s - device '{}'",
        settings.cpu_threshold,
        settings.ram_threshold,
        settings.tick_interval.as_secs_f64(),
        settings.device_name
    );

    for i in 1..=iterations {
        if i > 1 {
            thread::sleep(settings.tick_interval);
        }
        println!("\n🔄 Tick {}/{}", i, iterations);
        match orchestrator.tick() {
            Ok(report) => {
                print!("{}", render_frame(&report.frame));
                if verbose {
                    print!("{}", render_process_table(&report.frame.ranked_processes));
                }
                for (kind, decision) in [
                    (report.cpu.metric_kind, report.cpu_decision),
                    (report.ram.metric_kind, report.ram_decision),
                ] {
                    if decision == Decision::Emit {
                        println!("   📝 Would record {} event", kind);
                    }
                }
                println!("   Sampled {} processes", report.sampled_processes);
            }
            Err(e) => println!("   ⚠️  Tick skipped: {}", e),
        }
    }

    println!("\n📋 Summary:");
    let events = sink.events();
    if events.is_empty() {
        println!("   No events would have been recorded");
    }
    for event in &events {
        println!(
            "   {} {:>5.1}% at {}",
            event.metric_kind,
            event.usage_percent,
            event.timestamp.format("%H:%M:%S")
        );
    }
    Ok(())
}
