//! Check command implementation.
//!
//! Validates configuration and the readers the monitor depends on.

use herakles_perf_monitor::config::validate_effective_config;
use herakles_perf_monitor::sink::SqliteSink;
use herakles_perf_monitor::source::{
    MemorySource, ProcessSource, ProcfsMemorySource, ProcfsProcessSource,
};
use herakles_perf_monitor::Config;
use std::path::Path;

/// Validates system requirements and configuration.
pub fn command_check(
    proc: bool,
    database: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Performance Monitor - System Check");
    println!("==============================================");

    let mut all_ok = true;

    // Check /proc readers
    if proc || all {
        println!("\n📁 Checking /proc filesystem...");
        if Path::new("/proc").exists() {
            println!("   ✅ /proc filesystem accessible");

            let source = ProcfsProcessSource::default();
            match source.enumerate() {
                Ok(samples) if !samples.is_empty() => {
                    println!("   ✅ Can read {} process entries", samples.len())
                }
                Ok(_) => {
                    println!("   ❌ Cannot read any process entries from /proc");
                    all_ok = false;
                }
                Err(e) => {
                    println!("   ❌ Process enumeration failed: {}", e);
                    all_ok = false;
                }
            }

            match source.core_counts() {
                Ok(cores) => println!(
                    "   ✅ Cores: {} physical, {} logical",
                    cores.physical, cores.logical
                ),
                Err(e) => {
                    println!("   ❌ Core count unavailable: {}", e);
                    all_ok = false;
                }
            }

            match ProcfsMemorySource.read() {
                Ok(mem) => println!(
                    "   ✅ Memory: {:.1}% used ({} GB total, {} GB available)",
                    mem.percent, mem.total_gb, mem.available_gb
                ),
                Err(e) => {
                    println!("   ❌ /proc/meminfo unreadable: {}", e);
                    all_ok = false;
                }
            }
        } else {
            println!("   ❌ /proc filesystem not found");
            all_ok = false;
        }
    }

    // Check event database
    if database || all {
        println!("\n💾 Checking event database...");
        let path = config.database_path();
        match SqliteSink::open(&path, config.sink_busy_timeout()) {
            Ok(sink) => {
                println!("   ✅ Opened {}", path.display());
                match sink.fetch_hardware_codes() {
                    Ok(codes) => println!("   ✅ {} hardware codes present", codes.len()),
                    Err(e) => {
                        println!("   ❌ Cannot read hardware codes: {}", e);
                        all_ok = false;
                    }
                }
            }
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    }

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            let settings = config.monitor_settings();
            println!("   ✅ Configuration is valid");
            println!(
                "   ✅ Thresholds: CPU {:.1}%, RAM {:.1}% - device '{}'",
                settings.cpu_threshold, settings.ram_threshold, settings.device_name
            );
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
