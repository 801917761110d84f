//! Config command implementation.
//!
//! Writes the default configuration in YAML, JSON or TOML.

use herakles_perf_monitor::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Generates configuration files
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-perf-monitor.yaml"),
    };

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

pub fn render_config(
    config: &Config,
    format: ConfigFormat,
    commented: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    })
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Performance Monitor Configuration
# ==========================================
#
# Decision Policy
# ---------------
# threshold_percent: 75.0        # Shared CPU/RAM threshold, within (0, 100]
# cpu_threshold_percent: null    # Overrides threshold_percent for CPU
# ram_threshold_percent: null    # Overrides threshold_percent for RAM
#
# Sampling
# --------
# tick_interval_seconds: 1.0     # Seconds between two samples
# top_n: 20                      # Processes ranked and summed for CPU %
# device_name: null              # Stored with every log (null = host name)
#
# Persistence
# -----------
# database_path: ./herakles-perf-monitor.db
# sink_busy_timeout_ms: 5000     # SQLite busy timeout
# dry_run: false                 # Keep events in memory only
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                     # HTTP port
# enable_http: true              # Serve /metrics, /health, /status, /doc
#
# Display
# -------
# enable_console: false          # Print summary and process table per tick
#
# Logging
# -------
# log_level: "info"              # off, error, warn, info, debug, trace
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use herakles_perf_monitor::config::parse_config;

    #[test]
    fn test_rendered_config_parses_back() {
        let config = Config::default();
        for (format, ext) in [
            (ConfigFormat::Yaml, "yaml"),
            (ConfigFormat::Json, "json"),
            (ConfigFormat::Toml, "toml"),
        ] {
            let text = render_config(&config, format, true).unwrap();
            let parsed = parse_config(&text, Some(ext)).unwrap();
            assert_eq!(parsed.threshold_percent, config.threshold_percent);
            assert_eq!(parsed.top_n, config.top_n);
        }
    }

    #[test]
    fn test_commented_yaml_has_header() {
        let text = render_config(&Config::default(), ConfigFormat::Yaml, true).unwrap();
        assert!(text.starts_with("# Herakles Performance Monitor Configuration"));
    }
}
