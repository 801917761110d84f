//! Host-wide readings from the /proc filesystem.
//!
//! This module reads memory totals, core counts and a few runtime constants
//! (clock ticks, hostname). Each reader has a `parse_*` counterpart working on
//! file content so the parsing can be tested without a live /proc.

use std::collections::HashSet;
use std::fs;

use crate::model::{CoreCounts, MemoryReading};

const GIB_SHIFT: u32 = 30;

/// Memory figures from /proc/meminfo in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub buffers_bytes: u64,
    pub cached_bytes: u64,
}

impl MemInfo {
    /// Used memory the way `free` reports it: total minus free, buffers and
    /// page cache.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes
            .saturating_sub(self.free_bytes)
            .saturating_sub(self.buffers_bytes)
            .saturating_sub(self.cached_bytes)
    }

    /// Share of memory not available to new workloads, in percent.
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let unavailable = self.total_bytes.saturating_sub(self.available_bytes);
        (unavailable as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn to_reading(&self) -> MemoryReading {
        MemoryReading {
            percent: self.used_percent(),
            total_gb: self.total_bytes >> GIB_SHIFT,
            used_gb: self.used_bytes() >> GIB_SHIFT,
            available_gb: self.available_bytes >> GIB_SHIFT,
        }
    }
}

/// Reads /proc/meminfo.
pub fn read_meminfo() -> Result<MemInfo, String> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
    parse_meminfo(&content)
}

/// Parses /proc/meminfo content. `MemTotal` and `MemAvailable` are required,
/// the remaining fields default to 0.
pub fn parse_meminfo(content: &str) -> Result<MemInfo, String> {
    let mut total: Option<u64> = None;
    let mut available: Option<u64> = None;
    let mut free = 0;
    let mut buffers = 0;
    let mut cached = 0;

    for line in content.lines() {
        // Format: "MemTotal:       16384000 kB"
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(kb) = value.parse::<u64>() else {
            continue;
        };
        let bytes = kb * 1024;

        match key {
            "MemTotal:" => total = Some(bytes),
            "MemAvailable:" => available = Some(bytes),
            "MemFree:" => free = bytes,
            "Buffers:" => buffers = bytes,
            "Cached:" => cached = bytes,
            _ => {}
        }
    }

    match (total, available) {
        (Some(total_bytes), Some(available_bytes)) => Ok(MemInfo {
            total_bytes,
            free_bytes: free,
            available_bytes,
            buffers_bytes: buffers,
            cached_bytes: cached,
        }),
        _ => Err("Failed to parse MemTotal or MemAvailable from /proc/meminfo".to_string()),
    }
}

/// Reads physical and logical core counts from /proc/cpuinfo.
pub fn read_core_counts() -> Result<CoreCounts, String> {
    match fs::read_to_string("/proc/cpuinfo") {
        Ok(content) => parse_core_counts(&content).or_else(|_| sysconf_core_counts()),
        Err(e) => sysconf_core_counts().map_err(|_| format!("Failed to read /proc/cpuinfo: {}", e)),
    }
}

/// Counts `processor` entries (logical cores) and distinct
/// `(physical id, core id)` pairs (physical cores).
///
/// Some platforms omit the topology fields, in which case physical falls
/// back to the logical count.
pub fn parse_core_counts(content: &str) -> Result<CoreCounts, String> {
    let mut logical = 0u32;
    let mut cores: HashSet<(String, String)> = HashSet::new();
    let mut physical_id: Option<String> = None;
    let mut core_id: Option<String> = None;

    // Blocks are separated by blank lines; flush on each.
    for line in content.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let (Some(p), Some(c)) = (physical_id.take(), core_id.take()) {
                cores.insert((p, c));
            }
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "processor" => logical += 1,
            "physical id" => physical_id = Some(value.trim().to_string()),
            "core id" => core_id = Some(value.trim().to_string()),
            _ => {}
        }
    }

    if logical == 0 {
        return Err("No processors found in /proc/cpuinfo".to_string());
    }

    let physical = if cores.is_empty() {
        logical
    } else {
        cores.len() as u32
    };

    Ok(CoreCounts { physical, logical })
}

fn sysconf_core_counts() -> Result<CoreCounts, String> {
    // SAFETY: sysconf has no preconditions
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 {
        return Err("sysconf(_SC_NPROCESSORS_ONLN) failed".to_string());
    }
    let logical = online as u32;
    Ok(CoreCounts {
        physical: logical,
        logical,
    })
}

/// Kernel clock ticks per second, used to convert /proc/<pid>/stat times.
pub fn clock_ticks_per_second() -> f64 {
    // SAFETY: sysconf has no preconditions
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 {
        ticks as f64
    } else {
        // Most Linux systems use 100 jiffies per second
        100.0
    }
}

/// Host name used as the default device name.
pub fn hostname() -> String {
    if let Ok(name) = fs::read_to_string("/proc/sys/kernel/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }

    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for buf.len() bytes
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc == 0 {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        if let Ok(name) = std::str::from_utf8(&buf[..end]) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
    }

    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16777216 kB\n\
                           MemFree:         2097152 kB\n\
                           MemAvailable:    4194304 kB\n\
                           Buffers:          524288 kB\n\
                           Cached:          1572864 kB\n\
                           SwapTotal:       4096000 kB\n";

    #[test]
    fn test_parse_meminfo() {
        let mem = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(mem.total_bytes, 16 * 1024 * 1024 * 1024);
        assert_eq!(mem.available_bytes, 4 * 1024 * 1024 * 1024);
        assert_eq!(mem.used_bytes(), 12 * 1024 * 1024 * 1024);
        assert!((mem.used_percent() - 75.0).abs() < 1e-9);

        let reading = mem.to_reading();
        assert_eq!(reading.total_gb, 16);
        assert_eq!(reading.used_gb, 12);
        assert_eq!(reading.available_gb, 4);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        let result = parse_meminfo("MemFree:        8192000 kB\nSwapFree:        2048000 kB\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_used_percent_zero_total() {
        let mem = MemInfo {
            total_bytes: 0,
            free_bytes: 0,
            available_bytes: 0,
            buffers_bytes: 0,
            cached_bytes: 0,
        };
        assert_eq!(mem.used_percent(), 0.0);
    }

    #[test]
    fn test_parse_core_counts_with_topology() {
        // 2 physical cores with hyperthreading
        let cpuinfo = "processor\t: 0\nphysical id\t: 0\ncore id\t\t: 0\n\n\
                       processor\t: 1\nphysical id\t: 0\ncore id\t\t: 1\n\n\
                       processor\t: 2\nphysical id\t: 0\ncore id\t\t: 0\n\n\
                       processor\t: 3\nphysical id\t: 0\ncore id\t\t: 1\n";
        let counts = parse_core_counts(cpuinfo).unwrap();
        assert_eq!(counts.logical, 4);
        assert_eq!(counts.physical, 2);
    }

    #[test]
    fn test_parse_core_counts_without_topology() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\n\nprocessor\t: 1\nvendor_id\t: GenuineIntel\n";
        let counts = parse_core_counts(cpuinfo).unwrap();
        assert_eq!(counts, CoreCounts { physical: 2, logical: 2 });
    }

    #[test]
    fn test_parse_core_counts_empty() {
        assert!(parse_core_counts("").is_err());
    }

    #[test]
    fn test_hostname_not_empty() {
        assert!(!hostname().is_empty());
    }
}
