//! Host memory sampling for the execution memory proxy.

/// Resident set size of the calling process, when the host exposes it.
pub fn resident_set_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_status_kib(&status, "VmRSS:")
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MemorySample {
    before: Option<u64>,
}

impl MemorySample {
    pub(crate) fn start() -> Self {
        Self {
            before: resident_set_bytes(),
        }
    }

    /// Signed delta against the starting sample; 0 when either sample is unavailable.
    pub(crate) fn delta_bytes(self) -> i64 {
        match (self.before, resident_set_bytes()) {
            (Some(before), Some(after)) => signed_delta(before, after),
            _ => 0,
        }
    }
}

fn signed_delta(before: u64, after: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map_or(i64::MIN, |value| -value)
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_status_kib(status: &str, prefix: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix(prefix)?;
        let kib = rest.split_whitespace().next()?.parse::<u64>().ok()?;
        Some(kib.saturating_mul(1024))
    })
}
