//! Derived usage percentages.
//!
//! CPU % divides the container's cumulative CPU time by the host's cumulative
//! CPU time from a single report. This is not a rate over an interval; it is
//! the share of host CPU time the container has used since it started.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::docker::{DockerError, StatSample};

#[derive(Debug, Clone, Serialize)]
pub struct UsageSample {
    pub container_id: String,
    /// NaN when the host CPU counter is zero or missing
    pub cpu_percent: f64,
    /// NaN when the memory limit is zero or missing
    pub memory_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: Option<u64>,
    pub sampled_at: DateTime<Utc>,
}

/// `100 * part / whole`, or NaN when `whole` is zero or unknown.
pub fn percent(part: u64, whole: Option<u64>) -> f64 {
    match whole {
        Some(whole) if whole > 0 => 100.0 * part as f64 / whole as f64,
        _ => f64::NAN,
    }
}

impl UsageSample {
    /// Fails with `MalformedSample` when memory usage or container CPU time is absent.
    pub fn from_sample(container_id: &str, sample: &StatSample) -> Result<Self, DockerError> {
        let memory_usage = sample
            .memory_usage
            .ok_or_else(|| DockerError::MalformedSample("memory usage missing".to_string()))?;
        let cpu_total = sample
            .cpu_total_usage
            .ok_or_else(|| DockerError::MalformedSample("cpu total usage missing".to_string()))?;

        Ok(Self {
            container_id: container_id.to_string(),
            cpu_percent: percent(cpu_total, sample.system_cpu_usage),
            memory_percent: percent(memory_usage, sample.memory_limit),
            memory_usage,
            memory_limit: sample.memory_limit,
            sampled_at: Utc::now(),
        })
    }
}

/// Two decimals, or `unknown` for undefined values.
pub fn format_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}%", value)
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample;

    #[test]
    fn test_percentages_from_cumulative_counters() {
        let usage = UsageSample::from_sample("abc", &sample(50, 100, 20, 200)).unwrap();
        assert_eq!(format!("{:.2}", usage.memory_percent), "50.00");
        assert_eq!(format!("{:.2}", usage.cpu_percent), "10.00");
        assert_eq!(usage.memory_usage, 50);
    }

    #[test]
    fn test_zero_or_missing_limit_is_undefined() {
        assert!(percent(50, Some(0)).is_nan());
        assert!(percent(50, None).is_nan());

        let mut raw = sample(50, 0, 20, 0);
        let usage = UsageSample::from_sample("abc", &raw).unwrap();
        assert!(usage.memory_percent.is_nan());
        assert!(usage.cpu_percent.is_nan());

        raw.memory_limit = None;
        raw.system_cpu_usage = None;
        let usage = UsageSample::from_sample("abc", &raw).unwrap();
        assert!(usage.memory_percent.is_nan());
        assert!(usage.cpu_percent.is_nan());
    }

    #[test]
    fn test_missing_usage_is_malformed() {
        let mut raw = sample(50, 100, 20, 200);
        raw.memory_usage = None;
        let err = UsageSample::from_sample("abc", &raw).unwrap_err();
        assert!(matches!(err, DockerError::MalformedSample(_)));

        let mut raw = sample(50, 100, 20, 200);
        raw.cpu_total_usage = None;
        assert!(UsageSample::from_sample("abc", &raw).is_err());
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(12.345), "12.35%");
        assert_eq!(format_percent(f64::NAN), "unknown");
    }
}
