use dockhand_common::{DockhandError, ResourceQuota, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Scheduling period used by the period/quota encoding, in microseconds.
pub const CPU_PERIOD_US: i64 = 100_000;
const NANOS_PER_CPU: f64 = 1_000_000_000.0;

/// Which engine field carries a CPU limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CpuLimitStrategy {
    /// `NanoCpus`. Does not conflict with a quota set at container creation.
    #[default]
    NanoCpus,
    /// `CpuPeriod` + `CpuQuota`.
    PeriodQuota,
}

impl CpuLimitStrategy {
    /// Converts a fraction of all host CPUs into the engine's limit fields.
    pub fn translate(self, total_cores: u32, percent: f64) -> Result<ResourceQuota> {
        validate_percent(percent)?;
        if total_cores == 0 {
            return Err(DockhandError::Engine(
                "engine reported zero host CPUs".to_string(),
            ));
        }

        let cores = f64::from(total_cores) * percent;
        let quota = match self {
            CpuLimitStrategy::NanoCpus => {
                ResourceQuota::NanoCpus((cores * NANOS_PER_CPU).round() as i64)
            }
            CpuLimitStrategy::PeriodQuota => ResourceQuota::PeriodQuota {
                period_us: CPU_PERIOD_US,
                quota_us: (cores * CPU_PERIOD_US as f64).round() as i64,
            },
        };
        Ok(quota)
    }
}

impl FromStr for CpuLimitStrategy {
    type Err = DockhandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nanocpus" | "nano-cpus" | "nanocpu" => Ok(CpuLimitStrategy::NanoCpus),
            "period-quota" | "quota" | "cfs" => Ok(CpuLimitStrategy::PeriodQuota),
            other => Err(DockhandError::Config(format!(
                "unknown CPU limit mode '{other}' (expected 'nanocpus' or 'period-quota')"
            ))),
        }
    }
}

/// Accepts a fraction in `(0, 1]`.
pub fn validate_percent(percent: f64) -> Result<()> {
    if !percent.is_finite() || percent <= 0.0 || percent > 1.0 {
        return Err(DockhandError::Validation(
            "CpuLimitPercent must be a decimal value greater than 0 and less than or equal to 1 \
             (e.g., 0.5 for 50%)."
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_of_one_core() {
        assert_eq!(
            CpuLimitStrategy::PeriodQuota.translate(1, 0.5).unwrap(),
            ResourceQuota::PeriodQuota {
                period_us: 100_000,
                quota_us: 50_000
            }
        );
        assert_eq!(
            CpuLimitStrategy::NanoCpus.translate(1, 0.5).unwrap(),
            ResourceQuota::NanoCpus(500_000_000)
        );
    }

    #[test]
    fn test_scales_with_host_cores() {
        assert_eq!(
            CpuLimitStrategy::PeriodQuota.translate(4, 0.5).unwrap(),
            ResourceQuota::PeriodQuota {
                period_us: 100_000,
                quota_us: 200_000
            }
        );
        assert_eq!(
            CpuLimitStrategy::NanoCpus.translate(4, 0.5).unwrap(),
            ResourceQuota::NanoCpus(2_000_000_000)
        );
    }

    #[test]
    fn test_rounds_instead_of_truncating() {
        // 3 * 0.1 is 0.30000000000000004 cores
        assert_eq!(
            CpuLimitStrategy::PeriodQuota.translate(3, 0.1).unwrap(),
            ResourceQuota::PeriodQuota {
                period_us: 100_000,
                quota_us: 30_000
            }
        );
        assert_eq!(
            CpuLimitStrategy::NanoCpus.translate(6, 0.333).unwrap(),
            ResourceQuota::NanoCpus(1_998_000_000)
        );
    }

    #[test]
    fn test_full_host() {
        assert_eq!(
            CpuLimitStrategy::NanoCpus.translate(8, 1.0).unwrap(),
            ResourceQuota::NanoCpus(8_000_000_000)
        );
    }

    #[test]
    fn test_out_of_range_percent_rejected() {
        for percent in [0.0, -0.25, 1.5, 1.000_001, f64::NAN, f64::INFINITY] {
            for strategy in [CpuLimitStrategy::NanoCpus, CpuLimitStrategy::PeriodQuota] {
                assert!(
                    matches!(
                        strategy.translate(4, percent),
                        Err(DockhandError::Validation(_))
                    ),
                    "{percent} should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_zero_cores_is_an_engine_error() {
        assert!(matches!(
            CpuLimitStrategy::NanoCpus.translate(0, 0.5),
            Err(DockhandError::Engine(_))
        ));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            "nanocpus".parse::<CpuLimitStrategy>().unwrap(),
            CpuLimitStrategy::NanoCpus
        );
        assert_eq!(
            "Period-Quota".parse::<CpuLimitStrategy>().unwrap(),
            CpuLimitStrategy::PeriodQuota
        );
        assert!("shares".parse::<CpuLimitStrategy>().is_err());
    }
}
