use dockhand_common::StatsSnapshot;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// CPU utilization over the interval between the two readings, as a percentage
/// of one CPU (so a busy 4-CPU container can report up to 400).
pub fn cpu_percent(snapshot: &StatsSnapshot) -> f64 {
    let cpu_delta = snapshot.current.total_usage as f64 - snapshot.previous.total_usage as f64;
    let system_delta =
        snapshot.current.system_usage as f64 - snapshot.previous.system_usage as f64;

    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }

    let online_cpus = match (snapshot.current.online_cpus, snapshot.current.percpu_count) {
        (0, 0) => 1,
        (0, percpu) => percpu,
        (online, _) => online,
    };

    round3(cpu_delta / system_delta * f64::from(online_cpus) * 100.0)
}

/// Bytes to decimal megabytes, three places.
pub fn memory_megabytes(bytes: u64) -> f64 {
    round3(bytes as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_common::CpuCounters;

    fn snapshot(cpu: (u64, u64), system: (u64, u64), online_cpus: u32) -> StatsSnapshot {
        StatsSnapshot {
            previous: CpuCounters {
                total_usage: cpu.0,
                system_usage: system.0,
                online_cpus,
                percpu_count: 0,
            },
            current: CpuCounters {
                total_usage: cpu.1,
                system_usage: system.1,
                online_cpus,
                percpu_count: 0,
            },
            memory_usage_bytes: 0,
        }
    }

    #[test]
    fn test_idle_container() {
        let s = snapshot((5_000, 5_000), (1_000, 2_000), 4);
        assert_eq!(cpu_percent(&s), 0.0);
    }

    #[test]
    fn test_busy_container() {
        let s = snapshot((0, 200_000_000), (0, 1_000_000_000), 4);
        assert_eq!(cpu_percent(&s), 80.0);
    }

    #[test]
    fn test_non_positive_system_delta() {
        assert_eq!(cpu_percent(&snapshot((0, 100), (500, 500), 2)), 0.0);
        assert_eq!(cpu_percent(&snapshot((0, 100), (600, 500), 2)), 0.0);
    }

    #[test]
    fn test_counter_reset_reports_zero() {
        // Container restarted between readings
        assert_eq!(cpu_percent(&snapshot((900, 100), (0, 1_000), 2)), 0.0);
    }

    #[test]
    fn test_percpu_fallback() {
        let mut s = snapshot((0, 250), (0, 1_000), 0);
        s.current.percpu_count = 2;
        assert_eq!(cpu_percent(&s), 50.0);

        s.current.percpu_count = 0;
        assert_eq!(cpu_percent(&s), 25.0);
    }

    #[test]
    fn test_rounds_to_three_places() {
        let s = snapshot((0, 1), (0, 3), 1);
        assert_eq!(cpu_percent(&s), 33.333);
    }

    #[test]
    fn test_memory_megabytes() {
        assert_eq!(memory_megabytes(0), 0.0);
        assert_eq!(memory_megabytes(52_428_800), 52.429);
        assert_eq!(memory_megabytes(1_000_000), 1.0);
    }
}
