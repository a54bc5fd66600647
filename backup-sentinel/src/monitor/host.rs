//! Host metrics read through `sysinfo`.

use super::{percent_of, MetricsSource, MonitorError, NetworkCounters, ResourceSample};
use std::path::PathBuf;
use sysinfo::{Disks, Networks, System};

/// Live metrics for the machine the sentinel runs on
pub struct HostMetrics {
    system: System,
    disk_path: PathBuf,
    network: bool,
}

impl HostMetrics {
    /// `disk_path` may be any path; usage is reported for the disk mounted closest above it
    pub fn new(disk_path: impl Into<PathBuf>, network: bool) -> Self {
        Self {
            system: System::new(),
            disk_path: disk_path.into(),
            network,
        }
    }

    fn memory_percent(&mut self) -> Result<f64, MonitorError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(MonitorError::Unavailable("memory"));
        }
        Ok(percent_of(self.system.used_memory(), total))
    }

    fn disk_percent(&self) -> Result<f64, MonitorError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|disk| self.disk_path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .ok_or_else(|| MonitorError::DiskNotFound(self.disk_path.clone()))?;

        let total = disk.total_space();
        if total == 0 {
            return Err(MonitorError::Unavailable("disk"));
        }
        Ok(percent_of(total.saturating_sub(disk.available_space()), total))
    }

    fn network_counters(&self) -> Option<NetworkCounters> {
        if !self.network {
            return None;
        }
        let networks = Networks::new_with_refreshed_list();
        let counters = networks.list().values().fold(
            NetworkCounters {
                received_bytes: 0,
                transmitted_bytes: 0,
            },
            |acc, data| NetworkCounters {
                received_bytes: acc.received_bytes.saturating_add(data.total_received()),
                transmitted_bytes: acc.transmitted_bytes.saturating_add(data.total_transmitted()),
            },
        );
        Some(counters)
    }
}

impl MetricsSource for HostMetrics {
    fn begin_cpu_window(&mut self) {
        self.system.refresh_cpu_usage();
    }

    fn sample(&mut self) -> Result<ResourceSample, MonitorError> {
        self.system.refresh_cpu_usage();
        let cpu = f64::from(self.system.global_cpu_usage());
        let memory = self.memory_percent()?;
        let disk = self.disk_percent()?;
        Ok(ResourceSample::new(cpu, memory, disk, self.network_counters()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_live_sample_in_range() {
        let mut host = HostMetrics::new("/", true);
        host.begin_cpu_window();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);

        let memory = host.memory_percent().expect("memory is readable");
        assert!((0.0..=100.0).contains(&memory));

        // Containers may hide the root mount from the disk list
        match host.sample() {
            Ok(sample) => {
                for value in [sample.cpu_percent, sample.memory_percent, sample.disk_percent] {
                    assert!((0.0..=100.0).contains(&value), "{value} out of range");
                }
                assert!(sample.network.is_some());
            }
            Err(MonitorError::DiskNotFound(_)) | Err(MonitorError::Unavailable("disk")) => {}
            Err(e) => panic!("unexpected sampling error: {e}"),
        }
    }

    #[test]
    fn test_network_counters_optional() {
        let host = HostMetrics::new("/", false);
        assert!(host.network_counters().is_none());
    }
}
