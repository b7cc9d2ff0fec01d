use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A parallelism probe, not a real application: drops a sentinel file in
/// the working directory, counts how many *other* sentinel files
/// currently belong to live processes, sleeps a second, then cleans up.
/// Confirms that map tasks assigned to distinct workers actually run
/// concurrently rather than being serialized somewhere.
pub struct MapTiming;

impl Plugin for MapTiming {
    fn name(&self) -> &'static str {
        "map-timing"
    }

    fn map(&self, _filename: &str, _contents: &str) -> Vec<Pair> {
        let pid = std::process::id();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs_f64();
        let n = count_live_siblings("map", pid);

        vec![
            Pair::new(format!("times-{pid}"), format!("{now:.1}")),
            Pair::new(format!("parallel-{pid}"), n.to_string()),
        ]
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let mut sorted = values.to_vec();
        sorted.sort();
        sorted.join(" ")
    }
}

/// Drops `worker-{phase}-{pid}`, scans the working directory for sibling
/// sentinel files whose PID is still alive, sleeps briefly so overlapping
/// workers have a chance to observe each other, then removes its own
/// sentinel.
fn count_live_siblings(phase: &str, pid: u32) -> usize {
    let my_file = format!("worker-{phase}-{pid}");
    if fs::File::create(&my_file).is_err() {
        return 0;
    }

    let prefix = format!("worker-{phase}-");
    let mut count = 0;
    if let Ok(entries) = fs::read_dir(".") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(other_pid) = name.strip_prefix(&prefix) else { continue };
            if let Ok(other_pid) = other_pid.parse::<u32>() {
                if process_is_alive(other_pid) {
                    count += 1;
                }
            }
        }
    }

    std::thread::sleep(Duration::from_secs(1));
    let _ = fs::remove_file(&my_file);
    count
}

fn process_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_sorts_values_deterministically() {
        let values = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(MapTiming.reduce("k", &values), "a b c");
    }

    #[test]
    fn current_process_counts_as_alive() {
        assert!(process_is_alive(std::process::id()));
    }
}
