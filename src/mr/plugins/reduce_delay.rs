use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;
use std::thread;
use std::time::Duration;

/// Sleeps 5s inside `Reduce` for one designated key. 5s is comfortably
/// under the 10s lease threshold, so the task should complete without
/// being reassigned out from under the worker — exercises that boundary
/// directly.
pub struct ReduceDelay;

impl Plugin for ReduceDelay {
    fn name(&self) -> &'static str {
        "reduce-delay"
    }

    fn map(&self, filename: &str, _contents: &str) -> Vec<Pair> {
        vec![Pair::new(filename, "1")]
    }

    fn reduce(&self, key: &str, values: &[String]) -> String {
        if key.contains("1.txt") {
            thread::sleep(Duration::from_secs(5));
        }
        values.len().to_string()
    }
}
