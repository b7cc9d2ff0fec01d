use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;
use once_cell::sync::Lazy;
use regex::Regex;
use std::env;

/// Environment variable carrying the grep pattern; falls back to `"A"` to
/// match `original_source/plugins/grep/grep.go`.
const PATTERN_ENV: &str = "GREP_PATTERN";

fn pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        let raw = env::var(PATTERN_ENV).unwrap_or_else(|_| "A".to_string());
        Regex::new(&raw).unwrap_or_else(|_| Regex::new(&regex::escape(&raw)).expect("escaped pattern always compiles"))
    });
    &PATTERN
}

/// Emits the lines of each input file that match `GREP_PATTERN` (or `"A"`),
/// keyed by filename; `Reduce` joins the matches for a file with newlines.
pub struct Grep;

impl Plugin for Grep {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn map(&self, filename: &str, contents: &str) -> Vec<Pair> {
        let re = pattern();
        contents
            .lines()
            .filter(|line| re.is_match(line))
            .map(|line| Pair::new(filename, line))
            .collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        values.join("\n")
    }
}
