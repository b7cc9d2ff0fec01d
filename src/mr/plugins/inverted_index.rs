use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;
use std::collections::BTreeSet;

/// Emits `(word, filename)` per occurrence; `Reduce` collects the sorted,
/// de-duplicated set of filenames a word appears in.
pub struct InvertedIndex;

impl Plugin for InvertedIndex {
    fn name(&self) -> &'static str {
        "inverted-index"
    }

    fn map(&self, filename: &str, contents: &str) -> Vec<Pair> {
        let mut seen = BTreeSet::new();
        contents
            .split(|c: char| !c.is_alphabetic())
            .filter(|word| !word.is_empty())
            .filter(|word| seen.insert(word.to_string()))
            .map(|word| Pair::new(word, filename))
            .collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let files: BTreeSet<&str> = values.iter().map(String::as_str).collect();
        let count = files.len();
        let joined = files.into_iter().collect::<Vec<_>>().join(",");
        format!("{count} {joined}")
    }
}
