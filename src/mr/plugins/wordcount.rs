use crate::mr::plugin::Plugin;
use crate::mr::rpc::Pair;

/// Counts word occurrences. The canonical MapReduce example: `Map` splits
/// on runs of non-letter characters and emits `(word, "1")`; `Reduce` sums
/// the values for a key.
pub struct WordCount;

impl Plugin for WordCount {
    fn name(&self) -> &'static str {
        "wordcount"
    }

    fn map(&self, _filename: &str, contents: &str) -> Vec<Pair> {
        contents
            .split(|c: char| !c.is_alphabetic())
            .filter(|word| !word.is_empty())
            .map(|word| Pair::new(word, "1"))
            .collect()
    }

    fn reduce(&self, _key: &str, values: &[String]) -> String {
        let total: i64 = values
            .iter()
            .map(|v| v.parse::<i64>().expect("wordcount values are always \"1\""))
            .sum();
        total.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_words_to_ones() {
        let pairs = WordCount.map("a.txt", "foo bar foo");
        assert_eq!(
            pairs,
            vec![Pair::new("foo", "1"), Pair::new("bar", "1"), Pair::new("foo", "1")]
        );
    }

    #[test]
    fn reduce_sums_counts() {
        let values = vec!["1".to_string(), "1".to_string(), "1".to_string()];
        assert_eq!(WordCount.reduce("foo", &values), "3");
    }

    #[test]
    fn splits_on_punctuation_and_digits() {
        let pairs = WordCount.map("a.txt", "foo, bar42 baz!!");
        let words: Vec<&str> = pairs.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(words, vec!["foo", "bar", "baz"]);
    }
}
