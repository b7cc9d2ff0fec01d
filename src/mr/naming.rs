//! The base-name grammars that make up the on-disk half of the protocol:
//! intermediate files (`intermediate-M{m}-R{r}.json`) and final reduce
//! output files (`mapreduce-out-{r:0W}-of-{R-1}`).

use crate::error::EngineError;

/// Base name for the intermediate file produced by map task `map_number`
/// for reduce bucket `bucket`.
pub fn intermediate_file_name(map_number: usize, bucket: usize) -> String {
    format!("intermediate-M{map_number}-R{bucket}.json")
}

/// Parse a `intermediate-M{m}-R{r}.json` base name and return its bucket
/// number. Used by reduce-task synthesis to group intermediate files by
/// bucket; the map number is not needed for that and is discarded.
pub fn parse_bucket_from_intermediate_name(base_name: &str) -> Result<usize, EngineError> {
    let rest = base_name
        .strip_prefix("intermediate-M")
        .ok_or_else(|| EngineError::MalformedIntermediateName(base_name.to_string()))?;
    let (_map_part, rest) = rest
        .split_once("-R")
        .ok_or_else(|| EngineError::MalformedIntermediateName(base_name.to_string()))?;
    let bucket_part = rest
        .strip_suffix(".json")
        .ok_or_else(|| EngineError::MalformedIntermediateName(base_name.to_string()))?;
    bucket_part
        .parse::<usize>()
        .map_err(|_| EngineError::MalformedIntermediateName(base_name.to_string()))
}

/// Base name for the final output file of reduce task `bucket` out of a
/// fanout of `reduce_fanout`, zero-padded to the decimal width of
/// `reduce_fanout - 1`.
pub fn output_file_name(bucket: usize, reduce_fanout: usize) -> String {
    let max_bucket = reduce_fanout.saturating_sub(1);
    let width = max_bucket.to_string().len();
    format!("mapreduce-out-{bucket:0width$}-of-{max_bucket}", width = width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bucket_number() {
        let name = intermediate_file_name(3, 7);
        assert_eq!(name, "intermediate-M3-R7.json");
        assert_eq!(parse_bucket_from_intermediate_name(&name).unwrap(), 7);
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(parse_bucket_from_intermediate_name("not-an-intermediate-file").is_err());
        assert!(parse_bucket_from_intermediate_name("intermediate-M3-R.json").is_err());
        assert!(parse_bucket_from_intermediate_name("intermediate-M3-R7.txt").is_err());
    }

    #[test]
    fn output_name_is_zero_padded_to_width_of_r_minus_one() {
        assert_eq!(output_file_name(0, 1), "mapreduce-out-0-of-0");
        assert_eq!(output_file_name(3, 10), "mapreduce-out-3-of-9");
        assert_eq!(output_file_name(7, 100), "mapreduce-out-07-of-99");
    }
}
