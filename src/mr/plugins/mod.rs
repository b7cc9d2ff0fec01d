//! Sample plugins. These exercise the engine rather than define it, and
//! are re-expressed here as [`Plugin`](super::plugin::Plugin) registry
//! entries rather than dynamically loaded shared objects.

mod crash_delay;
mod grep;
mod inverted_index;
mod map_timing;
mod reduce_delay;
mod wordcount;

use super::plugin::Plugin;

/// Every sample plugin, handed to the registry at first use.
pub fn all() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(wordcount::WordCount),
        Box::new(grep::Grep),
        Box::new(inverted_index::InvertedIndex),
        Box::new(map_timing::MapTiming),
        Box::new(reduce_delay::ReduceDelay),
        Box::new(crash_delay::CrashDelay),
    ]
}
