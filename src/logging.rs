//! Logging configuration shared by the coordinator, worker, and sequential
//! driver binaries.

/// Initialize `tracing` for one of the engine's binaries.
///
/// `verbose` is the repeat count of a `-v` CLI flag: `0` logs at `info`,
/// `1` at `debug`, `2+` at `trace` with module targets, thread ids, and
/// line numbers also enabled.
pub fn init(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(verbose >= 2)
        .with_thread_ids(verbose >= 3)
        .with_line_number(verbose >= 3)
        .init();
}
