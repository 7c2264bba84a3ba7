pub mod colony;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message every 300 simulation ticks when the `perf_stats` feature is enabled.
///
/// The first argument is anything that derefs to [`colony::simulation::SimTick`].
/// Without `perf_stats` the macro expands to an empty block and the format
/// arguments are never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(tick, "[EXCHANGE] {} bees at flowers", query.iter().len());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        if $tick.0 % 300 == 0 {
            bevy::log::info!(target: "apiary::perf", $($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {};
}
