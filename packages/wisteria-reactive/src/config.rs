//! The cycle-guard tuning surface.

/// Thresholds for the development-only cycle guard. Tripping a threshold either panics
/// (`dev_mode` strict) or logs a single warning per guarded period (permissive, and only visible
/// with the `trace` feature enabled); `dev_mode` defaults to `cfg!(debug_assertions)`, so a
/// release build without debug assertions neither panics nor warns on these thresholds.
#[derive(Debug, Clone, Copy)]
pub struct CycleGuardConfig {
    /// Upper bound on how many times a single effect may re-run within one flush before the
    /// guard considers it a runaway loop.
    pub max_effect_runs_per_flush: u32,
    /// Upper bound on how many drain cycles a single microtask flush may perform while the
    /// dirty set keeps being non-empty.
    pub max_flush_cycles_per_microtask: u32,
    /// Upper bound on how deep `push_root`/`pop_root` may reenter before the guard trips.
    pub max_root_reentrant_depth: u32,
    /// Size of the sliding window used to compute `high_usage_ratio`.
    pub window_size: u32,
    /// Fraction of the window that must be "high effect activity" before a warning fires.
    pub high_usage_ratio: f32,
    /// Strict (panic) vs. permissive (log) behavior when a threshold trips.
    pub dev_mode: bool,
}

impl Default for CycleGuardConfig {
    fn default() -> Self {
        CycleGuardConfig {
            max_effect_runs_per_flush: 200,
            max_flush_cycles_per_microtask: 1000,
            max_root_reentrant_depth: 2000,
            window_size: 32,
            high_usage_ratio: 0.75,
            dev_mode: cfg!(debug_assertions),
        }
    }
}
