//! Timing instrumentation for runs and sweeps.
//!
//! Off unless `PULLBACK_PROFILE=1` (or `true`) is set when `init` is called.
//! When enabled, scopes and pipeline phases log their wall time as `tracing`
//! events under the `profile` target.
//!
//! ```
//! use pullback_runner::profiling::ProfileScope;
//!
//! fn load() {
//!     let _scope = ProfileScope::new("load");
//!     // timing logged on drop
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use pullback_core::telemetry::PhaseHooks;

static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

static TOTAL_OPERATIONS: AtomicU64 = AtomicU64::new(0);

/// Read `PULLBACK_PROFILE` and set the global flag. Call once at startup.
pub fn init() {
    let enabled = std::env::var("PULLBACK_PROFILE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    set_enabled(enabled);
    if enabled {
        tracing::info!(target: "profile", "profiling enabled");
    }
}

pub fn set_enabled(enabled: bool) {
    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn is_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

fn report(name: &str, elapsed: Duration) {
    if is_enabled() {
        tracing::info!(
            target: "profile",
            name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "timed"
        );
    }
}

/// Measures from construction to drop.
pub struct ProfileScope {
    name: &'static str,
    start: Instant,
}

impl ProfileScope {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        TOTAL_OPERATIONS.fetch_add(1, Ordering::Relaxed);
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        report(self.name, self.start.elapsed());
    }
}

/// Run `f`, returning its result and how long it took.
pub fn profile<F, R>(name: &'static str, f: F) -> (R, Duration)
where
    F: FnOnce() -> R,
{
    TOTAL_OPERATIONS.fetch_add(1, Ordering::Relaxed);
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();
    report(name, elapsed);
    (result, elapsed)
}

/// Scopes, profiled closures and completed phases since process start.
pub fn total_operations() -> u64 {
    TOTAL_OPERATIONS.load(Ordering::Relaxed)
}

/// Pipeline phase hooks that time each phase.
///
/// Keyed by phase name, so one instance must not be shared by concurrent runs.
#[derive(Debug, Default)]
pub struct ProfileHooks {
    started: Mutex<HashMap<String, Instant>>,
    finished: Mutex<Vec<(String, Duration)>>,
}

impl ProfileHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed phases in the order they finished.
    pub fn timings(&self) -> Vec<(String, Duration)> {
        self.finished
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }
}

impl PhaseHooks for ProfileHooks {
    fn start_phase(&self, name: &str) {
        if let Ok(mut started) = self.started.lock() {
            started.insert(name.to_string(), Instant::now());
        }
    }

    fn end_phase(&self, name: &str) {
        let Some(start) = self.started.lock().ok().and_then(|mut s| s.remove(name)) else {
            return;
        };
        let elapsed = start.elapsed();
        TOTAL_OPERATIONS.fetch_add(1, Ordering::Relaxed);
        report(name, elapsed);
        if let Ok(mut finished) = self.finished.lock() {
            finished.push((name.to_string(), elapsed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pullback_core::telemetry::{in_phase, phase};

    #[test]
    fn scope_measures_elapsed() {
        let scope = ProfileScope::new("scope");
        std::thread::sleep(Duration::from_millis(2));
        assert!(scope.elapsed() >= Duration::from_millis(2));
    }

    #[test]
    fn profile_returns_closure_result() {
        let (sum, _elapsed) = profile("sum", || (0..100).sum::<i32>());
        assert_eq!(sum, 4950);
    }

    #[test]
    fn operations_counter_increases() {
        let before = total_operations();
        let _a = ProfileScope::new("a");
        let _b = ProfileScope::new("b");
        assert!(total_operations() >= before + 2);
    }

    #[test]
    fn hooks_record_phases_in_finish_order() {
        let hooks = ProfileHooks::new();
        in_phase(&hooks, phase::VALIDATE, || ());
        in_phase(&hooks, phase::STRATEGY, || ());
        let names: Vec<String> = hooks.timings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["validate", "strategy"]);
    }

    #[test]
    fn unmatched_end_is_ignored() {
        let hooks = ProfileHooks::new();
        hooks.end_phase(phase::HASH);
        assert!(hooks.timings().is_empty());
    }
}
