//! Phase hooks: optional timing callbacks around the pipeline's major stages.
//!
//! Hooks observe only. The pipeline's output is identical with or without them.

/// Pipeline phases reported to `PhaseHooks`.
pub mod phase {
    pub const VALIDATE: &str = "validate";
    pub const STRATEGY: &str = "strategy";
    pub const METRICS: &str = "metrics";
    pub const HASH: &str = "hash";
}

pub trait PhaseHooks: Send + Sync {
    fn start_phase(&self, name: &str);
    fn end_phase(&self, name: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl PhaseHooks for NoopHooks {
    fn start_phase(&self, _name: &str) {}
    fn end_phase(&self, _name: &str) {}
}

/// Runs `f` between `start_phase(name)` and `end_phase(name)`.
pub fn in_phase<R>(hooks: &dyn PhaseHooks, name: &str, f: impl FnOnce() -> R) -> R {
    hooks.start_phase(name);
    let out = f();
    hooks.end_phase(name);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl PhaseHooks for Recorder {
        fn start_phase(&self, name: &str) {
            self.0.lock().unwrap().push(format!("+{name}"));
        }
        fn end_phase(&self, name: &str) {
            self.0.lock().unwrap().push(format!("-{name}"));
        }
    }

    #[test]
    fn in_phase_brackets_the_closure() {
        let rec = Recorder::default();
        let value = in_phase(&rec, phase::METRICS, || 42);
        assert_eq!(value, 42);
        assert_eq!(*rec.0.lock().unwrap(), vec!["+metrics", "-metrics"]);
    }
}
