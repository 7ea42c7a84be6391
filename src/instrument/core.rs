use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// An observer of instrumented units of work.
///
/// Observers declare the event names they care about up front; interest is
/// resolved once, when the registry is compiled, not per call. For each
/// instrumented unit the dispatcher calls [`Instrumenter::start`], runs the
/// work, measures elapsed wall-clock microseconds, then calls
/// [`Instrumenter::stop`] with the observer's own start result.
///
/// Hooks run synchronously, inline with the instrumented work, in
/// registration order. A fault inside a hook is not caught: instrumentation
/// side effects should surface as failures, not be masked.
pub trait Instrumenter: Send + Sync {
    /// Event names this observer wants to see.
    fn events(&self) -> &[&str];

    /// Called before the work runs. The returned value is handed back to
    /// [`Instrumenter::stop`] untouched.
    fn start(&self, event: &str, compile_meta: &Value, runtime_meta: &Value) -> Value;

    /// Called after the work completes with the elapsed time in microseconds.
    fn stop(&self, event: &str, elapsed_us: u64, start_result: Value);
}

/// Event-name → ordered-observer dispatch table, built once at endpoint
/// compile time from the configured observer list.
///
/// Events nobody registered for cost nothing beyond one map lookup: the work
/// closure runs directly, untimed.
#[derive(Clone, Default)]
pub struct InstrumenterRegistry {
    table: HashMap<String, Vec<Arc<dyn Instrumenter>>>,
}

impl InstrumenterRegistry {
    /// Build the dispatch table. Observers keep their configured order per
    /// event.
    pub fn compile(observers: &[Arc<dyn Instrumenter>]) -> Self {
        let mut table: HashMap<String, Vec<Arc<dyn Instrumenter>>> = HashMap::new();
        for observer in observers {
            for event in observer.events() {
                table
                    .entry((*event).to_string())
                    .or_default()
                    .push(Arc::clone(observer));
            }
        }
        debug!(
            observers = observers.len(),
            events = table.len(),
            "Instrumenter dispatch table compiled"
        );
        Self { table }
    }

    /// Number of observers interested in `event`.
    pub fn observer_count(&self, event: &str) -> usize {
        self.table.get(event).map(Vec::len).unwrap_or(0)
    }

    /// Wrap `work` with start/stop hooks for every observer registered for
    /// `event`. With zero observers the work runs directly, unwrapped.
    pub fn instrument<T, F>(
        &self,
        event: &str,
        compile_meta: &Value,
        runtime_meta: &Value,
        work: F,
    ) -> T
    where
        F: FnOnce() -> T,
    {
        let Some(observers) = self.table.get(event) else {
            return work();
        };

        let start_results: Vec<Value> = observers
            .iter()
            .map(|o| o.start(event, compile_meta, runtime_meta))
            .collect();

        let started = Instant::now();
        let result = work();
        let elapsed_us = started.elapsed().as_micros() as u64;

        for (observer, start_result) in observers.iter().zip(start_results) {
            observer.stop(event, elapsed_us, start_result);
        }

        result
    }
}

/// Instrument through an optional registry handle.
///
/// Call sites that cannot statically resolve an endpoint identity fall back
/// to "no instrumentation" rather than failing.
pub fn instrument_with<T, F>(
    registry: Option<&InstrumenterRegistry>,
    event: &str,
    compile_meta: &Value,
    runtime_meta: &Value,
    work: F,
) -> T
where
    F: FnOnce() -> T,
{
    match registry {
        Some(registry) => registry.instrument(event, compile_meta, runtime_meta, work),
        None => work(),
    }
}
