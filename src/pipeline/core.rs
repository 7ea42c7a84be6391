use crate::endpoint::RequestContext;
use std::sync::Arc;
use tracing::debug;

/// One unit of request-processing middleware.
///
/// A plug takes the request context by value and returns it, possibly
/// transformed. Calling [`RequestContext::halt`] (or
/// [`RequestContext::respond`]) short-circuits the rest of the compiled
/// chain; this is conventional middleware semantics, not exception-based.
pub trait Plug: Send + Sync {
    fn call(&self, ctx: RequestContext) -> RequestContext;
}

/// Plain functions and closures are plugs.
impl<F> Plug for F
where
    F: Fn(RequestContext) -> RequestContext + Send + Sync,
{
    fn call(&self, ctx: RequestContext) -> RequestContext {
        self(ctx)
    }
}

/// One registered step: a plug, its display name, and whether compile-time
/// configuration left it enabled. Ordering is insertion order and is
/// significant; a later step only runs if no earlier step halted.
#[derive(Clone)]
pub struct PipelineStep {
    pub name: String,
    pub plug: Arc<dyn Plug>,
    pub enabled: bool,
}

impl PipelineStep {
    pub fn new(name: &str, plug: Arc<dyn Plug>) -> Self {
        Self {
            name: name.to_string(),
            plug,
            enabled: true,
        }
    }
}

type Chain = Arc<dyn Fn(RequestContext) -> RequestContext + Send + Sync>;

/// An ordered step list frozen into a single composed handler.
///
/// Compilation happens once, at endpoint build time: disabled steps are
/// dropped and the remaining plugs are folded back-to-front into nested
/// closures, so per-request dispatch walks a pre-built call chain with no
/// step-list iteration and no enablement checks. Zero steps compile to the
/// identity chain.
#[derive(Clone)]
pub struct CompiledPipeline {
    chain: Chain,
    len: usize,
}

impl CompiledPipeline {
    pub fn compile(steps: &[PipelineStep]) -> Self {
        let enabled: Vec<&PipelineStep> = steps.iter().filter(|s| s.enabled).collect();
        let len = enabled.len();

        let mut chain: Chain = Arc::new(|ctx| ctx);
        for step in enabled.into_iter().rev() {
            let plug = Arc::clone(&step.plug);
            let name = step.name.clone();
            let next = chain;
            chain = Arc::new(move |ctx: RequestContext| {
                if ctx.is_halted() {
                    return ctx;
                }
                let ctx = plug.call(ctx);
                if ctx.is_halted() {
                    debug!(step = %name, "Pipeline halted");
                    return ctx;
                }
                next(ctx)
            });
        }

        debug!(steps = steps.len(), compiled = len, "Pipeline compiled");
        Self { chain, len }
    }

    /// Thread a request context through the chain.
    #[inline]
    pub fn call(&self, ctx: RequestContext) -> RequestContext {
        (self.chain)(ctx)
    }

    /// Number of steps compiled into the chain.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
