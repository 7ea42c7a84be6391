mod builtin;
mod core;

pub use builtin::{DebugErrorsPlug, ForceSslPlug};
pub use core::{CompiledPipeline, PipelineStep, Plug};
