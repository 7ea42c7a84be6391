mod builder;
mod core;
mod request;

pub use builder::EndpointBuilder;
pub use core::{DefaultErrorRenderer, Endpoint, ErrorRenderer, PipelineFault};
pub use request::{HeaderVec, RequestContext, MAX_INLINE_HEADERS};
