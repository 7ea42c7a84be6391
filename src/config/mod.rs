mod cache;
mod load;
mod types;

pub use cache::ConfigCache;
pub use load::{endpoint_overrides, load, load_config_file};
pub use types::{EndpointConfig, UrlConfig, COMPILE_TIME_KEYS};
