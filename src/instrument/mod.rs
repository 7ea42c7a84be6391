mod core;

pub use core::{instrument_with, Instrumenter, InstrumenterRegistry};
