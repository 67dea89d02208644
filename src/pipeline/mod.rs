//! Pipeline Module
//!
//! Valves, the assembler that orders them, and the per-request invocation
//! that walks an assembled pipeline.

mod assembler;
mod context;
mod pipelines;
mod valve;


// Re-export public types
pub use assembler::assemble;
pub use context::ValveContext;
pub use pipelines::{Pipeline, PipelineBuilder, Pipelines, Stage, ValveRegistry};
pub use valve::{parse_valve_names, RegisteredValve, Valve};
