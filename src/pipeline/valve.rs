//! Valve Module
//!
//! A valve is one named unit of request logic. Its ordering constraints
//! travel with its registration, never with its position.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::ValveContext;

// == Valve Trait ==
/// Request logic invoked as part of a pipeline stage.
///
/// Implementations call `ctx.invoke_next()` to continue the chain. Not
/// calling it short-circuits the remaining valves of the stage.
#[async_trait]
pub trait Valve: Send + Sync {
    async fn invoke(&self, ctx: &mut ValveContext) -> Result<()>;
}

// == Registered Valve ==
/// A valve together with its name and ordering constraints.
///
/// Clones share the valve itself; assembling never mutates a registration,
/// so the same one can be placed into several pipelines.
#[derive(Clone)]
pub struct RegisteredValve {
    name: String,
    after: BTreeSet<String>,
    before: BTreeSet<String>,
    valve: Arc<dyn Valve>,
}

impl RegisteredValve {
    /// Registers `valve` under `name` with no ordering constraints.
    pub fn new(name: impl Into<String>, valve: Arc<dyn Valve>) -> Self {
        Self {
            name: name.into(),
            after: BTreeSet::new(),
            before: BTreeSet::new(),
            valve,
        }
    }

    /// Adds valves this one must run after, as a comma-separated list.
    pub fn after(mut self, names: &str) -> Self {
        self.after.extend(parse_valve_names(names));
        self
    }

    /// Adds valves this one must run before, as a comma-separated list.
    pub fn before(mut self, names: &str) -> Self {
        self.before.extend(parse_valve_names(names));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn after_names(&self) -> &BTreeSet<String> {
        &self.after
    }

    pub fn before_names(&self) -> &BTreeSet<String> {
        &self.before
    }

    pub fn valve(&self) -> &Arc<dyn Valve> {
        &self.valve
    }
}

impl fmt::Debug for RegisteredValve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredValve")
            .field("name", &self.name)
            .field("after", &self.after)
            .field("before", &self.before)
            .finish_non_exhaustive()
    }
}

/// Splits a comma-separated valve name list into a set.
///
/// Names are trimmed; empty items are dropped.
pub fn parse_valve_names(names: &str) -> BTreeSet<String> {
    names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
