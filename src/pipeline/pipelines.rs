//! Pipelines Module
//!
//! Assembled pipelines, the registry of named valves used to build them from
//! configuration, and the per-request run over the three stages.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, SiteConfig};
use crate::error::{PipelineError, Result};
use crate::http::{PageRequest, PageResponse};
use crate::pipeline::{assemble, RegisteredValve, Valve, ValveContext};

// == Stage ==
/// The three independently assembled valve sequences of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Initialization,
    Processing,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Initialization, Stage::Processing, Stage::Cleanup];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initialization => "initialization",
            Stage::Processing => "processing",
            Stage::Cleanup => "cleanup",
        }
    }

    fn index(self) -> usize {
        match self {
            Stage::Initialization => 0,
            Stage::Processing => 1,
            Stage::Cleanup => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Pipeline ==
/// A named pipeline with its three assembled stages.
///
/// Immutable once built; concurrent requests share it read-only.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    initialization: Arc<[RegisteredValve]>,
    processing: Arc<[RegisteredValve]>,
    cleanup: Arc<[RegisteredValve]>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembled valves of `stage`, in execution order.
    pub fn valves(&self, stage: Stage) -> &[RegisteredValve] {
        self.stage(stage)
    }

    fn stage(&self, stage: Stage) -> &Arc<[RegisteredValve]> {
        match stage {
            Stage::Initialization => &self.initialization,
            Stage::Processing => &self.processing,
            Stage::Cleanup => &self.cleanup,
        }
    }

    pub fn valve_names(&self, stage: Stage) -> Vec<&str> {
        self.valves(stage).iter().map(RegisteredValve::name).collect()
    }

    // == Invoke ==
    /// Runs one request through the pipeline.
    ///
    /// Processing only runs when initialization succeeded. Cleanup always
    /// runs afterwards; its own failure is logged and never replaces the
    /// outcome of the earlier stages.
    pub async fn invoke(&self, request: PageRequest) -> Result<PageResponse> {
        let mut ctx = ValveContext::new(request);

        let outcome = match self.walk(&mut ctx, Stage::Initialization).await {
            Ok(()) => self.walk(&mut ctx, Stage::Processing).await,
            Err(error) => Err(error),
        };

        if let Err(error) = self.walk(&mut ctx, Stage::Cleanup).await {
            warn!(pipeline = %self.name, error = %error, "Cleanup valve failed");
        }

        if let Err(error) = &outcome {
            debug!(pipeline = %self.name, error = %error, "Pipeline invocation failed");
        }
        outcome.map(|()| ctx.into_response())
    }

    async fn walk(&self, ctx: &mut ValveContext, stage: Stage) -> Result<()> {
        ctx.walk(stage.as_str(), self.stage(stage).clone()).await
    }
}

// == Pipeline Builder ==
/// Collects base and extra valves per stage, then assembles each stage.
pub struct PipelineBuilder {
    name: String,
    base: [Vec<RegisteredValve>; 3],
    extra: [Vec<RegisteredValve>; 3],
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: Default::default(),
            extra: Default::default(),
        }
    }

    /// Appends `valve` to the base sequence of `stage`.
    pub fn valve(mut self, stage: Stage, valve: RegisteredValve) -> Self {
        self.base[stage.index()].push(valve);
        self
    }

    /// Adds `valve` as an extra valve of `stage`, placed by its constraints.
    pub fn extra(mut self, stage: Stage, valve: RegisteredValve) -> Self {
        self.extra[stage.index()].push(valve);
        self
    }

    /// Assembles all three stages. Any ordering error aborts the build.
    pub fn build(self) -> Result<Pipeline> {
        Ok(Pipeline {
            initialization: self.assemble_stage(Stage::Initialization)?,
            processing: self.assemble_stage(Stage::Processing)?,
            cleanup: self.assemble_stage(Stage::Cleanup)?,
            name: self.name,
        })
    }

    fn assemble_stage(&self, stage: Stage) -> Result<Arc<[RegisteredValve]>> {
        let label = format!("{}/{}", self.name, stage);
        let index = stage.index();
        Ok(assemble(&label, &self.base[index], &self.extra[index])?.into())
    }
}

// == Valve Registry ==
/// Valve implementations by configuration name.
#[derive(Clone, Default)]
pub struct ValveRegistry {
    valves: HashMap<String, Arc<dyn Valve>>,
}

impl ValveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `valve` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, valve: Arc<dyn Valve>) {
        self.valves.insert(name.into(), valve);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.valves.contains_key(name)
    }

    /// A fresh registration of the valve called `name`.
    pub fn resolve(&self, name: &str) -> Result<RegisteredValve> {
        self.valves
            .get(name)
            .map(|valve| RegisteredValve::new(name, valve.clone()))
            .ok_or_else(|| PipelineError::UnknownValve(name.to_string()))
    }

    /// Builds one pipeline from its configuration.
    pub fn build_pipeline(&self, config: &PipelineConfig) -> Result<Pipeline> {
        let mut builder = Pipeline::builder(config.name.clone());

        for stage in Stage::ALL {
            for name in config.stage(stage) {
                builder = builder.valve(stage, self.resolve(name)?);
            }
        }
        for extra in &config.extra {
            let valve = self
                .resolve(&extra.valve)?
                .after(&extra.after_valves)
                .before(&extra.before_valves);
            builder = builder.extra(extra.stage, valve);
        }

        builder.build()
    }
}

impl fmt::Debug for ValveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.valves.keys().collect();
        names.sort();
        f.debug_struct("ValveRegistry").field("valves", &names).finish()
    }
}

// == Pipelines ==
/// Every configured pipeline by name, plus the one serving by default.
#[derive(Debug)]
pub struct Pipelines {
    pipelines: HashMap<String, Arc<Pipeline>>,
    default_pipeline: String,
}

impl Pipelines {
    /// Assembles all pipelines of `site` with valves from `registry`.
    ///
    /// Fails on the first configuration error; no partial set is returned.
    pub fn from_config(site: &SiteConfig, registry: &ValveRegistry) -> Result<Self> {
        let mut pipelines = HashMap::new();
        for config in &site.pipelines {
            let pipeline = registry.build_pipeline(config)?;
            if pipelines
                .insert(config.name.clone(), Arc::new(pipeline))
                .is_some()
            {
                return Err(PipelineError::InvalidConfig(format!(
                    "pipeline '{}' defined twice",
                    config.name
                )));
            }
        }

        Self::new(pipelines, &site.default_pipeline)
    }

    pub fn new(pipelines: HashMap<String, Arc<Pipeline>>, default_pipeline: &str) -> Result<Self> {
        if !pipelines.contains_key(default_pipeline) {
            return Err(PipelineError::UnknownPipeline(default_pipeline.to_string()));
        }
        info!(
            count = pipelines.len(),
            default = default_pipeline,
            "Pipelines assembled"
        );
        Ok(Self {
            pipelines,
            default_pipeline: default_pipeline.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Result<Arc<Pipeline>> {
        self.pipelines
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownPipeline(name.to_string()))
    }

    pub fn default_pipeline(&self) -> Result<Arc<Pipeline>> {
        self.get(&self.default_pipeline)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.pipelines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
