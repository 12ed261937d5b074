//! Layered configuration.
//!
//! Built-in defaults, then an optional TOML file, then `ROOTSCOUT_`-prefixed
//! environment variables with `__` as the section separator
//! (`ROOTSCOUT_HEALTH__ERROR_THRESHOLD=5`).

use crate::adapters::reasoner::ReasonerKind;
use crate::domain::builder::BuilderParams;
use crate::domain::correlator::CorrelationParams;
use crate::domain::graph::DEFAULT_TIMELINE_CAPACITY;
use crate::domain::isolator::IsolationParams;
use crate::domain::policy::HealthPolicy;
use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Events retained per service node.
    pub timeline_capacity: usize,
    pub span_index_capacity: usize,
    pub slow_span_ms: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let builder = BuilderParams::default();
        Self {
            timeline_capacity: DEFAULT_TIMELINE_CAPACITY,
            span_index_capacity: builder.span_index_capacity,
            slow_span_ms: builder.slow_span_ms,
        }
    }
}

impl GraphConfig {
    pub fn builder_params(&self) -> BuilderParams {
        BuilderParams {
            slow_span_ms: self.slow_span_ms,
            span_index_capacity: self.span_index_capacity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub kind: ReasonerKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Top-level configuration for the engine and its surfaces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootScoutConfig {
    pub graph: GraphConfig,
    pub health: HealthPolicy,
    pub isolation: IsolationParams,
    pub correlation: CorrelationParams,
    pub reasoner: ReasonerConfig,
    pub server: ServerConfig,
}

impl RootScoutConfig {
    /// Every problem found, not just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.graph.timeline_capacity == 0 {
            problems.push("graph.timeline_capacity must be at least 1".to_string());
        }
        if self.graph.span_index_capacity == 0 {
            problems.push("graph.span_index_capacity must be at least 1".to_string());
        }
        if !self.graph.slow_span_ms.is_finite() || self.graph.slow_span_ms < 0.0 {
            problems.push(format!(
                "graph.slow_span_ms must be a non-negative number, got {}",
                self.graph.slow_span_ms
            ));
        }
        if self.health.error_threshold == 0 {
            problems.push("health.error_threshold must be at least 1".to_string());
        } else if self.health.error_threshold > self.graph.timeline_capacity {
            problems.push(format!(
                "health.error_threshold ({}) exceeds graph.timeline_capacity ({}); no node could ever reach error",
                self.health.error_threshold, self.graph.timeline_capacity
            ));
        }
        if self.isolation.recent_events == 0 {
            problems.push("isolation.recent_events must be at least 1".to_string());
        }
        if self.correlation.lookback_hours <= 0 {
            problems.push(format!(
                "correlation.lookback_hours must be positive, got {}",
                self.correlation.lookback_hours
            ));
        }
        if self.correlation.max_events_per_node == 0 {
            problems.push("correlation.max_events_per_node must be at least 1".to_string());
        }

        problems
    }
}

/// Load configuration from defaults, an optional TOML file and the environment.
pub fn load_config(path: Option<&Path>) -> Result<RootScoutConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(RootScoutConfig::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file_exact(path));
    }
    figment = figment.merge(Env::prefixed("ROOTSCOUT_").split("__"));

    let config: RootScoutConfig = figment.extract().map_err(Box::new)?;
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(ConfigError::Invalid(problems));
    }
    Ok(config)
}
