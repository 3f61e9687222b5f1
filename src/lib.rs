// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod calibrate;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod historical;
pub mod locate;
pub mod loss;
pub mod metrics;
pub mod normalize;
pub mod regions;
pub mod report;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::AnalyzerConfig;
pub use crate::dataset::Dataset;
pub use crate::engine::{EvalParams, ScenarioEngine, ScenarioQuery};
pub use crate::report::Report;
pub use crate::scoring::FeatureWeights;
