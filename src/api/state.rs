use std::sync::Arc;

use crate::config::Config;
use crate::observability::Metrics;
use crate::pipeline::IngestPipeline;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<IngestPipeline>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, pipeline: IngestPipeline) -> Self {
        let metrics = pipeline.metrics().clone();
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics,
        }
    }
}
