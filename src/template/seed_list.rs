use crate::config::SeedEntry;
use crate::http::{Handler, HttpShared, LinkTask};
use crate::task::RateLimit;
use crate::template::{SeedContext, Template};
use crate::{ConfigError, FastGetsError};
use std::sync::Arc;

/// Seeds one [`LinkTask`] per configured `[[seed]]` entry
pub struct SeedListTemplate {
    seeds: Vec<SeedEntry>,
    shared: Arc<HttpShared>,
}

impl SeedListTemplate {
    pub fn new(seeds: Vec<SeedEntry>, shared: Arc<HttpShared>) -> Self {
        Self { seeds, shared }
    }
}

impl Template for SeedListTemplate {
    fn name(&self) -> &str {
        "seed-list"
    }

    fn load(&self, ctx: &SeedContext<'_>) -> Result<(), FastGetsError> {
        for seed in &self.seeds {
            if ctx.instance().is_halted() {
                tracing::info!("run halted while seeding, stopping early");
                break;
            }

            let handler = Handler::from_name(&seed.func_name)
                .ok_or_else(|| ConfigError::UnknownHandler(seed.func_name.clone()))?;
            let rate_limit = seed
                .rate_limit
                .as_ref()
                .map(|limit| RateLimit::new(limit.category.clone(), limit.per_second));

            tracing::debug!(url = %seed.url, handler = handler.as_str(), "seeding");
            ctx.add(Box::new(LinkTask::seed(
                ctx.instance_id(),
                seed.url.clone(),
                handler,
                rate_limit,
                Arc::clone(&self.shared),
            )));
        }
        Ok(())
    }
}
