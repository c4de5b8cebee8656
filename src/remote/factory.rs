use crate::config::Config;
use crate::error::Result;
use crate::remote::{HttpRevisionApi, RetryPolicy, RevisionApi};
use std::sync::Arc;
use std::time::Duration;

/// Builds the HTTP client for the configured server.
///
/// Accept/reject are always submitted once. List fetches retry only when
/// `retry_max_attempts` is raised above 1.
pub fn create_api(config: &Config) -> Result<Arc<dyn RevisionApi>> {
    let fetch_retry = RetryPolicy::exponential(
        config.retry_max_attempts,
        Duration::from_millis(config.retry_base_delay_ms),
    );
    let client = HttpRevisionApi::new(config.api_base_url.clone(), config.request_timeout())?
        .with_fetch_retry(fetch_retry);
    Ok(Arc::new(client))
}
