use std::sync::Arc;

use crate::config::Args;
use crate::rate_limit::{RateLimiter, RatePolicy};
use crate::upstream::Classifier;
// app's shared state

pub struct AppState {
    pub classifier: Classifier,
    pub rate_limiter: Arc<RateLimiter>, // shared with the sweeper task
    pub resize_width: u32,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        classifier: Classifier,
        rate_limiter: Arc<RateLimiter>,
        resize_width: u32,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            classifier,
            rate_limiter,
            resize_width,
            max_upload_bytes,
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, reqwest::Error> {
        let classifier = Classifier::new(&args.upstream, args.upstream_timeout())?;
        let rate_limiter = Arc::new(RateLimiter::in_memory(args.rate_policy()));
        Ok(Self::new(
            classifier,
            rate_limiter,
            args.resize_width,
            args.max_upload_bytes(),
        ))
    }

    pub fn policy(&self) -> RatePolicy {
        *self.rate_limiter.policy()
    }
}
