//! Application state.

use std::sync::Arc;

use z_ledger_store::RocksStore;

use crate::audit::Auditor;
use crate::config::ServiceConfig;
use crate::payout::{HttpPayoutChannel, PayoutChannel};
use crate::rate_limit::RateLimiter;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Payout channel for withdrawals (optional).
    pub payout: Option<Arc<dyn PayoutChannel>>,

    /// Per-caller request windows.
    pub rate_limiter: Arc<RateLimiter>,

    /// Audit trail writer.
    pub auditor: Auditor,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        let payout = config.payout.as_ref().and_then(|provider| {
            match HttpPayoutChannel::new(provider) {
                Ok(channel) => {
                    tracing::info!(base_url = %provider.base_url, "Payout channel enabled");
                    Some(Arc::new(channel) as Arc<dyn PayoutChannel>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create payout channel");
                    None
                }
            }
        });

        if payout.is_none() {
            tracing::warn!("Payout channel not configured - withdrawals wait for manual approval");
        }

        Self {
            auditor: Auditor::new(Arc::clone(&store)),
            store,
            config,
            payout,
            rate_limiter: Arc::new(RateLimiter::new()),
        }
    }

    /// Replace the payout channel.
    #[must_use]
    pub fn with_payout_channel(mut self, channel: Arc<dyn PayoutChannel>) -> Self {
        self.payout = Some(channel);
        self
    }

    /// Check if a payout channel is configured.
    #[must_use]
    pub fn has_payout(&self) -> bool {
        self.payout.is_some()
    }
}
