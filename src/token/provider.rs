use super::{Credential, TokenRequest, TokenSource, TokenSourceError};
use crate::clock::Clock;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token endpoint denied access: {0}")]
    Denied(TokenSourceError),
    #[error("token endpoint unreachable after {attempts} attempts: {source}")]
    Unreachable {
        attempts: u32,
        source: TokenSourceError,
    },
}

/// Fetches short-lived playback credentials and tracks when the current one
/// should be proactively renewed.
///
/// Acquisition retries with exponential backoff; once a credential is held,
/// `renewal_due` reports when the owner should re-acquire so the player
/// never observes an expired token.
pub struct TokenProvider {
    source: Arc<dyn TokenSource>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    renewal_lead: Duration,
    renewal_floor: Duration,
    renew_at: Option<Instant>,
}

impl TokenProvider {
    pub fn new(
        source: Arc<dyn TokenSource>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        renewal_lead: Duration,
        renewal_floor: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            policy,
            renewal_lead,
            renewal_floor,
            renew_at: None,
        }
    }

    /// Fetch a credential, retrying per the policy.
    ///
    /// On success the renewal deadline is re-armed at
    /// `expires_in - renewal_lead`, floored at `renewal_floor` from now.
    pub async fn acquire(&mut self, request: &TokenRequest) -> Result<Credential, TokenError> {
        let mut failures = 0u32;

        loop {
            match self.source.fetch(request).await {
                Ok(response) => {
                    let (credential, expires_in) = response.into_parts();
                    self.arm_renewal(expires_in);
                    if failures > 0 {
                        info!(
                            "Token acquired for lesson {} after {} retries",
                            request.lesson_id, failures
                        );
                    }
                    return Ok(credential);
                }
                Err(e) => {
                    failures += 1;
                    if self.policy.exhausted(failures) {
                        warn!(
                            "Token acquisition for lesson {} gave up after {} attempts: {}",
                            request.lesson_id, failures, e
                        );
                        return Err(if e.is_denial() {
                            TokenError::Denied(e)
                        } else {
                            TokenError::Unreachable {
                                attempts: failures,
                                source: e,
                            }
                        });
                    }

                    let delay = self.policy.delay_for(failures - 1);
                    debug!(
                        "Token fetch attempt {} for lesson {} failed ({}), retrying in {:?}",
                        failures, request.lesson_id, e, delay
                    );
                    self.clock.sleep(delay).await;
                }
            }
        }
    }

    fn arm_renewal(&mut self, expires_in: Duration) {
        let lead_time = expires_in
            .saturating_sub(self.renewal_lead)
            .max(self.renewal_floor);
        self.renew_at = Some(self.clock.now() + lead_time);
        debug!("Credential renewal armed in {:?}", lead_time);
    }

    /// True once the proactive renewal deadline has passed.
    pub fn renewal_due(&self, now: Instant) -> bool {
        self.renew_at.is_some_and(|at| now >= at)
    }

    /// Next renewal deadline, if one is armed.
    pub fn next_renewal(&self) -> Option<Instant> {
        self.renew_at
    }

    /// Drop any armed renewal deadline.
    ///
    /// Called before a reactive re-acquisition (player saw an auth error) and
    /// on session teardown.
    pub fn cancel_renewal(&mut self) {
        self.renew_at = None;
    }
}
