#![cfg(feature = "test-utils")]

mod support;

use playhead::retry::RetryPolicy;
use playhead::Clock;
use playhead::test_support::{ManualClock, MockTokenSource};
use playhead::token::{TokenError, TokenProvider, TokenRequest};
use std::sync::Arc;
use std::time::Duration;

fn request() -> TokenRequest {
    TokenRequest {
        playback_id: "pb-1".to_string(),
        lesson_id: "lesson-1".to_string(),
    }
}

fn provider(
    source: Arc<MockTokenSource>,
    clock: Arc<ManualClock>,
    policy: RetryPolicy,
) -> TokenProvider {
    TokenProvider::new(
        source,
        clock,
        policy,
        Duration::from_secs(60),
        Duration::from_secs(30),
    )
}

#[tokio::test]
async fn acquire_retries_with_doubling_backoff() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    source.enqueue_transport_error();
    source.enqueue_transport_error();
    source.enqueue_token("tok", 300);

    let mut tokens = provider(source.clone(), clock.clone(), RetryPolicy::default());
    let credential = tokens.acquire(&request()).await.unwrap();

    assert_eq!(credential.playback, "tok");
    assert_eq!(source.calls(), 3);
    assert_eq!(
        clock.sleeps(),
        vec![Duration::from_millis(500), Duration::from_secs(1)]
    );
}

#[tokio::test]
async fn backoff_delays_are_capped() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    for _ in 0..5 {
        source.enqueue_transport_error();
    }
    source.enqueue_token("tok", 300);

    let policy = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(5));
    let mut tokens = provider(source.clone(), clock.clone(), policy);
    tokens.acquire(&request()).await.unwrap();

    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(5),
            Duration::from_secs(5)
        ]
    );
}

#[tokio::test]
async fn denial_and_unreachable_are_distinguished_after_exhaustion() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    source.enqueue_status(403);
    source.enqueue_status(403);
    source.enqueue_status(403);

    let mut tokens = provider(source.clone(), clock.clone(), RetryPolicy::default());
    let error = tokens.acquire(&request()).await.unwrap_err();
    assert!(matches!(error, TokenError::Denied(_)));

    source.enqueue_transport_error();
    source.enqueue_transport_error();
    source.enqueue_transport_error();
    let error = tokens.acquire(&request()).await.unwrap_err();
    assert!(matches!(error, TokenError::Unreachable { attempts: 3, .. }));
}

#[tokio::test]
async fn renewal_is_armed_at_expiry_minus_lead() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    source.enqueue_token("tok", 300);

    let mut tokens = provider(source, clock.clone(), RetryPolicy::default());
    tokens.acquire(&request()).await.unwrap();

    let renewal = tokens.next_renewal().unwrap();
    assert_eq!(renewal, clock.now() + Duration::from_secs(240));
    assert!(!tokens.renewal_due(clock.now()));

    clock.advance(Duration::from_secs(240));
    assert!(tokens.renewal_due(clock.now()));
}

#[tokio::test]
async fn short_lived_tokens_renew_no_sooner_than_the_floor() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    // 45s lifetime minus the 60s lead would be in the past; the floor wins
    source.enqueue_token("tok", 45);

    let mut tokens = provider(source, clock.clone(), RetryPolicy::default());
    tokens.acquire(&request()).await.unwrap();

    assert_eq!(
        tokens.next_renewal().unwrap(),
        clock.now() + Duration::from_secs(30)
    );
}

#[tokio::test]
async fn cancel_renewal_disarms_the_deadline() {
    support::tracing_init();
    let source = Arc::new(MockTokenSource::new());
    let clock = Arc::new(ManualClock::new());
    source.enqueue_token("tok", 300);

    let mut tokens = provider(source, clock.clone(), RetryPolicy::default());
    tokens.acquire(&request()).await.unwrap();
    assert!(tokens.next_renewal().is_some());

    tokens.cancel_renewal();
    assert!(tokens.next_renewal().is_none());
    clock.advance(Duration::from_secs(3600));
    assert!(!tokens.renewal_due(clock.now()));
}
