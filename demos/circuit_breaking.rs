//! Example demonstrating the per-endpoint circuit breaker.
//!
//! A local endpoint that refuses connections is called until its circuit
//! opens; later calls fail fast without touching the network, while other
//! endpoints keep working.
//!
//! Run with: `cargo run --example circuit_breaking`

use breakwater::{
    CircuitBreaker, CircuitBreakerConfig, Client, Endpoint, Error, RetryPolicy,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("breakwater=info")
        .init();

    // Short thresholds so the demo finishes quickly
    let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new(
        3,
        Duration::from_secs(2),
    )));

    let client = Client::builder()
        .circuit_breaker(breaker.clone())
        .retry_policy(RetryPolicy::new(2, Duration::from_millis(50)))
        .timeout(Duration::from_secs(1))
        .build()?;

    let unreachable = "http://127.0.0.1:9/status";
    let endpoint = Endpoint::new("127.0.0.1:9");

    for call in 1..=5 {
        let start = Instant::now();
        let result = client.get::<serde_json::Value>(unreachable).await;
        match result {
            Ok(_) => println!("call {}: unexpected success", call),
            Err(e) => println!("call {} ({:?}): {}", call, start.elapsed(), e),
        }
        println!(
            "  state = {}, consecutive failures = {}",
            breaker.state(&endpoint),
            breaker.consecutive_failures(&endpoint)
        );
    }

    println!("\nWaiting for the cooldown to elapse...");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let result = client.get::<serde_json::Value>(unreachable).await;
    println!("probe: {:?}", result.err().map(|e| e.to_string()));
    println!("state after failed probe = {}", breaker.state(&endpoint));
    println!("endpoints tracked = {}", breaker.tracked_endpoints());

    Ok(())
}
