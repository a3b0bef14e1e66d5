//! Example demonstrating how callers branch on the failure taxonomy.
//!
//! This example shows how to:
//! - Handle HTTP errors and inspect status codes and headers
//! - Diagnose decode failures from the preserved raw body
//! - Recognize network failures after retries are exhausted
//! - Reject malformed requests before any I/O
//!
//! Run with: `cargo run --example error_handling`

use breakwater::{Client, Error, RetryPolicy};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

fn describe(error: &Error) {
    match error {
        Error::HttpError {
            status,
            raw_response,
            headers,
        } => {
            println!("HTTP error {}", status);
            println!("  Client error (4xx): {}", status.is_client_error());
            println!("  Raw response: {}", raw_response);
            println!("  Content-Type: {:?}", headers.get("content-type"));
        }
        Error::DecodingFailure {
            raw_response,
            serde_error,
            status,
        } => {
            println!("Decode failure (status {})", status);
            println!("  Serde error: {}", serde_error);
            println!(
                "  Raw response (first 200 chars): {}",
                raw_response.chars().take(200).collect::<String>()
            );
        }
        Error::NetworkFailure { error, attempts } => {
            println!("Network failure after {} attempt(s)", attempts);
            println!("  Kind: {}", error.kind());
        }
        Error::CircuitBreakerOpen { endpoint, .. } => {
            println!("{} is shielded for {:?}", endpoint, error.retry_after());
        }
        Error::InvalidRequest(message) => println!("Invalid request: {}", message),
    }
    println!(
        "  Counts against endpoint health: {}",
        error.counts_against_endpoint()
    );
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("breakwater=info")
        .init();

    let client = Client::builder()
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(200)))
        .timeout(Duration::from_secs(5))
        .build()?;

    println!("=== Example 1: HTTP error ===");
    if let Err(e) = client
        .get::<Post>("https://jsonplaceholder.typicode.com/posts/999999")
        .await
    {
        describe(&e);
    }

    println!("=== Example 2: Decode failure ===");
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }
    if let Err(e) = client
        .get::<WrongSchema>("https://jsonplaceholder.typicode.com/posts/1")
        .await
    {
        describe(&e);
    }

    println!("=== Example 3: Network failure ===");
    if let Err(e) = client.get::<Post>("http://127.0.0.1:9/unreachable").await {
        describe(&e);
    }

    println!("=== Example 4: Invalid request ===");
    if let Err(e) = client.get::<Post>("not a url").await {
        describe(&e);
    }

    Ok(())
}
