//! Basic example demonstrating GET and POST requests through the executor.
//!
//! This example shows how to:
//! - Create a client with the default retry policy and circuit breaker
//! - Make GET requests and decode typed responses
//! - Make POST requests with a JSON body
//! - Access response metadata
//!
//! Run with: `cargo run --example basic_call`

use breakwater::{Client, Error, Request};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("breakwater=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .default_header("User-Agent", "breakwater-demo/0.1")?
        .build()?;

    println!("=== GET Request Example ===");
    let post: Post = client
        .get("https://jsonplaceholder.typicode.com/posts/1")
        .await?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let request =
        Request::post("https://jsonplaceholder.typicode.com/posts").with_json(&new_post)?;
    let response = client.send::<Post>(request).await?;

    println!("Created post ID: {}", response.id);
    println!("Served by: {}", response.endpoint);
    println!("Latency: {:?}", response.latency);
    println!("Attempts: {}", response.attempts);
    println!("Content-Type: {:?}", response.header("content-type"));

    Ok(())
}
