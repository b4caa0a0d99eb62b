/*
[INPUT]:  VITE_API_URL
[OUTPUT]: First feed pages and recommended sages printed to stdout
[POS]:    Examples - public read queries demonstration
[UPDATE]: When feed endpoints or query hooks change
*/

use std::sync::Arc;
use std::time::Duration;

use sagespace_client::*;

#[tokio::main]
async fn main() {
    println!("=== SageSpace Feed Example ===\n");

    let config = ClientConfig {
        base_url: std::env::var("VITE_API_URL").ok(),
        retry: Some(RetryOptions::new(2, Duration::from_millis(500))),
        ..ClientConfig::default()
    };
    let client = match SageClient::with_config(config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };

    let queries = FeedQueries::new(client);

    // Two pages through the pager
    let mut pager = queries.feed_pager(Some(10));
    for _ in 0..2 {
        pager.load_more().await;
    }
    if let Some(error) = pager.error() {
        eprintln!("✗ Feed: {}", error);
    } else {
        println!("✓ Loaded {} posts (more: {})", pager.items().len(), pager.has_more());
        for post in pager.items().iter().take(5) {
            println!("  - [{}] {}", post.id, post.content);
        }
    }

    // Cached query; the second call is served from the cache
    let sages = queries.recommended_sages().await;
    let _ = queries.recommended_sages().await;
    match sages.into_result() {
        Ok(sages) => {
            println!("\n✓ {} recommended sages", sages.len());
            for sage in sages.iter().take(5) {
                println!("  - {}", sage.name);
            }
        }
        Err(e) => eprintln!("✗ Sages: {}", e),
    }
}
