//! Start a job and follow it until it finishes
//!
//! 1. Start the daemon: `cargo run --package provisio-daemon`
//! 2. Run: `cargo run --package provisio-sdk --example watch_job -- ap-seoul-1`

use provisio_sdk::{ProvisioClient, StartRequest};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let region = std::env::args().nth(1).unwrap_or_else(|| "us-phoenix-1".to_string());

    let client = ProvisioClient::connect("http://127.0.0.1:9627").await?;
    println!("Connected. Known regions:");
    for r in client.regions().await? {
        println!("  {:<16} {:>4.0}%  {}", r.id, r.success_rate * 100.0, r.estimated_time);
    }

    let started = client
        .start(StartRequest::in_region(region).display_name("sdk-demo").max_attempts(20))
        .await?;
    println!("\nJob {} queued", started.job_id);

    loop {
        let job = client.status(&started.job_id).await?;
        println!(
            "  {:?}: {}/{} attempts, last region {}",
            job.status,
            job.attempt_count,
            job.max_attempts,
            job.last_region.as_deref().unwrap_or("-")
        );
        if job.status.is_terminal() {
            if let Some(resource) = job.resource {
                println!("\nCreated {} in {}", resource.resource_id, resource.region);
            }
            break;
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    for attempt in client.attempts(&started.job_id, 5).await? {
        println!(
            "  #{} {} {} {}",
            attempt.sequence,
            attempt.region,
            attempt.outcome,
            attempt.message.unwrap_or_default()
        );
    }

    Ok(())
}
