//! Provisio SDK - Rust Client Library
//!
//! Typed async client for the Provisio daemon's JSON-RPC API.
//!
//! # Example
//!
//! ```no_run
//! use provisio_sdk::{ProvisioClient, StartRequest};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ProvisioClient::connect("http://127.0.0.1:9627").await?;
//!
//!     let started = client
//!         .start(StartRequest::in_regions(vec!["ap-seoul-1".into(), "ap-tokyo-1".into()]))
//!         .await?;
//!
//!     let job = client
//!         .wait_for_terminal(&started.job_id, Duration::from_secs(10), Duration::from_secs(3600))
//!         .await?;
//!     println!("{} finished as {:?}", job.job_id, job.status);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::ProvisioClient;
pub use error::{code, Result, SdkError};
pub use types::{
    AttemptRecord, Health, JobSnapshot, JobStatus, Region, Resource, StartRequest, StartResponse, Stats,
    StopResponse,
};
