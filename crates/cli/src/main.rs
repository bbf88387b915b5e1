//! Provisio CLI - talks to the daemon over JSON-RPC

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9627";

#[derive(Parser)]
#[command(name = "provisio")]
#[command(about = "Provisio capacity acquisition CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "PROVISIO_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start acquiring a VM
    Start(StartArgs),

    /// Show one job, or all active jobs
    Status {
        /// Job ID (omit to list active jobs)
        job_id: Option<String>,
    },

    /// Stop a job
    Stop {
        /// Job ID
        job_id: String,

        /// Reason recorded on the job
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Show the attempt history of a job
    Attempts {
        /// Job ID
        job_id: String,

        /// Number of most recent attempts
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    /// List known regions
    Regions,

    /// Show daemon statistics
    Stats,

    /// Check the daemon is up (non-zero exit otherwise)
    Health,
}

#[derive(clap::Args, Default)]
struct StartArgs {
    /// Single target region
    #[arg(long, conflicts_with = "regions")]
    region: Option<String>,

    /// Ordered list of regions to cycle through
    #[arg(long, value_delimiter = ',')]
    regions: Option<Vec<String>>,

    /// Shape name
    #[arg(long)]
    shape: Option<String>,

    #[arg(long)]
    ocpus: Option<u32>,

    #[arg(long)]
    memory_gb: Option<u32>,

    #[arg(long)]
    storage_gb: Option<u32>,

    #[arg(long)]
    display_name: Option<String>,

    #[arg(long)]
    max_attempts: Option<u32>,
}

impl StartArgs {
    /// Only the fields given on the command line; the daemon fills the rest
    fn to_params(&self) -> Value {
        let mut params = Map::new();
        let mut put = |key: &str, value: Value| {
            params.insert(key.to_string(), value);
        };
        if let Some(v) = &self.region {
            put("region", json!(v));
        }
        if let Some(v) = &self.regions {
            put("regions", json!(v));
        }
        if let Some(v) = &self.shape {
            put("shape", json!(v));
        }
        if let Some(v) = self.ocpus {
            put("ocpus", json!(v));
        }
        if let Some(v) = self.memory_gb {
            put("memory_gb", json!(v));
        }
        if let Some(v) = self.storage_gb {
            put("storage_gb", json!(v));
        }
        if let Some(v) = &self.display_name {
            put("display_name", json!(v));
        }
        if let Some(v) = self.max_attempts {
            put("max_attempts", json!(v));
        }
        Value::Object(params)
    }
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct JobRow {
    job_id: String,
    status: String,
    display_name: String,
    #[tabled(rename = "attempts")]
    attempt_count: u32,
    #[tabled(rename = "max")]
    max_attempts: u32,
    #[tabled(display_with = "display_opt")]
    last_region: Option<String>,
}

fn display_opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

#[derive(Deserialize, Tabled)]
struct AttemptRow {
    sequence: u32,
    region: String,
    #[tabled(display_with = "display_time")]
    attempted_at: i64,
    outcome: String,
    #[tabled(display_with = "display_opt")]
    message: Option<String>,
}

fn display_time(millis: &i64) -> String {
    chrono::DateTime::from_timestamp_millis(*millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[derive(Deserialize, Tabled)]
struct RegionRow {
    id: String,
    name: String,
    #[tabled(display_with = "display_rate")]
    success_rate: f64,
    latency_class: String,
    estimated_time: String,
}

fn display_rate(rate: &f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn colored_status(status: &str) -> String {
    match status {
        "SUCCEEDED" => status.green().bold().to_string(),
        "FAILED" => status.red().bold().to_string(),
        "STOPPED" => status.yellow().bold().to_string(),
        _ => status.cyan().bold().to_string(),
    }
}

fn print_job(job: &Value) {
    let field = |key: &str| match &job[key] {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    println!("  {} {}", "Job:".bold(), field("job_id"));
    println!(
        "  {} {}",
        "Status:".bold(),
        colored_status(job["status"].as_str().unwrap_or("UNKNOWN"))
    );
    println!("  {} {}", "Name:".bold(), field("display_name"));
    println!(
        "  {} {}/{}",
        "Attempts:".bold(),
        field("attempt_count"),
        field("max_attempts")
    );
    println!("  {} {}", "Last region:".bold(), field("last_region"));
    if !job["last_error"].is_null() {
        println!("  {} {}", "Last error:".bold(), field("last_error"));
    }
    if !job["stop_reason"].is_null() {
        println!("  {} {}", "Stop reason:".bold(), field("stop_reason"));
    }
    if let Some(resource) = job["resource"].as_object() {
        println!();
        println!("  {}", "Instance".green().bold());
        for key in ["resource_id", "region", "public_ip", "private_ip"] {
            let value = resource
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or("-");
            println!("    {} {}", format!("{}:", key).bold(), value);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let result = call_rpc(&cli.rpc_url, "vm.start.v1", args.to_params()).await?;
            println!("{}", "✓ Job started".green().bold());
            println!("  {} {}", "Job:".bold(), result["job_id"].as_str().unwrap_or("-"));
            println!(
                "  {} provisio status {}",
                "Follow with:".bold(),
                result["job_id"].as_str().unwrap_or("<job_id>")
            );
        }

        Commands::Status { job_id: Some(job_id) } => {
            let job = call_rpc(&cli.rpc_url, "vm.status.v1", json!({ "job_id": job_id })).await?;
            print_job(&job);
        }

        Commands::Status { job_id: None } => {
            let result = call_rpc(&cli.rpc_url, "vm.status.v1", json!({})).await?;
            let rows: Vec<JobRow> = serde_json::from_value(result["jobs"].clone())?;
            if rows.is_empty() {
                println!("{}", "No active jobs".yellow());
            } else {
                println!("{}", format!("{} active job(s)", rows.len()).cyan().bold());
                println!("{}", Table::new(rows));
            }
        }

        Commands::Stop { job_id, reason } => {
            let result = call_rpc(
                &cli.rpc_url,
                "vm.stop.v1",
                json!({ "job_id": job_id, "reason": reason }),
            )
            .await?;

            let status = result["status"].as_str().unwrap_or("UNKNOWN");
            if result["already_terminal"].as_bool().unwrap_or(false) {
                println!(
                    "{} Job {} already finished ({})",
                    "○".yellow(),
                    job_id,
                    colored_status(status)
                );
            } else {
                println!("{}", format!("✓ Stop requested for {}", job_id).green().bold());
            }
        }

        Commands::Attempts { job_id, limit } => {
            let result = call_rpc(
                &cli.rpc_url,
                "vm.attempts.v1",
                json!({ "job_id": job_id, "limit": limit }),
            )
            .await?;
            let rows: Vec<AttemptRow> = serde_json::from_value(result["attempts"].clone())?;
            if rows.is_empty() {
                println!("{}", "No attempts yet".yellow());
            } else {
                println!("{}", Table::new(rows));
            }
        }

        Commands::Regions => {
            let result = call_rpc(&cli.rpc_url, "regions.list.v1", json!({})).await?;
            let rows: Vec<RegionRow> = serde_json::from_value(result["regions"].clone())?;
            println!("{}", Table::new(rows));
        }

        Commands::Stats => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Total Jobs:".bold(), stats["total_jobs"]);
                    println!("  {} {}", "Queued:".bold(), stats["queued_jobs"]);
                    println!("  {} {}", "Running:".bold(), stats["running_jobs"]);
                    println!("  {} {}", "Succeeded:".bold(), stats["succeeded_jobs"]);
                    println!("  {} {}", "Failed:".bold(), stats["failed_jobs"]);
                    println!("  {} {}", "Stopped:".bold(), stats["stopped_jobs"]);
                    println!("  {} {}", "Active loops:".bold(), stats["active_loops"]);
                    println!();
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }

        Commands::Health => {
            let health = call_rpc(&cli.rpc_url, "admin.health.v1", json!({})).await?;
            println!(
                "{} {} {} (loops: {}, up {}s)",
                health["status"].as_str().unwrap_or("unknown").green(),
                health["service"].as_str().unwrap_or_default(),
                health["version"].as_str().unwrap_or_default(),
                health["active_loops"],
                health["uptime_seconds"]
            );
        }
    }

    Ok(())
}
