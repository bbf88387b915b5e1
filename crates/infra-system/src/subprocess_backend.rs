// Subprocess provisioning backend
// One launcher process per attempt, environment allowlisted
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use provisio_core::domain::{PlacementCandidate, ResourceHandle, ResourceRequest};
use provisio_core::port::{ProviderError, ProvisioningBackend};

/// Time a timed-out launcher gets between SIGTERM and SIGKILL (5s)
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Parent variables a launcher typically needs
pub const DEFAULT_ENV_PASSTHROUGH: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "OCI_CLI_CONFIG_FILE",
    "OCI_CLI_PROFILE",
];

/// Launcher settings
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Parent environment variables copied into the child; everything else is dropped
    pub env_passthrough: Vec<String>,
    pub timeout: Duration,
}

impl SubprocessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env_passthrough: DEFAULT_ENV_PASSTHROUGH.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(90),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Runs a launcher command (e.g. a wrapper around the provider CLI)
///
/// Contract with the launcher:
/// - inputs arrive as `PROVISIO_*` environment variables
/// - exit 0 prints the created instance as JSON on stdout
/// - any other exit prints the provider error on stderr, ideally as
///   a JSON object with `status`, `code` and `message`
pub struct SubprocessBackend {
    config: SubprocessConfig,
}

impl SubprocessBackend {
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    /// Environment handed to the child: allowlisted parent vars plus the attempt inputs
    fn child_env(
        &self,
        candidate: &PlacementCandidate,
        request: &ResourceRequest,
    ) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .config
            .env_passthrough
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.clone(), v)))
            .collect();

        env.extend([
            ("PROVISIO_REGION".to_string(), candidate.region.clone()),
            ("PROVISIO_SHAPE".to_string(), request.shape_name.clone()),
            ("PROVISIO_OCPUS".to_string(), request.shape.ocpus.to_string()),
            ("PROVISIO_MEMORY_GB".to_string(), request.shape.memory_gb.to_string()),
            ("PROVISIO_STORAGE_GB".to_string(), request.shape.storage_gb.to_string()),
            ("PROVISIO_DISPLAY_NAME".to_string(), request.display_name.clone()),
        ]);
        env
    }

    async fn run(
        &self,
        env: Vec<(String, String)>,
    ) -> Result<(ExitStatus, String, String), ProviderError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .env_clear()
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            ProviderError::launcher(format!("failed to start {}: {}", self.config.program, e))
        })?;

        let stdout = tokio::spawn(read_all(child.stdout.take()));
        let stderr = tokio::spawn(read_all(child.stderr.take()));

        let status = match timeout(self.config.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(ProviderError::launcher(format!("wait failed: {}", e))),
            Err(_) => {
                terminate(&mut child).await;
                return Err(ProviderError::timeout(format!(
                    "launcher did not finish within {}ms",
                    self.config.timeout.as_millis()
                )));
            }
        };

        let stdout = stdout.await.unwrap_or_default();
        let stderr = stderr.await.unwrap_or_default();
        Ok((status, stdout, stderr))
    }
}

#[async_trait]
impl ProvisioningBackend for SubprocessBackend {
    async fn launch(
        &self,
        candidate: &PlacementCandidate,
        request: &ResourceRequest,
    ) -> Result<ResourceHandle, ProviderError> {
        info!(
            program = %self.config.program,
            region = %candidate.region,
            shape = %request.shape_name,
            "Starting launcher"
        );

        let (status, stdout, stderr) = self.run(self.child_env(candidate, request)).await?;

        debug!(exit_code = ?status.code(), "Launcher finished");

        if status.success() {
            parse_handle(&stdout, candidate, request)
        } else {
            Err(parse_provider_error(&stderr, status.code()))
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// SIGTERM first, then SIGKILL if the launcher ignores it
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        info!(pid = %pid, "Sending SIGTERM to launcher");
        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
            && timeout(TERMINATE_GRACE, child.wait()).await.is_ok()
        {
            return;
        }
        warn!(pid = %pid, "Launcher did not exit after SIGTERM, killing");
    }

    if let Err(e) = child.kill().await {
        warn!(error = %e, "Failed to kill launcher");
    }
}

#[derive(Debug, Deserialize)]
struct LaunchOutput {
    #[serde(alias = "id")]
    resource_id: String,
    region: Option<String>,
    #[serde(alias = "display-name")]
    display_name: Option<String>,
    #[serde(alias = "public-ip")]
    public_ip: Option<String>,
    #[serde(alias = "private-ip")]
    private_ip: Option<String>,
}

fn parse_handle(
    stdout: &str,
    candidate: &PlacementCandidate,
    request: &ResourceRequest,
) -> Result<ResourceHandle, ProviderError> {
    let body = json_object(stdout).unwrap_or(stdout);
    let output: LaunchOutput = serde_json::from_str(body).map_err(|e| {
        ProviderError::invalid_response(format!("launcher output is not a resource: {}", e))
    })?;

    Ok(ResourceHandle {
        resource_id: output.resource_id,
        region: output.region.unwrap_or_else(|| candidate.region.clone()),
        display_name: output
            .display_name
            .unwrap_or_else(|| request.display_name.clone()),
        public_ip: output.public_ip,
        private_ip: output.private_ip,
    })
}

/// Provider error from launcher stderr: embedded JSON if present, raw text otherwise
fn parse_provider_error(stderr: &str, exit_code: Option<i32>) -> ProviderError {
    if let Some(value) = json_object(stderr)
        .and_then(|body| serde_json::from_str::<serde_json::Value>(body).ok())
    {
        let status = value.get("status").and_then(|s| match s {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let code = value.get("code").and_then(|c| c.as_str());
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("provider error");
        return ProviderError::service(status, code, message);
    }

    let text = stderr.trim();
    let message = if text.is_empty() {
        format!("launcher exited with code {:?}", exit_code)
    } else {
        text.to_string()
    };
    ProviderError::service(None, None, message)
}

/// Outermost `{...}` span in mixed output (CLIs prefix JSON with labels)
fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisio_core::domain::LatencyClass;
    use provisio_core::port::ProviderErrorKind;

    fn candidate() -> PlacementCandidate {
        PlacementCandidate {
            region: "ap-tokyo-1".to_string(),
            success_rate: 0.75,
            latency: LatencyClass::Low,
        }
    }

    fn shell(script: &str) -> SubprocessBackend {
        SubprocessBackend::new(
            SubprocessConfig::new("sh")
                .with_args(vec!["-c".to_string(), script.to_string()])
                .with_timeout(Duration::from_secs(5)),
        )
    }

    #[tokio::test]
    async fn test_success_parses_handle_and_sees_inputs() {
        let backend = shell(
            r#"printf '{"id":"ocid1.instance.%s","public-ip":"1.2.3.4"}' "$PROVISIO_OCPUS""#,
        );
        let handle = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap();

        assert_eq!(handle.resource_id, "ocid1.instance.2");
        assert_eq!(handle.region, "ap-tokyo-1");
        assert_eq!(handle.display_name, "AutoCreated-VM");
        assert_eq!(handle.public_ip.as_deref(), Some("1.2.3.4"));
    }

    #[tokio::test]
    async fn test_service_error_json_on_stderr() {
        let backend = shell(
            r#"echo 'ServiceError:' >&2; echo '{"status": 500, "code": "InternalError", "message": "Out of host capacity."}' >&2; exit 1"#,
        );
        let err = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Service);
        assert_eq!(err.status, Some(500));
        assert_eq!(err.code.as_deref(), Some("InternalError"));
        assert_eq!(err.message, "Out of host capacity.");
    }

    #[tokio::test]
    async fn test_plain_stderr_becomes_message() {
        let backend = shell("echo 'connection reset' >&2; exit 3");
        let err = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.message, "connection reset");
        assert_eq!(err.status, None);
    }

    #[tokio::test]
    async fn test_garbage_stdout_is_invalid_response() {
        let backend = shell("echo done");
        let err = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_timeout_terminates_launcher() {
        let backend = SubprocessBackend::new(
            SubprocessConfig::new("sleep")
                .with_args(vec!["10".to_string()])
                .with_timeout(Duration::from_millis(100)),
        );
        let started = std::time::Instant::now();
        let err = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ProviderErrorKind::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_program_is_launcher_error() {
        let backend = SubprocessBackend::new(SubprocessConfig::new("/nonexistent/launcher"));
        let err = backend
            .launch(&candidate(), &ResourceRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Launcher);
    }

    #[test]
    fn test_env_is_allowlisted() {
        let mut config = SubprocessConfig::new("true");
        config.env_passthrough = vec!["PROVISIO_TEST_ALLOWED".to_string()];
        std::env::set_var("PROVISIO_TEST_ALLOWED", "yes");
        std::env::set_var("PROVISIO_TEST_BLOCKED", "no");

        let env = SubprocessBackend::new(config).child_env(&candidate(), &ResourceRequest::default());
        let keys: Vec<&str> = env.iter().map(|(k, _)| k.as_str()).collect();

        assert!(keys.contains(&"PROVISIO_TEST_ALLOWED"));
        assert!(!keys.contains(&"PROVISIO_TEST_BLOCKED"));
        assert!(env.contains(&("PROVISIO_REGION".to_string(), "ap-tokyo-1".to_string())));
    }
}
