//! External-CLI fallback transport.
//!
//! When the structured API is unavailable or failing, operations are
//! served by invoking the external provisioning tool as a subprocess and
//! parsing its tabular output (see [`crate::table`]). Non-zero exits are
//! classified by recognizable stderr text so the retry engine treats a
//! rate-limit message exactly like an HTTP 429.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use podgrid_proto::{Pod, PodStatus, ResourceOffering};

use crate::client::{Backend, CreatePodRequest, OfferingQuery};
use crate::error::{ClientError, ClientResult};
use crate::table;

/// Default name of the external CLI binary.
pub const DEFAULT_PROGRAM: &str = "prime";

/// Subprocess wrapper around the external provisioning CLI.
#[derive(Debug, Clone)]
pub struct PrimeCli {
    program: String,
}

impl Default for PrimeCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

/// Classify a non-zero CLI exit by its stderr text.
///
/// Recognized phrases map onto the shared taxonomy; anything else is a
/// non-retried [`ClientError::CommandFailed`].
#[must_use]
pub fn classify_cli_failure(command: &str, exit_code: i32, stderr: &str) -> ClientError {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") || lower.contains("too many requests") {
        ClientError::rate_limited(stderr.to_string())
    } else if lower.contains("unauthorized")
        || lower.contains("not authenticated")
        || lower.contains("please log in")
        || lower.contains("login required")
    {
        ClientError::authentication(stderr.to_string())
    } else if lower.contains("not found") {
        ClientError::not_found(stderr.to_string())
    } else if lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("connection refused")
    {
        ClientError::connection(stderr.to_string())
    } else {
        ClientError::command_failed(command, exit_code, stderr)
    }
}

/// Pull a plausible pod identifier out of create-command output.
///
/// The tool prints the new id in slightly different shapes between
/// versions ("Pod ID: pod-x", "Created pod pod-x", a table). Any token
/// starting with `pod-` counts.
fn extract_pod_id(stdout: &str) -> Option<String> {
    stdout
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-'))
        .find(|token| token.len() > 4 && token.starts_with("pod-"))
        .map(ToString::to_string)
}

impl PrimeCli {
    /// Wrapper for the given binary name or path.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The wrapped binary.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, args: &[String]) -> ClientResult<String> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        debug!(command = %rendered, "invoking external cli");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ClientError::command_failed(
                    rendered.clone(),
                    -1,
                    format!("failed to launch '{}': {e}", self.program),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(classify_cli_failure(&rendered, exit_code, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn offering_args(query: &OfferingQuery) -> Vec<String> {
        let mut args = vec!["availability".to_string(), "list".to_string()];
        if let Some(gpu_type) = query.gpu_type {
            args.push("--gpu-type".into());
            args.push(gpu_type.to_string());
        }
        if !query.regions.is_empty() {
            args.push("--region".into());
            args.push(query.regions.join(","));
        }
        args
    }

    fn create_args(request: &CreatePodRequest) -> Vec<String> {
        let mut args = vec![
            "pods".to_string(),
            "create".to_string(),
            "--gpu-type".to_string(),
            request.gpu_type.to_string(),
            "--gpu-count".to_string(),
            request.gpu_count.to_string(),
            "--name".to_string(),
            request.name.clone(),
        ];
        if let Some(id) = &request.offering_id {
            args.push("--id".into());
            args.push(id.clone());
        }
        if let Some(region) = &request.region {
            args.push("--region".into());
            args.push(region.clone());
        }
        if let Some(image) = &request.image {
            args.push("--image".into());
            args.push(image.clone());
        }
        if let Some(disk) = request.disk_gb {
            args.push("--disk-size".into());
            args.push(disk.to_string());
        }
        for (key, value) in &request.env {
            args.push("--env".into());
            args.push(format!("{key}={value}"));
        }
        args
    }
}

impl Backend for PrimeCli {
    async fn list_offerings(&self, query: &OfferingQuery) -> ClientResult<Vec<ResourceOffering>> {
        let stdout = self.run(&Self::offering_args(query)).await?;
        let mut offerings = table::parse_offerings(&stdout)?;
        // The tool does not filter on count; honor the query locally.
        if let Some(min) = query.min_gpu_count {
            offerings.retain(|o| o.gpu_count >= min);
        }
        if let Some(gpu_type) = query.gpu_type {
            offerings.retain(|o| o.gpu_type == gpu_type);
        }
        Ok(offerings)
    }

    async fn list_gpu_types(&self) -> ClientResult<Vec<String>> {
        let stdout = self
            .run(&["availability".to_string(), "gpu-types".to_string()])
            .await?;
        table::parse_gpu_types(&stdout)
    }

    async fn create_pod(&self, request: &CreatePodRequest) -> ClientResult<Pod> {
        let stdout = self.run(&Self::create_args(request)).await?;

        // The id printed here is best-effort; the hybrid client flags this
        // whole result as lower-confidence.
        let id = match extract_pod_id(&stdout) {
            Some(id) => id,
            None => {
                let generated = format!(
                    "pod-{}",
                    &uuid::Uuid::new_v4().simple().to_string()[..12]
                );
                warn!(
                    id = %generated,
                    "create output did not include a pod id, generated a local one"
                );
                generated
            }
        };

        Ok(Pod {
            id,
            name: request.name.clone(),
            gpu_type: request.gpu_type,
            gpu_count: request.gpu_count,
            status: PodStatus::Pending,
            cost_per_hour: request.cost_per_hour.unwrap_or(0.0),
            created_at: chrono::Utc::now(),
            started_at: None,
            stopped_at: None,
            ssh_connection: None,
            provider: String::new(),
            region: request.region.clone().unwrap_or_default(),
            image: request.image.clone(),
            disk_gb: request.disk_gb,
            env: request.env.clone(),
        })
    }

    async fn get_pod(&self, id: &str) -> ClientResult<Pod> {
        let pods = self.list_pods().await?;
        pods.into_iter()
            .find(|pod| pod.id == id)
            .ok_or_else(|| ClientError::not_found(format!("pod {id}")))
    }

    async fn list_pods(&self) -> ClientResult<Vec<Pod>> {
        let stdout = self.run(&["pods".to_string(), "list".to_string()]).await?;
        table::parse_pods(&stdout)
    }

    async fn pod_logs(&self, id: &str, max_lines: u32) -> ClientResult<String> {
        let stdout = self
            .run(&[
                "pods".to_string(),
                "logs".to_string(),
                id.to_string(),
                "--lines".to_string(),
                max_lines.to_string(),
            ])
            .await?;
        Ok(stdout)
    }

    async fn terminate_pod(&self, id: &str) -> ClientResult<()> {
        self.run(&["pods".to_string(), "terminate".to_string(), id.to_string()])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podgrid_proto::GpuType;
    use std::collections::BTreeMap;
    use test_case::test_case;

    #[test_case("Error: rate limit exceeded, slow down", "rate limited"; "rate limit")]
    #[test_case("unauthorized - run 'prime login' first", "authentication failed"; "unauthorized")]
    #[test_case("pod not found", "not found"; "not found")]
    #[test_case("request timed out after 30s", "connection error"; "timed out")]
    #[test_case("connection reset by peer", "connection error"; "reset")]
    #[test_case("usage: prime pods create ...", "command failed"; "usage error")]
    fn stderr_classification(stderr: &str, expected_prefix: &str) {
        let err = classify_cli_failure("prime pods list", 1, stderr);
        assert!(
            err.to_string().starts_with(expected_prefix),
            "{stderr}: {err}"
        );
    }

    #[test]
    fn classification_decides_retry_eligibility() {
        assert!(classify_cli_failure("c", 1, "rate limit exceeded").is_transient());
        assert!(classify_cli_failure("c", 1, "connection refused").is_transient());
        assert!(!classify_cli_failure("c", 1, "unauthorized").is_transient());
        assert!(!classify_cli_failure("c", 2, "bad flag --frobnicate").is_transient());
    }

    #[test]
    fn extracts_pod_id_from_varied_output() {
        assert_eq!(
            extract_pod_id("Pod created successfully.\nPod ID: pod-8f2a91\n"),
            Some("pod-8f2a91".to_string())
        );
        assert_eq!(
            extract_pod_id("Created pod (pod-77aa00) in region FIN-01"),
            Some("pod-77aa00".to_string())
        );
        assert_eq!(extract_pod_id("Pod created."), None);
    }

    #[test]
    fn offering_args_include_filters() {
        let query = OfferingQuery {
            gpu_type: Some(GpuType::H100_80GB),
            regions: vec!["FIN-01".into(), "US-TX".into()],
            min_gpu_count: Some(2),
        };
        let args = PrimeCli::offering_args(&query);
        assert_eq!(
            args,
            vec![
                "availability",
                "list",
                "--gpu-type",
                "H100_80GB",
                "--region",
                "FIN-01,US-TX",
            ]
        );
    }

    #[test]
    fn create_args_cover_optional_fields() {
        let mut env = BTreeMap::new();
        env.insert("RUST_LOG".to_string(), "debug".to_string());
        let request = CreatePodRequest {
            name: "trainer".into(),
            gpu_type: GpuType::A100_80GB,
            gpu_count: 2,
            offering_id: Some("cfg-3".into()),
            region: Some("FIN-01".into()),
            image: Some("pytorch/pytorch:2.0.1".into()),
            disk_gb: Some(100),
            env,
            cost_per_hour: Some(3.5),
        };
        let args = PrimeCli::create_args(&request);
        let rendered = args.join(" ");
        assert!(rendered.starts_with("pods create --gpu-type A100_80GB --gpu-count 2 --name trainer"));
        assert!(rendered.contains("--id cfg-3"));
        assert!(rendered.contains("--disk-size 100"));
        assert!(rendered.contains("--env RUST_LOG=debug"));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn fake_program(dir: &std::path::Path, script: &str) -> String {
            let path = dir.join("fake-prime");
            let mut file = std::fs::File::create(&path).expect("create script");
            writeln!(file, "#!/bin/sh\n{script}").expect("write script");
            let mut perms = file.metadata().expect("metadata").permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).expect("chmod");
            path.to_string_lossy().into_owned()
        }

        #[tokio::test]
        async fn run_captures_stdout() {
            let dir = tempfile::tempdir().expect("tempdir");
            let cli = PrimeCli::new(fake_program(dir.path(), "echo hello"));
            let out = cli.run(&["anything".to_string()]).await.expect("run");
            assert_eq!(out.trim(), "hello");
        }

        #[tokio::test]
        async fn run_classifies_stderr_on_failure() {
            let dir = tempfile::tempdir().expect("tempdir");
            let cli = PrimeCli::new(fake_program(
                dir.path(),
                "echo 'rate limit exceeded' >&2; exit 1",
            ));
            let err = cli.run(&["x".to_string()]).await.expect_err("must fail");
            assert!(matches!(err, ClientError::RateLimited { .. }));
        }

        #[tokio::test]
        async fn missing_binary_is_command_failed() {
            let cli = PrimeCli::new("/nonexistent/definitely-not-a-binary");
            let err = cli.run(&["x".to_string()]).await.expect_err("must fail");
            assert!(matches!(err, ClientError::CommandFailed { exit_code: -1, .. }));
        }
    }
}
