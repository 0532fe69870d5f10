//! Docker CLI wrapper
//!
//! Every call shells out to `docker` (or the configured compose command)
//! through a [`CommandRunner`], so tests can script the subprocess side.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use wpcraft_error::{Error, ErrorKind, Result};

pub const MYSQL_CONTAINER: &str = "wordpress_mysql";
pub const WORDPRESS_CONTAINER: &str = "wordpress_app";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const COMPOSE_UP_TIMEOUT: Duration = Duration::from_secs(120);
pub const COMPOSE_DOWN_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code and captured streams of a finished subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (false, false) => format!("{}\n{}", stdout, stderr),
            (false, true) => stdout.to_string(),
            (true, _) => stderr.to_string(),
        }
    }
}

/// Runs an external program to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

/// Runs programs with `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "running command");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(result) => result.map_err(|e| {
                let kind = if e.kind() == std::io::ErrorKind::NotFound {
                    ErrorKind::DockerUnavailable
                } else {
                    ErrorKind::CommandFailed
                };
                Error::new(kind, format!("failed to execute '{}': {}", program, e))
                    .with_operation("command::run")
                    .with_context("program", program)
                    .set_source(e)
            })?,
            Err(_) => {
                return Err(Error::command_timeout(program, timeout.as_secs())
                    .with_operation("command::run"));
            }
        };

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `State` object reported by `docker inspect`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContainerState {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Health", default)]
    pub health: Option<HealthState>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthState {
    #[serde(rename = "Status")]
    pub status: String,
}

impl ContainerState {
    pub fn health_status(&self) -> Option<&str> {
        self.health.as_ref().map(|h| h.status.as_str())
    }

    /// Running, and healthy when the image defines a healthcheck
    pub fn is_ready(&self) -> bool {
        self.status == "running" && self.health_status().map_or(true, |h| h == "healthy")
    }
}

/// One line of `docker ps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub state: String,
}

pub struct Docker {
    runner: Arc<dyn CommandRunner>,
    compose_program: String,
    compose_args: Vec<String>,
    settle: Duration,
    poll_interval: Duration,
}

impl Docker {
    /// `compose_command` is split on whitespace: `"docker compose"` or `"docker-compose"`
    pub fn new(runner: Arc<dyn CommandRunner>, compose_command: &str) -> Self {
        let mut parts = compose_command.split_whitespace().map(String::from);
        let compose_program = parts.next().unwrap_or_else(|| "docker".into());
        let compose_args = parts.collect();

        Self {
            runner,
            compose_program,
            compose_args,
            settle: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn system(compose_command: &str) -> Self {
        Self::new(Arc::new(SystemRunner), compose_command)
    }

    /// Override the post-restart settle delay and the health poll interval
    pub fn with_timing(mut self, settle: Duration, poll_interval: Duration) -> Self {
        self.settle = settle;
        self.poll_interval = poll_interval;
        self
    }

    /// Program that implements compose, for PATH checks
    pub fn compose_program(&self) -> &str {
        &self.compose_program
    }

    async fn docker(&self, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run("docker", &args, timeout).await
    }

    fn missing_container(output: &CommandOutput) -> bool {
        output.stderr.contains("No such object") || output.stderr.contains("No such container")
    }

    fn failure(operation: &'static str, container: &str, output: &CommandOutput) -> Error {
        if Self::missing_container(output) {
            return Error::container_not_found(container).with_operation(operation);
        }
        Error::command_failed("docker", output.combined())
            .with_operation(operation)
            .with_context("container", container)
            .with_context("exit_code", output.code.to_string())
    }

    /// Version of the Docker daemon; fails when the daemon is unreachable
    pub async fn server_version(&self) -> Result<String> {
        let output = self.docker(&["version", "--format", "{{.Server.Version}}"], DEFAULT_TIMEOUT).await?;
        if !output.success() {
            return Err(Error::new(ErrorKind::DockerUnavailable, output.combined())
                .with_operation("docker::version"));
        }
        Ok(output.stdout.trim().to_string())
    }

    pub async fn container_state(&self, name: &str) -> Result<ContainerState> {
        let output = self.docker(&["inspect", "--format", "{{json .State}}", name], DEFAULT_TIMEOUT).await?;
        if !output.success() {
            return Err(Self::failure("docker::inspect", name, &output));
        }
        serde_json::from_str(output.stdout.trim()).map_err(|e| {
            Error::parse_failed(format!("unexpected inspect output for '{}'", name))
                .with_operation("docker::inspect")
                .set_source(e)
        })
    }

    /// Containers (running or not) whose name contains `filter`
    pub async fn list_containers(&self, filter: &str) -> Result<Vec<ContainerSummary>> {
        let name_filter = format!("name={}", filter);
        let output = self.docker(
            &["ps", "-a", "--filter", &name_filter, "--format", "{{.Names}}\t{{.State}}"],
            DEFAULT_TIMEOUT,
        ).await?;
        if !output.success() {
            return Err(Error::command_failed("docker", output.combined()).with_operation("docker::ps"));
        }

        Ok(output.stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let mut parts = line.splitn(2, '\t');
                ContainerSummary {
                    name: parts.next().unwrap_or_default().trim().to_string(),
                    state: parts.next().unwrap_or_default().trim().to_string(),
                }
            })
            .collect())
    }

    /// Last `tail` lines of the container log, both streams
    pub async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        let tail = tail.to_string();
        let output = self.docker(&["logs", "--tail", &tail, name], DEFAULT_TIMEOUT).await?;
        if !output.success() {
            return Err(Self::failure("docker::logs", name, &output));
        }
        Ok(output.combined())
    }

    /// Run `argv` inside the container. A non-zero exit is returned, not raised.
    pub async fn exec(&self, name: &str, argv: &[&str]) -> Result<CommandOutput> {
        let mut args = vec!["exec", name];
        args.extend_from_slice(argv);
        let output = self.docker(&args, DEFAULT_TIMEOUT).await?;
        if Self::missing_container(&output) {
            return Err(Error::container_not_found(name).with_operation("docker::exec"));
        }
        Ok(output)
    }

    /// Restart the container and give it a moment to come back
    pub async fn restart(&self, name: &str) -> Result<()> {
        let output = self.docker(&["restart", name], DEFAULT_TIMEOUT).await?;
        if !output.success() {
            return Err(Self::failure("docker::restart", name, &output));
        }
        tracing::info!(container = name, "container restarted");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Poll until the container is ready; `false` once `timeout` has passed
    pub async fn wait_until_healthy(&self, name: &str, timeout: Duration) -> bool {
        let start = tokio::time::Instant::now();
        loop {
            match self.container_state(name).await {
                Ok(state) if state.is_ready() => return true,
                Ok(state) => tracing::debug!(container = name, status = %state.status, health = ?state.health_status(), "waiting for container"),
                Err(e) => tracing::debug!(container = name, error = %e, "container not inspectable yet"),
            }
            if start.elapsed() >= timeout {
                tracing::warn!(container = name, timeout_secs = timeout.as_secs(), "container did not become healthy");
                return false;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn compose(&self, file: &Path, project: &str, action: &[&str], timeout: Duration) -> Result<CommandOutput> {
        let mut args = self.compose_args.clone();
        args.extend([
            "-f".to_string(),
            file.display().to_string(),
            "-p".to_string(),
            project.to_string(),
        ]);
        args.extend(action.iter().map(|a| a.to_string()));
        self.runner.run(&self.compose_program, &args, timeout).await
    }

    /// `compose up -d`; the output is returned whatever the exit code
    pub async fn compose_up(&self, file: &Path, project: &str) -> Result<CommandOutput> {
        self.compose(file, project, &["up", "-d"], COMPOSE_UP_TIMEOUT).await
    }

    pub async fn compose_down(&self, file: &Path, project: &str) -> Result<CommandOutput> {
        self.compose(file, project, &["down"], COMPOSE_DOWN_TIMEOUT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn ok(stdout: &str) -> Result<CommandOutput> {
        Ok(CommandOutput { code: 0, stdout: stdout.into(), stderr: String::new() })
    }

    fn fail(stderr: &str) -> Result<CommandOutput> {
        Ok(CommandOutput { code: 1, stdout: String::new(), stderr: stderr.into() })
    }

    #[test]
    fn test_combined_output() {
        let out = CommandOutput { code: 0, stdout: "a\n".into(), stderr: "b\n".into() };
        assert_eq!(out.combined(), "a\nb");
        let out = CommandOutput { code: 1, stdout: String::new(), stderr: " err ".into() };
        assert_eq!(out.combined(), "err");
    }

    #[tokio::test]
    async fn test_container_state_parsing() {
        let runner = ScriptedRunner::new(|_, _| {
            ok(r#"{"Status":"running","Running":true,"Health":{"Status":"starting","FailingStreak":0}}"#)
        });
        let docker = Docker::new(runner.clone(), "docker compose");

        let state = docker.container_state(MYSQL_CONTAINER).await.unwrap();
        assert_eq!(state.status, "running");
        assert_eq!(state.health_status(), Some("starting"));
        assert!(!state.is_ready());
        assert_eq!(
            runner.calls()[0],
            vec!["docker", "inspect", "--format", "{{json .State}}", "wordpress_mysql"]
        );
    }

    #[tokio::test]
    async fn test_missing_container() {
        let runner = ScriptedRunner::new(|_, _| fail("Error: No such object: wordpress_app"));
        let docker = Docker::new(runner, "docker compose");
        let err = docker.container_state(WORDPRESS_CONTAINER).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);

        let err = docker.logs(WORDPRESS_CONTAINER, 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContainerNotFound);
    }

    #[tokio::test]
    async fn test_list_containers() {
        let runner = ScriptedRunner::new(|_, _| ok("wordpress_app\trunning\nwordpress_mysql\texited\n"));
        let docker = Docker::new(runner.clone(), "docker compose");
        let containers = docker.list_containers("wordpress").await.unwrap();
        assert_eq!(containers, vec![
            ContainerSummary { name: "wordpress_app".into(), state: "running".into() },
            ContainerSummary { name: "wordpress_mysql".into(), state: "exited".into() },
        ]);
        assert!(runner.calls()[0].contains(&"name=wordpress".to_string()));
    }

    #[tokio::test]
    async fn test_exec_returns_nonzero_output() {
        let runner = ScriptedRunner::new(|_, _| fail("ERROR 1045 (28000): Access denied"));
        let docker = Docker::new(runner.clone(), "docker compose");
        let out = docker.exec(MYSQL_CONTAINER, &["mysql", "-e", "SELECT 1;"]).await.unwrap();
        assert!(!out.success());
        assert!(out.combined().contains("Access denied"));
        assert_eq!(runner.calls()[0], vec!["docker", "exec", "wordpress_mysql", "mysql", "-e", "SELECT 1;"]);
    }

    #[tokio::test]
    async fn test_compose_commands() {
        let runner = ScriptedRunner::new(|_, _| ok(""));
        let docker = Docker::new(runner.clone(), "docker compose");
        docker.compose_up(Path::new("docker-compose.yml"), "wordpress").await.unwrap();
        assert_eq!(
            runner.calls()[0],
            vec!["docker", "compose", "-f", "docker-compose.yml", "-p", "wordpress", "up", "-d"]
        );

        let runner = ScriptedRunner::new(|_, _| ok(""));
        let docker = Docker::new(runner.clone(), "docker-compose");
        assert_eq!(docker.compose_program(), "docker-compose");
        docker.compose_down(Path::new("stack.yml"), "site").await.unwrap();
        assert_eq!(runner.calls()[0], vec!["docker-compose", "-f", "stack.yml", "-p", "site", "down"]);
    }

    #[tokio::test]
    async fn test_server_version() {
        let docker = Docker::new(ScriptedRunner::new(|_, _| ok("27.3.1\n")), "docker compose");
        assert_eq!(docker.server_version().await.unwrap(), "27.3.1");

        let docker = Docker::new(
            ScriptedRunner::new(|_, _| fail("Cannot connect to the Docker daemon")),
            "docker compose",
        );
        let err = docker.server_version().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DockerUnavailable);
    }

    #[tokio::test]
    async fn test_wait_until_healthy() {
        let runner = ScriptedRunner::sequence(vec![
            ok(r#"{"Status":"running","Health":{"Status":"starting"}}"#),
            ok(r#"{"Status":"running","Health":{"Status":"healthy"}}"#),
        ]);
        let docker = Docker::new(runner.clone(), "docker compose").with_timing(Duration::ZERO, Duration::ZERO);
        assert!(docker.wait_until_healthy(MYSQL_CONTAINER, Duration::from_secs(5)).await);
        assert_eq!(runner.calls().len(), 2);

        let runner = ScriptedRunner::new(|_, _| ok(r#"{"Status":"exited"}"#));
        let docker = Docker::new(runner, "docker compose").with_timing(Duration::ZERO, Duration::ZERO);
        assert!(!docker.wait_until_healthy(MYSQL_CONTAINER, Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let err = SystemRunner
            .run("wpcraft-definitely-not-a-program", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DockerUnavailable);
    }
}
