// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session interpreter: walks a job's command tree, owns the build
//! status and environment, and coordinates console, uploads, subprocesses
//! and status reports.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use stoker_protocol::{AgentRuntimeInfo, BuildCommand, Message, Report, RunIf};

use crate::artifacts::Uploader;
use crate::console::BuildConsole;
use crate::error::{SessionError, UploadError};
use crate::glob;
use crate::process;

/// Build status of the in-flight job. Monotonic: once `Failed`, a session
/// never goes back to `Passed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStatus {
    /// Before `start` has run.
    #[default]
    Unset,
    Passed,
    Failed,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Unset => "",
            BuildStatus::Passed => "passed",
            BuildStatus::Failed => "failed",
        }
    }
}

/// What the session needs from the agent process around it: URL
/// qualification, runtime info for reports, and the process-wide state
/// store for build locators.
pub trait AgentContext: Send + Sync {
    /// Qualify a server-relative URI against the server base URL.
    fn full_server_url(&self, uri: &str) -> String;

    /// Runtime info snapshot for reports and pings.
    fn runtime_info(&self) -> AgentRuntimeInfo;

    /// Write a process-wide state key (`buildLocator`, `runtimeStatus`, …).
    fn set_state(&self, key: &str, value: &str);
}

/// Handle held by the dispatcher: cancels the session and waits for it to
/// drain. Dropping the handle without `close` leaves the session running
/// to completion.
pub struct SessionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task }
    }

    /// Raise the cancel signal and wait until the session has fully
    /// drained and closed its console.
    pub async fn close(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// The stateful execution of one job.
pub struct BuildSession {
    client: reqwest::Client,
    send: mpsc::Sender<Message>,
    ctx: Arc<dyn AgentContext>,
    cancel: CancellationToken,

    build_status: BuildStatus,
    build_id: String,
    envs: HashMap<String, String>,
    console: Option<BuildConsole>,
    artifacts: Option<Uploader>,
    /// Bound alongside `artifacts`; no dispatch tag targets it yet.
    #[allow(dead_code)]
    properties: Option<Uploader>,
}

impl BuildSession {
    pub fn new(
        client: reqwest::Client,
        send: mpsc::Sender<Message>,
        ctx: Arc<dyn AgentContext>,
    ) -> Self {
        Self {
            client,
            send,
            ctx,
            cancel: CancellationToken::new(),
            build_status: BuildStatus::default(),
            build_id: String::new(),
            envs: HashMap::new(),
            console: None,
            artifacts: None,
            properties: None,
        }
    }

    /// The cancel signal observed by every long-running leaf of this
    /// session. Level-triggered: once raised it stays raised.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Convenience for callers without their own task wrapper: run the job
    /// on a background task and hand back the lifecycle handle.
    pub fn spawn(self, cmd: BuildCommand) -> SessionHandle {
        let cancel = self.cancel_token();
        let task = tokio::spawn(async move {
            if let Err(err) = self.process_job(cmd).await {
                tracing::info!(error = %err, "build finished with error");
            }
        });
        SessionHandle::new(cancel, task)
    }

    /// Top-level entry point. On every exit path the console is closed
    /// (exactly once) before the future resolves, which is the session's
    /// done signal. A non-cancel error is recorded as a build failure
    /// before closing.
    pub async fn process_job(mut self, cmd: BuildCommand) -> Result<(), SessionError> {
        let result = self.process(&cmd).await;
        match &result {
            Err(err) if err.is_canceled() => {
                tracing::debug!(error = %err, "build canceled");
            }
            Err(err) => {
                let message = err.to_string();
                self.fail(&message).await;
            }
            Ok(()) => {}
        }
        if let Some(console) = self.console.take() {
            console.close().await;
        }
        result
    }

    // -----------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------

    /// Recursive dispatch over one command. Boxed future: the tree nests
    /// through `subCommands` and guard commands.
    fn process<'a>(
        &'a mut self,
        cmd: &'a BuildCommand,
    ) -> Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>> {
        Box::pin(async move {
            if self.cancel.is_cancelled() {
                tracing::debug!(command = %cmd.name, "ignored, build canceled");
                return Ok(());
            }
            tracing::debug!(command = %cmd.name, "processing build command");
            if self.should_skip(cmd) {
                return Ok(());
            }
            if let Some(guard) = &cmd.test {
                let success = self.process(&guard.command).await.is_ok();
                if success != guard.expectation {
                    return Ok(());
                }
            }

            match cmd.name.as_str() {
                "start" => self.process_start(cmd),
                "compose" => self.process_compose(cmd).await,
                "export" => self.process_export(cmd).await,
                "test" => self.process_test(cmd),
                "exec" => self.process_exec(cmd).await,
                "echo" => self.process_echo(cmd).await,
                "uploadArtifact" => self.process_upload_artifact(cmd).await,
                "reportCurrentStatus" | "reportCompleting" | "reportCompleted" => {
                    self.report(cmd).await
                }
                "end" => Ok(()),
                other => {
                    self.console_line(&format!("TBI command: {other}")).await;
                    Ok(())
                }
            }
        })
    }

    /// Skip (without failure) when the status is set and the command's
    /// condition names a different one.
    fn should_skip(&self, cmd: &BuildCommand) -> bool {
        match (self.build_status, cmd.run_if_config) {
            (BuildStatus::Unset, _) => false,
            (_, RunIf::Any) => false,
            (BuildStatus::Passed, RunIf::Passed) => false,
            (BuildStatus::Failed, RunIf::Failed) => false,
            _ => true,
        }
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    /// Bind runtime locators and collaborators from the job settings and
    /// mark the build passing. Runs once: a repeated `start` would leak
    /// the live console, so it is ignored.
    fn process_start(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        if self.build_status != BuildStatus::Unset {
            tracing::warn!("ignored repeated start command");
            return Ok(());
        }
        let setting =
            |key: &str| cmd.args.get(key).cloned().unwrap_or_default();

        self.ctx.set_state("buildLocator", &setting("buildLocator"));
        self.ctx.set_state("buildLocatorForDisplay", &setting("buildLocatorForDisplay"));

        let console_url = self.ctx.full_server_url(&setting("consoleURI"));
        self.console = Some(BuildConsole::new(self.client.clone(), console_url));
        self.artifacts = Some(Uploader::new(
            self.client.clone(),
            self.ctx.full_server_url(&setting("artifactUploadBaseUrl")),
        ));
        self.properties = Some(Uploader::new(
            self.client.clone(),
            self.ctx.full_server_url(&setting("propertyBaseUrl")),
        ));
        self.build_id = setting("buildId");
        self.envs = HashMap::new();
        self.build_status = BuildStatus::Passed;
        Ok(())
    }

    /// Run children in order. A failing child is recorded (first failure
    /// reaches the console) but later children still run, so `runIf:
    /// failed` cleanup steps get their turn. Returns the last failing
    /// child's error. Cancellation is not recorded as failure.
    async fn process_compose(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let mut result = Ok(());
        for sub in &cmd.sub_commands {
            if let Err(err) = self.process(sub).await {
                if !err.is_canceled() {
                    let message = err.to_string();
                    self.fail(&message).await;
                }
                result = Err(err);
            }
        }
        result
    }

    /// Overlay bindings into the session environment, or with no args emit
    /// the current bindings as sorted `export KEY=VALUE` lines.
    async fn process_export(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        if !cmd.args.is_empty() {
            for (key, value) in &cmd.args {
                self.envs.insert(key.clone(), value.clone());
            }
            return Ok(());
        }
        let mut exports: Vec<String> =
            self.envs.iter().map(|(key, value)| format!("export {key}={value}")).collect();
        exports.sort();
        let console = self.console_for("export")?;
        for line in exports {
            console.write_line(line).await;
        }
        Ok(())
    }

    /// `test -d <path>`: ok iff the path can be stat'ed. Any other flag is
    /// a protocol violation.
    fn process_test(&self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let flag = cmd.args.get("flag").map(String::as_str).unwrap_or_default();
        let path = cmd.args.get("path").map(String::as_str).unwrap_or_default();
        if flag == "-d" {
            return match std::fs::metadata(path) {
                Ok(_) => Ok(()),
                Err(e) => Err(SessionError::stat(path, &e)),
            };
        }
        Err(SessionError::UnknownTestFlag)
    }

    async fn process_exec(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let program = cmd.args.get("command").cloned().unwrap_or_default();
        let argv = cmd.extract_arg_list(cmd.args.len().saturating_sub(1));
        let console = self.console_for("exec")?.clone();
        process::run(&program, &argv, cmd.working_directory.as_deref(), &console, &self.cancel)
            .await
    }

    async fn process_echo(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let console = self.console_for("echo")?;
        for line in cmd.extract_arg_list(cmd.args.len()) {
            console.write_line(line).await;
        }
        Ok(())
    }

    /// Resolve the source against the command's working directory and feed
    /// it to the upload walk.
    async fn process_upload_artifact(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let src = cmd.args.get("src").cloned().unwrap_or_default();
        let dest_dir = cmd.args.get("dest").cloned().unwrap_or_default();

        let wd = match cmd.working_directory.as_deref() {
            Some(dir) if !dir.is_empty() => dir,
            _ => ".",
        };
        let wd = std::path::absolute(wd).map_err(|e| SessionError::stat(wd, &e))?;
        let source = wd.join(&src).to_string_lossy().into_owned();
        self.upload_artifacts(&source, &dest_dir).await
    }

    /// Walk a source (literal path or wildcard pattern) and upload every
    /// piece, preserving relative directory layout under the destination.
    fn upload_artifacts<'a>(
        &'a self,
        source: &'a str,
        dest_dir: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'a>> {
        Box::pin(async move {
            if glob::has_wildcard(source) {
                let base = glob::wildcard_base(source);
                for matched in glob::expand(source)? {
                    let matched = matched.to_string_lossy().into_owned();
                    let match_dir = match matched.rfind('/') {
                        Some(i) => &matched[..i],
                        None => "",
                    };
                    let relative = match_dir.strip_prefix(base).unwrap_or("");
                    let dest = glob::join_slash(dest_dir, relative);
                    self.upload_artifacts(&matched, &dest).await?;
                }
                return Ok(());
            }

            // Literal path: stat first so a missing source fails with the
            // offending path in the message.
            std::fs::metadata(source).map_err(|e| UploadError::stat(source, &e))?;
            self.console_line(&format!(
                "Uploading artifacts from {} to {}",
                source,
                dest_description(dest_dir)
            ))
            .await;

            let name = Path::new(source)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let dest_path =
                if dest_dir.is_empty() { name } else { glob::join_slash(dest_dir, &name) };

            let uploader = self
                .artifacts
                .as_ref()
                .ok_or_else(|| SessionError::NotStarted { command: "uploadArtifact".into() })?;
            let dest_url = uploader.build_dest_url(dest_dir, &self.build_id);
            uploader.upload(Path::new(source), &dest_path, &dest_url).await?;
            Ok(())
        })
    }

    /// Send one outbound report named after the command, carrying the
    /// runtime info and the capitalized build result.
    async fn report(&mut self, cmd: &BuildCommand) -> Result<(), SessionError> {
        let report = Report {
            agent_runtime_info: self.ctx.runtime_info(),
            build_id: self.build_id.clone(),
            job_state: cmd.args.get("jobState").cloned().unwrap_or_default(),
            result: capitalize(self.build_status.as_str()),
        };
        let message = Message::report(&cmd.name, &report)?;
        if self.send.send(message).await.is_err() {
            tracing::warn!(command = %cmd.name, "outbound channel closed, report dropped");
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Failure
    // -----------------------------------------------------------------

    /// Record a build failure. Idempotent: only the first failure writes
    /// its message to the console; later ones just keep steering `runIf`.
    async fn fail(&mut self, message: &str) {
        if self.build_status != BuildStatus::Failed {
            self.console_line(message).await;
            self.build_status = BuildStatus::Failed;
        }
    }

    fn console_for(&self, command: &str) -> Result<&BuildConsole, SessionError> {
        self.console
            .as_ref()
            .ok_or_else(|| SessionError::NotStarted { command: command.to_string() })
    }

    /// Write a line if the console is bound; otherwise the line only
    /// reaches the agent log.
    async fn console_line(&self, line: &str) {
        match &self.console {
            Some(console) => console.write_line(line).await,
            None => tracing::warn!(line, "console not bound, line dropped"),
        }
    }
}

fn dest_description(path: &str) -> &str {
    if path.is_empty() {
        "[defaultRoot]"
    } else {
        path
    }
}

/// Upper-case the first code point, leave the rest untouched.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
