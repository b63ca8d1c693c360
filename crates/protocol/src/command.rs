// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The build command tree.
//!
//! A job arrives as a single nested [`BuildCommand`] value. Commands are
//! inert: the session interpreter walks them but never mutates one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Condition for running a command, matched against the current build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunIf {
    /// Run regardless of the build status.
    Any,
    /// Run only while the build is passing (the default).
    #[default]
    Passed,
    /// Run only after the build has failed.
    Failed,
}

/// Guard attached to a command: the guard command is evaluated first and the
/// guarded command runs only when the guard outcome matches `expectation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestGuard {
    pub command: BuildCommand,
    pub expectation: bool,
}

/// One node of a job's command tree.
///
/// `args` is a string-keyed map; positional argument lists are stored under
/// stringified indices `"0".."n-1"` and recovered with
/// [`BuildCommand::extract_arg_list`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCommand {
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub run_if_config: RunIf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Box<TestGuard>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_commands: Vec<BuildCommand>,
}

impl BuildCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: HashMap::new(),
            working_directory: None,
            run_if_config: RunIf::default(),
            test: None,
            sub_commands: Vec::new(),
        }
    }

    /// Recover the positional argument list `[args["0"], …, args["n-1"]]`.
    /// Missing indices become empty strings.
    pub fn extract_arg_list(&self, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| self.args.get(&i.to_string()).cloned().unwrap_or_default())
            .collect()
    }

    // -----------------------------------------------------------------
    // Constructors, one per dispatch tag
    // -----------------------------------------------------------------

    /// `start` with its settings map (buildId, consoleURI,
    /// artifactUploadBaseUrl, propertyBaseUrl, buildLocator, …).
    pub fn start(settings: HashMap<String, String>) -> Self {
        let mut cmd = Self::new("start");
        cmd.args = settings;
        cmd
    }

    pub fn compose(sub_commands: Vec<BuildCommand>) -> Self {
        let mut cmd = Self::new("compose");
        cmd.sub_commands = sub_commands;
        cmd
    }

    /// `export` with bindings overlays them into the session environment;
    /// `export` with an empty map prints the current bindings.
    pub fn export(envs: HashMap<String, String>) -> Self {
        let mut cmd = Self::new("export");
        cmd.args = envs;
        cmd
    }

    /// `test -d <path>`: succeeds when the path exists.
    pub fn test_dir(path: impl Into<String>) -> Self {
        let mut cmd = Self::new("test");
        cmd.args.insert("flag".into(), "-d".into());
        cmd.args.insert("path".into(), path.into());
        cmd
    }

    /// `exec` stores the program under `"command"` and the argv tail
    /// positionally.
    pub fn exec<I, S>(program: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = Self::new("exec");
        cmd.args.insert("command".into(), program.into());
        for (i, arg) in argv.into_iter().enumerate() {
            cmd.args.insert(i.to_string(), arg.into());
        }
        cmd
    }

    pub fn echo<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = Self::new("echo");
        for (i, line) in lines.into_iter().enumerate() {
            cmd.args.insert(i.to_string(), line.into());
        }
        cmd
    }

    pub fn upload_artifact(src: impl Into<String>, dest: impl Into<String>) -> Self {
        let mut cmd = Self::new("uploadArtifact");
        cmd.args.insert("src".into(), src.into());
        cmd.args.insert("dest".into(), dest.into());
        cmd
    }

    /// The report commands run unconditionally: a failed build still has
    /// to tell the server it failed.
    pub fn report_current_status(job_state: impl Into<String>) -> Self {
        let mut cmd = Self::new("reportCurrentStatus").run_if(RunIf::Any);
        cmd.args.insert("jobState".into(), job_state.into());
        cmd
    }

    pub fn report_completing() -> Self {
        let mut cmd = Self::new("reportCompleting").run_if(RunIf::Any);
        cmd.args.insert("jobState".into(), "Completing".into());
        cmd
    }

    pub fn report_completed() -> Self {
        let mut cmd = Self::new("reportCompleted").run_if(RunIf::Any);
        cmd.args.insert("jobState".into(), "Completed".into());
        cmd
    }

    pub fn end() -> Self {
        Self::new("end")
    }

    // -----------------------------------------------------------------
    // Chaining
    // -----------------------------------------------------------------

    /// Set the working directory, relative to the agent's current directory.
    pub fn setwd(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn run_if(mut self, run_if: RunIf) -> Self {
        self.run_if_config = run_if;
        self
    }

    /// Attach a guard: run this command only when `command`'s outcome
    /// (success = true) equals `expectation`.
    pub fn with_test(mut self, command: BuildCommand, expectation: bool) -> Self {
        self.test = Some(Box::new(TestGuard { command, expectation }));
        self
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
