// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution with stdio relayed to the build console and hard
//! cancellation through the session's token.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::console::BuildConsole;
use crate::error::SessionError;

/// Run a program to completion, or kill it when the token fires first.
///
/// Both stdout and stderr stream to the console; byte order is preserved
/// per stream. In the killed branch the child is reaped before returning
/// and a kill failure is written to the console rather than propagated.
pub(crate) async fn run(
    program: &str,
    argv: &[String],
    cwd: Option<&str>,
    console: &BuildConsole,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    let cmd_display = argv_display(program, argv);

    let mut command = tokio::process::Command::new(program);
    command.args(argv).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .map_err(|source| SessionError::Spawn { command: cmd_display.clone(), source })?;

    let mut relays: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        relays.push(tokio::spawn(relay(stdout, console.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        relays.push(tokio::spawn(relay(stderr, console.clone())));
    }

    tokio::select! {
        status = child.wait() => {
            for relay in relays {
                let _ = relay.await;
            }
            match status {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(SessionError::ExitStatus {
                    command: cmd_display,
                    code: status.code().unwrap_or(-1),
                }),
                Err(source) => Err(SessionError::Spawn { command: cmd_display, source }),
            }
        }
        _ = cancel.cancelled() => {
            tracing::debug!(command = %cmd_display, "build canceled, killing process");
            if let Err(e) = child.start_kill() {
                console.write_line(format!("kill command {cmd_display} failed, error: {e}")).await;
            }
            // Reap the child; its pipes close and the relays drain.
            let _ = child.wait().await;
            for relay in relays {
                let _ = relay.await;
            }
            Err(SessionError::Canceled { command: cmd_display })
        }
    }
}

async fn relay(mut reader: impl tokio::io::AsyncRead + Unpin, console: BuildConsole) {
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => console.write(&buf[..n]).await,
        }
    }
}

fn argv_display(program: &str, argv: &[String]) -> String {
    if argv.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, argv.join(" "))
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
