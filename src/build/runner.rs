// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build step execution.

use crate::build::{BuildError, Result, Step};

use indicatif::{ProgressBar, ProgressStyle};
use std::{
    future::Future,
    process::Stdio,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
};
use tracing::{debug, info};

/// Execute build steps.
pub trait Runner {
    /// Run step to completion.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError`] if step cannot be run, or if it does not exit
    ///   successfully.
    fn run(&self, step: &Step) -> impl Future<Output = Result<()>> + Send;
}

/// Run build steps as subprocesses.
///
/// Output of each subprocess is forwarded line by line to the terminal, while
/// a spinner shows which step is running and for how long.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubprocessRunner;

impl SubprocessRunner {
    /// Construct new subprocess runner.
    pub fn new() -> Self {
        Self
    }
}

impl Runner for SubprocessRunner {
    async fn run(&self, step: &Step) -> Result<()> {
        mkdirp::mkdirp(&step.cwd).map_err(|source| BuildError::CreateDir {
            source,
            path: step.cwd.clone(),
        })?;

        debug!("spawn {step} in {:?}", step.cwd.display());
        let syscall_error = |source| BuildError::Syscall {
            source,
            program: step.program.clone(),
        };
        let mut child = Command::new(&step.program)
            .args(&step.args)
            .current_dir(&step.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(syscall_error)?;

        let bar = ProgressBar::new_spinner();
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.green} {elapsed_precise:.green}  {msg}",
        )?);
        bar.set_message(step.label.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| syscall_error(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| syscall_error(std::io::Error::other("stderr not captured")))?;

        let forwarded = futures::try_join!(
            forward_lines(stdout, &bar, false),
            forward_lines(stderr, &bar, true),
        );
        let status = child.wait().await;
        bar.finish_and_clear();

        forwarded.map_err(syscall_error)?;
        let status = status.map_err(syscall_error)?;
        if !status.success() {
            return Err(BuildError::StepFailed {
                label: step.label.clone(),
                status,
            });
        }

        Ok(())
    }
}

async fn forward_lines(
    stream: impl AsyncRead + Unpin,
    bar: &ProgressBar,
    to_stderr: bool,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            return Ok(());
        }

        // INVARIANT: Build output is not guaranteed to be valid UTF-8.
        let line = String::from_utf8_lossy(&buffer);
        let line = line.trim_end_matches(['\r', '\n']);
        bar.suspend(|| {
            if to_stderr {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        });
    }
}

/// Record build steps without running them.
#[derive(Debug, Default)]
pub struct DryRunner {
    steps: Mutex<Vec<Step>>,
}

impl DryRunner {
    /// Construct new dry runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps recorded so far, in order.
    pub fn recorded(&self) -> Vec<Step> {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Runner for DryRunner {
    async fn run(&self, step: &Step) -> Result<()> {
        info!("(dry run) {step}");
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(step.clone());

        Ok(())
    }
}
