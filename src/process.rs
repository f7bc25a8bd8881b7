#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Subprocess helpers shared by the process-backed loader and its checks.

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncReadExt, BufReader},
    process::{Child, Command},
};

/// Kills the child when the future driving it is dropped, which is how an
/// abandoned load stops consuming a worker's resources.
struct ChildDropGuard(Option<Child>);

impl ChildDropGuard {
    /// Wraps the provided child process with the drop guard.
    fn new(child: Child) -> Self {
        Self(Some(child))
    }

    /// Returns a mutable reference to the underlying child process.
    fn child_mut(&mut self) -> Result<&mut Child> {
        self.0
            .as_mut()
            .context("child process already taken from guard")
    }

    /// Prevents the guard from killing the process on drop.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ChildDropGuard {
    fn drop(&mut self) {
        if let Some(child) = self.0.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub struct Collected {
    /// Exit status returned by the process.
    pub status: ExitStatus,
    /// Contents written to stdout.
    pub stdout: Vec<u8>,
    /// Contents written to stderr.
    pub stderr: Vec<u8>,
}

impl Collected {
    /// Exit code, `None` when the process was killed by a signal.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Stderr followed by stdout, lossily decoded. Interpreters write
    /// tracebacks to stderr, so it goes first.
    ///
    /// A silent process gets a colon-free summary so that no diagnostic is
    /// extracted from it.
    pub fn trace(&self) -> String {
        let stderr = String::from_utf8_lossy(&self.stderr);
        let stdout = String::from_utf8_lossy(&self.stdout);
        match (stderr.trim().is_empty(), stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", stderr.trim_end(), stdout.trim_end()),
            (false, true) => stderr.trim_end().to_string(),
            (true, false) => stdout.trim_end().to_string(),
            (true, true) => match self.status.code() {
                Some(code) => format!("process exited with code {code}"),
                None => "process was terminated by a signal".to_string(),
            },
        }
    }
}

/// A program to run, its arguments, and where to run it.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Program to execute.
    program: OsString,
    /// Arguments passed to the program.
    args:    Vec<OsString>,
    /// Working directory, inherited when unset.
    cwd:     Option<PathBuf>,
}

impl Invocation {
    /// Starts an invocation of `program` with no arguments.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args:    Vec::new(),
            cwd:     None,
        }
    }

    /// Appends arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Self {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Spawns the process with a null stdin and collects stdout/stderr.
    ///
    /// No deadline is applied here; callers wrap the returned future in
    /// `tokio::time::timeout`, and dropping it kills the child.
    pub async fn collect(&self) -> Result<Collected> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let mut guard = ChildDropGuard::new(cmd.spawn().with_context(|| {
            format!("failed to spawn {}", self.program.to_string_lossy())
        })?);

        let stdout = guard
            .child_mut()?
            .stdout
            .take()
            .context("missing stdout pipe")?;
        let stderr = guard
            .child_mut()?
            .stderr
            .take()
            .context("missing stderr pipe")?;

        let out_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            BufReader::new(stdout)
                .read_to_end(&mut buf)
                .await
                .context("failed to read stdout")?;
            Ok::<Vec<u8>, anyhow::Error>(buf)
        });
        let err_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            BufReader::new(stderr)
                .read_to_end(&mut buf)
                .await
                .context("failed to read stderr")?;
            Ok::<Vec<u8>, anyhow::Error>(buf)
        });

        let status = guard
            .child_mut()?
            .wait()
            .await
            .context("failed to wait on process")?;
        let stdout = out_task.await.context("stdout task join error")??;
        let stderr = err_task.await.context("stderr task join error")??;
        guard.disarm();

        Ok(Collected {
            status,
            stdout,
            stderr,
        })
    }
}
