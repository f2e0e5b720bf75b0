//! Operating-system integration: browser, clipboard, detached processes.

use crate::config::ProcessConfig;
use crate::{LaunchkitError, Result};
use async_trait::async_trait;
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Desktop side effects a plugin action may trigger.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// Open an `http`, `https` or `file` URL with the default handler.
    fn open_url(&self, url: &str) -> Result<()>;

    async fn set_clipboard_text(&self, text: &str) -> Result<()>;

    /// Spawn `argv` without waiting for it.
    fn run_detached(&self, argv: &[String]) -> Result<()>;
}

/// [`Desktop`] backed by the platform's opener and clipboard tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDesktop;

impl SystemDesktop {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Desktop for SystemDesktop {
    fn open_url(&self, url: &str) -> Result<()> {
        validate_url(url)?;
        debug!("Opening {}", url);

        #[cfg(target_os = "linux")]
        {
            spawn_detached("xdg-open", &[url.to_string()])
        }

        #[cfg(target_os = "macos")]
        {
            spawn_detached("open", &[url.to_string()])
        }

        #[cfg(target_os = "windows")]
        {
            spawn_detached("explorer", &[url.to_string()])
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Err(LaunchkitError::Other(
                "Unsupported platform for opening URLs".to_string(),
            ))
        }
    }

    async fn set_clipboard_text(&self, text: &str) -> Result<()> {
        let mut last_error = None;
        for (program, args) in CLIPBOARD_COMMANDS {
            match pipe_to(program, args, text).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    debug!("Clipboard via {} failed: {}", program, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            LaunchkitError::Other("No clipboard tool available".to_string())
        }))
    }

    fn run_detached(&self, argv: &[String]) -> Result<()> {
        let (program, args) = argv.split_first().ok_or_else(|| LaunchkitError::InvalidParams {
            message: "empty command".to_string(),
        })?;
        spawn_detached(program, args)
    }
}

fn validate_url(url: &str) -> Result<()> {
    let allowed = ["http://", "https://", "file://"];
    if allowed.iter().any(|scheme| url.starts_with(scheme)) {
        Ok(())
    } else {
        Err(LaunchkitError::Validation {
            field: "url".to_string(),
            message: "Only http, https and file URLs are allowed".to_string(),
        })
    }
}

fn spawn_detached(program: &str, args: &[String]) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| LaunchkitError::Command {
            command: program.to_string(),
            message: e.to_string(),
        })?;

    // Reap the child without blocking the caller.
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

#[cfg(target_os = "macos")]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("pbcopy", &[])];

#[cfg(target_os = "windows")]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[("clip", &[])];

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const CLIPBOARD_COMMANDS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

async fn pipe_to(program: &str, args: &[&str], input: &str) -> Result<()> {
    let command_error = |message: String| LaunchkitError::Command {
        command: program.to_string(),
        message,
    };

    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| command_error(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| command_error(e.to_string()))?;
    }

    let status = tokio::time::timeout(ProcessConfig::COMMAND_TIMEOUT, child.wait())
        .await
        .map_err(|_| LaunchkitError::Timeout(ProcessConfig::COMMAND_TIMEOUT))?
        .map_err(|e| command_error(e.to_string()))?;

    if status.success() {
        Ok(())
    } else {
        Err(command_error(format!("exited with {}", status)))
    }
}

/// Run a command to completion and return its stdout.
///
/// Bounded by [`ProcessConfig::COMMAND_TIMEOUT`]; a non-zero exit is an error.
pub async fn run_command_output(program: &str, args: &[&str]) -> Result<String> {
    debug!("Running {} {}", program, args.join(" "));

    let output = tokio::time::timeout(
        ProcessConfig::COMMAND_TIMEOUT,
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| LaunchkitError::Timeout(ProcessConfig::COMMAND_TIMEOUT))?
    .map_err(|e| LaunchkitError::Command {
        command: program.to_string(),
        message: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("{} exited with {}: {}", program, output.status, stderr.trim());
        return Err(LaunchkitError::Command {
            command: program.to_string(),
            message: format!("exited with {}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// A side effect recorded by [`RecordingDesktop`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEvent {
    OpenUrl(String),
    Clipboard(String),
    Spawn(Vec<String>),
}

/// [`Desktop`] that records calls instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingDesktop {
    events: Mutex<Vec<DesktopEvent>>,
}

impl RecordingDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DesktopEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, event: DesktopEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[async_trait]
impl Desktop for RecordingDesktop {
    fn open_url(&self, url: &str) -> Result<()> {
        validate_url(url)?;
        self.record(DesktopEvent::OpenUrl(url.to_string()));
        Ok(())
    }

    async fn set_clipboard_text(&self, text: &str) -> Result<()> {
        self.record(DesktopEvent::Clipboard(text.to_string()));
        Ok(())
    }

    fn run_detached(&self, argv: &[String]) -> Result<()> {
        if argv.is_empty() {
            return Err(LaunchkitError::InvalidParams {
                message: "empty command".to_string(),
            });
        }
        self.record(DesktopEvent::Spawn(argv.to_vec()));
        Ok(())
    }
}
