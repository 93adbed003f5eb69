//! Executes student code with the local interpreters.
//!
//! Every run gets its own scratch directory which is removed afterwards.
//! This is a convenience for development and classroom setups, not a
//! sandbox, which is why production disables it by default.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

use crate::metrics::CODE_RUNS_TOTAL;
use crate::models::coding::Language;

pub const RUN_TIMEOUT: Duration = Duration::from_secs(10);
/// Output beyond this many bytes is cut off
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
    Timeout,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
            RunStatus::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub output: String,
    pub status: RunStatus,
    pub execution_time: u64,
}

fn source_file(language: Language) -> &'static str {
    match language {
        Language::Python => "main.py",
        Language::Javascript => "main.js",
        Language::Java => "Main.java",
    }
}

fn truncate_output(mut text: String) -> String {
    if text.len() > MAX_OUTPUT_BYTES {
        let mut cut = MAX_OUTPUT_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n[output truncated]");
    }
    text
}

/// Stdout on success, otherwise `Error: ` followed by stderr
fn render_output(success: bool, stdout: &[u8], stderr: &[u8]) -> String {
    if success {
        truncate_output(String::from_utf8_lossy(stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(stderr);
        let detail = if stderr.trim().is_empty() {
            String::from_utf8_lossy(stdout).into_owned()
        } else {
            stderr.into_owned()
        };
        truncate_output(format!("Error: {}", detail))
    }
}

struct Scratch {
    dir: PathBuf,
}

impl Scratch {
    async fn create() -> Result<Self> {
        let dir = std::env::temp_dir().join(format!("cyberarena-run-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create scratch dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        &self.dir
    }

    async fn remove(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to clean scratch dir");
        }
    }
}

async fn run_command(mut command: Command, timeout: Duration) -> Result<Option<std::process::Output>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let child = command.spawn().context("Failed to start interpreter")?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(Some(output.context("Failed to collect interpreter output")?)),
        Err(_) => Ok(None),
    }
}

async fn execute(language: Language, dir: &Path, timeout: Duration) -> Result<(RunStatus, String)> {
    let file = source_file(language);

    if language == Language::Java {
        let mut javac = Command::new("javac");
        javac.arg(file).current_dir(dir);
        match run_command(javac, timeout).await? {
            Some(output) if output.status.success() => {}
            Some(output) => {
                return Ok((
                    RunStatus::Error,
                    render_output(false, &output.stdout, &output.stderr),
                ))
            }
            None => return Ok((RunStatus::Timeout, timeout_message(timeout))),
        }
    }

    let mut command = match language {
        Language::Python => {
            let mut c = Command::new("python3");
            c.arg(file);
            c
        }
        Language::Javascript => {
            let mut c = Command::new("node");
            c.arg(file);
            c
        }
        Language::Java => {
            let mut c = Command::new("java");
            c.args(["-cp", ".", "Main"]);
            c
        }
    };
    command.current_dir(dir);

    Ok(match run_command(command, timeout).await? {
        Some(output) => {
            let success = output.status.success();
            let status = if success {
                RunStatus::Success
            } else {
                RunStatus::Error
            };
            (status, render_output(success, &output.stdout, &output.stderr))
        }
        None => (RunStatus::Timeout, timeout_message(timeout)),
    })
}

fn timeout_message(timeout: Duration) -> String {
    format!("Error: Execution timed out after {} seconds", timeout.as_secs())
}

/// Writes `code` into a fresh scratch dir and runs it with `timeout`.
/// Java sources must declare a public `Main` class.
pub async fn run_code(language: Language, code: &str, timeout: Duration) -> Result<RunOutcome> {
    let scratch = Scratch::create().await?;
    let started = Instant::now();

    let result = async {
        tokio::fs::write(scratch.path().join(source_file(language)), code)
            .await
            .context("Failed to write source file")?;
        execute(language, scratch.path(), timeout).await
    }
    .await;
    scratch.remove().await;

    let (status, output) = match result {
        Ok(pair) => pair,
        Err(e) => {
            CODE_RUNS_TOTAL
                .with_label_values(&[language.as_str(), "failed"])
                .inc();
            return Err(e);
        }
    };

    let elapsed = started.elapsed().as_millis() as u64;
    CODE_RUNS_TOTAL
        .with_label_values(&[language.as_str(), status.as_str()])
        .inc();
    tracing::debug!(language = language.as_str(), status = status.as_str(), elapsed_ms = elapsed, "Code run finished");

    Ok(RunOutcome {
        output,
        status,
        execution_time: elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_output_success_uses_stdout() {
        assert_eq!(render_output(true, b"42\n", b"warning"), "42\n");
    }

    #[test]
    fn test_render_output_failure_prefixes_stderr() {
        assert_eq!(
            render_output(false, b"", b"NameError: x"),
            "Error: NameError: x"
        );
        assert_eq!(render_output(false, b"partial", b"  "), "Error: partial");
    }

    #[test]
    fn test_truncate_output_respects_char_boundaries() {
        let long = "é".repeat(MAX_OUTPUT_BYTES);
        let cut = truncate_output(long);
        assert!(cut.ends_with("[output truncated]"));
        assert!(cut.len() <= MAX_OUTPUT_BYTES + 20);
    }

    #[test]
    fn test_java_source_is_main() {
        assert_eq!(source_file(Language::Java), "Main.java");
        assert_eq!(source_file(Language::Python), "main.py");
    }

    #[tokio::test]
    #[ignore = "requires python3 on PATH"]
    async fn test_runs_python() {
        let outcome = run_code(Language::Python, "print(6 * 7)", RUN_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(outcome.output.trim(), "42");
    }
}
