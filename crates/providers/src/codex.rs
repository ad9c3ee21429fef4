//! Local `codex` CLI adapter.
//!
//! Runs `codex exec --json ...` as a child process and reads its JSONL
//! event stream from stdout.  Only `item.completed` events carrying an
//! `agent_message` item contribute text.  The child is killed when it
//! passes its deadline or when the consumer drops the stream.

use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use ps_domain::config::LlmConfig;
use ps_domain::error::{Error, Result};
use ps_domain::stream::FragmentStream;

use crate::prompt;
use crate::traits::{AnswerProvider, AnswerRequest, DecisionProvider};

pub struct CodexCliProvider {
    bin: String,
    model: Option<String>,
    timeout: Duration,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl CodexCliProvider {
    pub fn from_config(cfg: &LlmConfig) -> Self {
        Self {
            bin: cfg.codex_bin.clone(),
            model: cfg.model.clone(),
            timeout: cfg.timeout(),
            chunk_size: cfg.chunk_size.max(1),
            chunk_delay: Duration::from_millis(cfg.chunk_delay_ms),
        }
    }

    fn args(&self, prompt: &str) -> Vec<String> {
        let mut args: Vec<String> = ["exec", "--json", "--skip-git-repo-check", "--color", "never"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(ref model) = self.model {
            args.push("-m".into());
            args.push(model.clone());
        }
        args.push(prompt.to_owned());
        args
    }

    fn spawn(&self, prompt: &str) -> Result<Child> {
        Command::new(&self.bin)
            .args(self.args(prompt))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Subprocess(format!("spawning {}: {e}", self.bin)))
    }

    /// Run to completion and return the last agent message.
    async fn run(&self, prompt: &str) -> Result<String> {
        let mut child = self.spawn(prompt)?;
        let deadline = Instant::now() + self.timeout;
        let stdout = take_stdout(&mut child)?;
        let stderr_task = drain_stderr(&mut child);

        let mut lines = BufReader::new(stdout).lines();
        let mut output: Option<String> = None;
        loop {
            match tokio::time::timeout_at(deadline, lines.next_line()).await {
                Err(_) => {
                    let _ = child.kill().await;
                    return Err(Error::Timeout(format!("{} exceeded {:?}", self.bin, self.timeout)));
                }
                Ok(Err(e)) => {
                    let _ = child.kill().await;
                    return Err(Error::Io(e));
                }
                Ok(Ok(None)) => break,
                Ok(Ok(Some(line))) => {
                    if let Some(text) = parse_agent_message(&line) {
                        output = Some(text);
                    }
                }
            }
        }

        finish(&mut child, deadline, stderr_task).await?;
        output.ok_or_else(|| Error::Subprocess("codex produced no agent message".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Child process helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn take_stdout(child: &mut Child) -> Result<tokio::process::ChildStdout> {
    child
        .stdout
        .take()
        .ok_or_else(|| Error::Subprocess("child stdout not captured".into()))
}

/// Read stderr on its own task so a chatty child never blocks on a full pipe.
fn drain_stderr(child: &mut Child) -> tokio::task::JoinHandle<String> {
    let stderr = child.stderr.take();
    tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_string(&mut buf).await;
        }
        buf
    })
}

/// Wait for exit within the deadline; a non-zero exit becomes an error
/// carrying stderr.
async fn finish(
    child: &mut Child,
    deadline: Instant,
    stderr_task: tokio::task::JoinHandle<String>,
) -> Result<()> {
    let status = match tokio::time::timeout_at(deadline, child.wait()).await {
        Err(_) => {
            let _ = child.kill().await;
            return Err(Error::Timeout("codex did not exit before its deadline".into()));
        }
        Ok(result) => result.map_err(Error::Io)?,
    };

    if status.success() {
        return Ok(());
    }
    let stderr = stderr_task.await.unwrap_or_default();
    let detail = stderr.trim();
    Err(Error::Subprocess(if detail.is_empty() {
        format!("codex_cli_failed ({status})")
    } else {
        detail.to_owned()
    }))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSONL parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Text of an `item.completed` / `agent_message` event.  Anything else,
/// including non-JSON lines, yields `None`.
pub(crate) fn parse_agent_message(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let v: Value = serde_json::from_str(line).ok()?;
    if v.get("type")?.as_str()? != "item.completed" {
        return None;
    }
    let item = v.get("item")?;
    if item.get("type")?.as_str()? != "agent_message" {
        return None;
    }
    item.get("text")?
        .as_str()
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

/// Split `text` into pieces of at most `size` characters.
pub(crate) fn rechunk(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl AnswerProvider for CodexCliProvider {
    async fn stream_answer(&self, req: AnswerRequest) -> Result<FragmentStream> {
        let mut child = self.spawn(&prompt::answer_prompt(&req))?;
        let stdout = take_stdout(&mut child)?;
        let stderr_task = drain_stderr(&mut child);

        let deadline = Instant::now() + self.timeout;
        let timeout = self.timeout;
        let chunk_size = self.chunk_size;
        let chunk_delay = self.chunk_delay;

        tracing::debug!(bin = %self.bin, "codex answer started");

        let stream = async_stream::stream! {
            let mut child = child;
            let mut lines = BufReader::new(stdout).lines();
            let mut failed = false;

            loop {
                match tokio::time::timeout_at(deadline, lines.next_line()).await {
                    Err(_) => {
                        let _ = child.kill().await;
                        yield Err(Error::Timeout(format!("codex exceeded {timeout:?}")));
                        failed = true;
                        break;
                    }
                    Ok(Err(e)) => {
                        let _ = child.kill().await;
                        yield Err(Error::Io(e));
                        failed = true;
                        break;
                    }
                    Ok(Ok(None)) => break,
                    Ok(Ok(Some(line))) => {
                        let Some(text) = parse_agent_message(&line) else {
                            continue;
                        };
                        for chunk in rechunk(&text, chunk_size) {
                            yield Ok(chunk);
                            if !chunk_delay.is_zero() {
                                tokio::time::sleep(chunk_delay).await;
                            }
                        }
                    }
                }
            }

            if !failed {
                if let Err(e) = finish(&mut child, deadline, stderr_task).await {
                    yield Err(e);
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_id(&self) -> &str {
        "codex"
    }
}

#[async_trait::async_trait]
impl DecisionProvider for CodexCliProvider {
    async fn decide(&self, prompt: &str) -> Result<String> {
        self.run(prompt).await
    }

    fn provider_id(&self) -> &str {
        "codex"
    }
}
