//! Codex CLI Agent Spawner (C3): launches one worker sub-process per `spawn`
//! call, streams its JSONL stdout, and enforces the SIGTERM→SIGKILL timeout
//! escalation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::agent_registry::AgentRegistry;
use crate::application::prompt_assembler::PromptAssembler;
use crate::domain::error::SpawnError;
use crate::domain::errors::OrchestratorResult;
use crate::domain::models::{OrchestratorConfig, SpawnedWorker, WorkerStatus};
use crate::domain::ports::{AgentSpawner, ProcessEnvironment};

use super::process_environment::write_temp_file;

/// Native-shell argv budget past which the prompt is relayed through a temp
/// file and a scripting host instead of the command line.
const ARGV_BYTE_BUDGET: usize = 8 * 1024;

/// Tail-truncation bound for the stderr accumulator.
const STDERR_CAP_BYTES: usize = 64 * 1024;

const FIXED_ARGS: &[&str] = &["exec", "--full-auto", "--json", "--sandbox", "danger-full-access"];

enum TerminalOutcome {
    Exited(std::process::ExitStatus),
    TimedOut,
    SpawnError(String),
}

pub struct CodexCliSpawner {
    config: Arc<OrchestratorConfig>,
    process_env: Arc<dyn ProcessEnvironment>,
    registry: Arc<AgentRegistry>,
    prompt_assembler: Arc<PromptAssembler>,
    running: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl CodexCliSpawner {
    pub fn new(
        config: Arc<OrchestratorConfig>,
        process_env: Arc<dyn ProcessEnvironment>,
        registry: Arc<AgentRegistry>,
        prompt_assembler: Arc<PromptAssembler>,
    ) -> Self {
        Self {
            config,
            process_env,
            registry,
            prompt_assembler,
            running: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve_api_key(&self) -> Result<String, SpawnError> {
        if let Some(key) = self.process_env.env_var(&self.config.api_key_env_var) {
            return Ok(key);
        }
        if let Some(key) = self.process_env.read_credential_file().await {
            return Ok(key);
        }
        Err(SpawnError::MissingCredential(self.config.api_key_env_var.clone()))
    }

    /// Resolves the worker binary and assembles its argv, relaying the
    /// prompt via a temp file + scripting host when it would overflow the
    /// native shell's argv budget.
    async fn assemble_invocation(
        &self,
        worker_id: Uuid,
        prompt: &str,
    ) -> Result<(String, Vec<String>, Option<PathBuf>), SpawnError> {
        let approval_configured = self.config.codex_args.iter().any(|a| a == "--ask-for-approval");
        let mut base_args: Vec<String> = FIXED_ARGS.iter().map(|s| s.to_string()).collect();
        base_args.extend(self.config.codex_args.iter().cloned());
        if !approval_configured {
            base_args.push("--ask-for-approval".to_string());
            base_args.push("never".to_string());
        }

        let (worker_command, mut worker_args) = self.resolve_worker_command(base_args).await;

        let argv_bytes: usize = worker_args.iter().map(|a| a.len() + 1).sum::<usize>() + prompt.len();

        if argv_bytes <= ARGV_BYTE_BUDGET {
            worker_args.push(prompt.to_string());
            return Ok((worker_command, worker_args, None));
        }

        let filename = format!("sce-prompt-{}.txt", sanitize_filename(&worker_id.to_string()));
        let tmp_path = write_temp_file(&self.process_env.temp_dir(), &filename, prompt)
            .await
            .map_err(|e| SpawnError::TempFileFailed(e.to_string()))?;

        let (host_command, host_args) = scripting_host_invocation(&worker_command, &worker_args, &tmp_path);
        Ok((host_command, host_args, Some(tmp_path)))
    }

    async fn resolve_worker_command(&self, args: Vec<String>) -> (String, Vec<String>) {
        if let Some(command) = &self.config.codex_command {
            return (command.clone(), args);
        }
        if let Some(path) = self.process_env.probe_command("codex").await {
            return (path.display().to_string(), args);
        }
        // Package-runner fallback.
        let mut npx_args = vec!["codex".to_string()];
        npx_args.extend(args);
        ("npx".to_string(), npx_args)
    }

    async fn cleanup(&self, worker_id: Uuid, prompt_tmp_file: &Option<PathBuf>) {
        self.running.lock().await.remove(&worker_id);
        self.registry.deregister(worker_id).await;
        if let Some(path) = prompt_tmp_file {
            if let Err(err) = tokio::fs::remove_file(path).await {
                tracing::debug!(path = %path.display(), error = %err, "prompt temp file cleanup failed");
            }
        }
    }

    /// Graceful-terminate escalating to force-kill after 5 s, bounded overall
    /// by a 10 s safety resolver.
    async fn terminate_escalating(child: &mut Child) {
        send_signal(child.id(), Signal::Term);
        if tokio::time::timeout(Duration::from_secs(5), child.wait()).await.is_err() {
            send_signal(child.id(), Signal::Kill);
            let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
        }
    }
}

#[async_trait]
impl AgentSpawner for CodexCliSpawner {
    async fn spawn(&self, spec_name: &str) -> OrchestratorResult<SpawnedWorker> {
        let api_key = self.resolve_api_key().await?;
        let prompt = self
            .prompt_assembler
            .build_prompt(spec_name)
            .await
            .map_err(|_| SpawnError::EmptyPrompt(spec_name.to_string()))?;

        let worker_id = self.registry.register(spec_name).await;
        let (command, args, prompt_tmp_file) = match self.assemble_invocation(worker_id, &prompt).await {
            Ok(resolved) => resolved,
            Err(err) => {
                self.cleanup(worker_id, &None).await;
                return Err(err.into());
            }
        };

        let mut worker = SpawnedWorker::new(spec_name, prompt_tmp_file.clone());
        worker.worker_id = worker_id;

        let mut command_builder = Command::new(&command);
        command_builder
            .args(&args)
            .current_dir(&self.config.workspace_root)
            .env(&self.config.api_key_env_var, &api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command_builder.spawn() {
            Ok(child) => child,
            Err(err) => {
                worker.status = WorkerStatus::Failed;
                worker.stderr_buffer = format!("failed to spawn worker process: {err}");
                worker.completed_at = Some(Utc::now());
                self.cleanup(worker_id, &prompt_tmp_file).await;
                tracing::warn!(spec_name, error = %err, "worker spawn failed");
                return Ok(worker);
            }
        };

        let cancel = CancellationToken::new();
        self.running.lock().await.insert(worker_id, cancel.clone());

        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_for_task = Arc::clone(&events);
        let stdout_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&line) {
                    events_for_task.lock().await.push(value);
                }
            }
        });

        let stderr_buffer = Arc::new(Mutex::new(String::new()));
        let stderr_buffer_for_task = Arc::clone(&stderr_buffer);
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let mut buf = stderr_buffer_for_task.lock().await;
                buf.push_str(&line);
                buf.push('\n');
                truncate_tail(&mut buf, STDERR_CAP_BYTES);
            }
        });

        let timeout_duration = Duration::from_secs(self.config.timeout_seconds.max(1));

        let outcome = tokio::select! {
            () = cancel.cancelled() => {
                Self::terminate_escalating(&mut child).await;
                match child.wait().await {
                    Ok(status) => TerminalOutcome::Exited(status),
                    Err(err) => TerminalOutcome::SpawnError(err.to_string()),
                }
            }
            () = tokio::time::sleep(timeout_duration) => {
                Self::terminate_escalating(&mut child).await;
                let _ = child.wait().await;
                TerminalOutcome::TimedOut
            }
            status = child.wait() => {
                match status {
                    Ok(status) => TerminalOutcome::Exited(status),
                    Err(err) => TerminalOutcome::SpawnError(err.to_string()),
                }
            }
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        worker.events = Arc::try_unwrap(events).map(Mutex::into_inner).unwrap_or_default();
        worker.stderr_buffer = Arc::try_unwrap(stderr_buffer).map(Mutex::into_inner).unwrap_or_default();
        worker.completed_at = Some(Utc::now());

        worker.status = match outcome {
            TerminalOutcome::TimedOut => WorkerStatus::Timeout,
            TerminalOutcome::Exited(status) => {
                worker.exit_code = status.code();
                if status.success() {
                    WorkerStatus::Completed
                } else {
                    WorkerStatus::Failed
                }
            }
            TerminalOutcome::SpawnError(message) => {
                worker.stderr_buffer.push_str(&message);
                WorkerStatus::Failed
            }
        };

        tracing::info!(spec_name, %worker_id, status = ?worker.status, "worker reached terminal state");
        self.cleanup(worker_id, &prompt_tmp_file).await;
        Ok(worker)
    }

    async fn kill(&self, worker_id: Uuid) -> OrchestratorResult<()> {
        if let Some(token) = self.running.lock().await.get(&worker_id) {
            token.cancel();
        }
        Ok(())
    }

    async fn kill_all(&self) -> OrchestratorResult<()> {
        let tokens: Vec<CancellationToken> = self.running.lock().await.values().cloned().collect();
        for token in tokens {
            token.cancel();
        }
        Ok(())
    }

    fn get_result_summary(&self, worker: &SpawnedWorker) -> Option<serde_json::Value> {
        extract_result_summary(&worker.events)
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: Option<u32>, signal: Signal) {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let nix_signal = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    if let Err(err) = signal::kill(Pid::from_raw(pid as i32), nix_signal) {
        tracing::debug!(pid, error = %err, "signal delivery failed, process likely already exited");
    }
}

#[cfg(not(unix))]
fn send_signal(_pid: Option<u32>, _signal: Signal) {
    // Non-unix targets have no graceful-terminate primitive here; the
    // subsequent `child.wait()`/timeout path still forces termination.
}

fn sanitize_filename(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Builds the scripting-host command that reads the prompt from `tmp_path`
/// as UTF-8 and invokes the worker with it as the final positional argument
/// the cross-platform argv length workaround.
fn scripting_host_invocation(worker_command: &str, worker_args: &[String], tmp_path: &std::path::Path) -> (String, Vec<String>) {
    let path_display = tmp_path.display().to_string();
    if cfg!(windows) {
        let quoted_args: Vec<String> = worker_args.iter().map(|a| format!("'{}'", a.replace('\'', "''"))).collect();
        let script = format!(
            "$prompt = Get-Content -Raw -Encoding UTF8 '{path}'; & '{cmd}' {args} $prompt",
            path = path_display,
            cmd = worker_command,
            args = quoted_args.join(" "),
        );
        ("powershell".to_string(), vec!["-NoProfile".to_string(), "-Command".to_string(), script])
    } else {
        let quoted_args: Vec<String> = worker_args.iter().map(|a| shell_quote(a)).collect();
        let script = format!(
            "prompt=\"$(cat {path})\"; exec {cmd} {args} \"$prompt\"",
            path = shell_quote(&path_display),
            cmd = shell_quote(worker_command),
            args = quoted_args.join(" "),
        );
        ("sh".to_string(), vec!["-c".to_string(), script])
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

fn truncate_tail(buf: &mut String, cap: usize) {
    if buf.len() <= cap {
        return;
    }
    let start = buf.len() - cap;
    let boundary = (start..buf.len()).find(|&i| buf.is_char_boundary(i)).unwrap_or(start);
    *buf = buf[boundary..].to_string();
}

/// Ordered extraction pipeline over the candidate summary locations named in
/// The event itself, `result_summary`/`summary`/`result.summary`,
/// `payload`/`data`/`item` and their immediate fields, plus JSON fragments
/// embedded in free-text fields (including fenced code blocks). The
/// candidate with the most contract fields wins; first-seen wins ties.
fn extract_result_summary(events: &[serde_json::Value]) -> Option<serde_json::Value> {
    let mut best: Option<(usize, serde_json::Value)> = None;
    for event in events {
        for candidate in collect_candidates(event) {
            let score = summary_field_count(&candidate);
            if score == 0 {
                continue;
            }
            let better = best.as_ref().is_none_or(|(best_score, _)| score > *best_score);
            if better {
                best = Some((score, candidate));
            }
        }
    }
    best.map(|(_, value)| value)
}

fn summary_field_count(value: &serde_json::Value) -> usize {
    SpawnedWorker::SUMMARY_FIELDS.iter().filter(|field| value.get(**field).is_some()).count()
}

fn collect_candidates(event: &serde_json::Value) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    if event.is_object() {
        out.push(event.clone());
    }
    let serde_json::Value::Object(map) = event else {
        return out;
    };
    for (key, value) in map {
        match key.as_str() {
            "result_summary" | "summary" | "payload" | "data" | "item" => {
                out.push(value.clone());
                if let serde_json::Value::Object(inner) = value {
                    out.extend(inner.values().cloned());
                }
            }
            "result" => {
                if let Some(summary) = value.get("summary") {
                    out.push(summary.clone());
                }
            }
            _ => {}
        }
        if let serde_json::Value::String(text) = value {
            out.extend(extract_json_fragments(text));
        }
    }
    out
}

fn extract_json_fragments(text: &str) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    for block in fenced_code_blocks(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            out.push(value);
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[start..=end]) {
                out.push(value);
            }
        }
    }
    out
}

fn fenced_code_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
        let body = &after_fence[body_start..];
        let Some(end) = body.find("```") else { break };
        blocks.push(&body[..end]);
        rest = &body[end + 3..];
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_extraction_prefers_candidate_with_most_fields() {
        let events = vec![
            json!({"note": "hello"}),
            json!({"result_summary": {"spec_id": "01-01-a", "tests_run": 3}}),
            json!({"payload": {"spec_id": "01-01-a"}}),
        ];
        let summary = extract_result_summary(&events).unwrap();
        assert_eq!(summary["tests_run"], 3);
    }

    #[test]
    fn summary_extraction_returns_none_without_contract_fields() {
        let events = vec![json!({"note": "nothing relevant here"})];
        assert!(extract_result_summary(&events).is_none());
    }

    #[test]
    fn summary_extraction_parses_fenced_json_in_free_text() {
        let events = vec![json!({
            "message": "done\n```json\n{\"spec_id\": \"01-01-a\", \"risk_level\": \"low\"}\n```"
        })];
        let summary = extract_result_summary(&events).unwrap();
        assert_eq!(summary["risk_level"], "low");
    }

    #[test]
    fn sanitize_filename_strips_reserved_characters() {
        assert_eq!(sanitize_filename("ab:cd/ef"), "ab_cd_ef");
    }

    #[test]
    fn argv_byte_budget_triggers_temp_file_dispatch_threshold() {
        let args: Vec<String> = vec!["a".repeat(ARGV_BYTE_BUDGET)];
        let size: usize = args.iter().map(|a| a.len() + 1).sum();
        assert!(size > ARGV_BYTE_BUDGET);
    }
}
