// src/executors/process.rs
use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::{Builder, TempPath};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::process_group::{sweep_group, terminate_group};
use super::{format_seconds, CodeExecutor, ExecutionResult};
use crate::config::SandboxConfig;
use crate::errors::ExecutorError;

/// Runs each submission as `<interpreter> <tempfile>` in a fresh process group.
///
/// The script lives in a uniquely named file under the execution directory
/// for exactly the duration of one call. On timeout the whole group gets
/// SIGTERM, then SIGKILL after the kill grace period; after a normal exit the
/// group is swept with SIGKILL so background descendants die with the request.
pub struct ProcessCodeExecutor {
    config: SandboxConfig,
}

impl ProcessCodeExecutor {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn prepare_script(&self, code: &str) -> Result<TempPath, ExecutorError> {
        let dir = &self.config.execution_dir;
        fs::create_dir_all(dir)
            .await
            .map_err(|source| ExecutorError::ExecutionDir {
                path: dir.display().to_string(),
                source,
            })?;

        let named = Builder::new()
            .prefix("exec-")
            .suffix(".py")
            .tempfile_in(dir)
            .map_err(ExecutorError::TempFile)?;
        let (file, path) = named.into_parts();

        let mut file = fs::File::from_std(file);
        file.write_all(code.as_bytes()).await?;
        file.flush().await?;
        Ok(path)
    }

    async fn run(&self, script: &Path, timeout: f64) -> Result<ExecutionResult, ExecutorError> {
        let budget = Duration::try_from_secs_f64(timeout).map_err(|_| ExecutorError::InvalidTimeout(timeout))?;
        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            interpreter: self.config.interpreter.clone(),
            source,
        })?;
        let pgid = child.id();
        log::debug!("Spawned {} for {} (pid {:?})", self.config.interpreter, script.display(), pgid);

        let mut stdout_task = spawn_capture(child.stdout.take(), self.config.max_output_bytes);
        let mut stderr_task = spawn_capture(child.stderr.take(), self.config.max_output_bytes);
        let grace = self.config.kill_grace();

        match tokio::time::timeout(budget, child.wait()).await {
            Ok(Ok(status)) => {
                let elapsed = start.elapsed().as_secs_f64();
                if let Some(pgid) = pgid {
                    sweep_group(pgid);
                }
                let stdout = collect_output(&mut stdout_task, grace).await;
                let stderr = collect_output(&mut stderr_task, grace).await;

                if status.success() {
                    log::info!("Execution succeeded in {:.3}s", elapsed);
                    Ok(ExecutionResult::succeeded(stdout, elapsed))
                } else {
                    log::info!("Execution failed in {:.3}s: {}", elapsed, status);
                    let error = if stderr.trim().is_empty() {
                        describe_status(status)
                    } else {
                        stderr
                    };
                    Ok(ExecutionResult::failed(error, elapsed))
                }
            }
            Ok(Err(e)) => {
                terminate_group(&mut child, grace).await;
                stdout_task.abort();
                stderr_task.abort();
                Err(ExecutorError::Wait(e.to_string()))
            }
            Err(_) => {
                log::warn!(
                    "Execution timed out after {} seconds, terminating process group {:?}",
                    format_seconds(timeout),
                    pgid
                );
                terminate_group(&mut child, grace).await;
                stdout_task.abort();
                stderr_task.abort();
                log::debug!("Timed-out execution torn down after {:?}", start.elapsed());
                Ok(ExecutionResult::timed_out(timeout))
            }
        }
    }
}

#[async_trait]
impl CodeExecutor for ProcessCodeExecutor {
    async fn execute(&self, code: &str, timeout: f64) -> ExecutionResult {
        let timeout = self.config.effective_timeout(timeout);
        log::info!(
            "Executing {} bytes of code with {} (timeout {}s)",
            code.len(),
            self.config.interpreter,
            format_seconds(timeout)
        );

        let script = match self.prepare_script(code).await {
            Ok(script) => script,
            Err(e) => {
                log::error!("Could not prepare script: {}", e);
                return ExecutionResult::launch_failure(e.to_string());
            }
        };

        let result = match self.run(&script, timeout).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Execution could not run: {}", e);
                ExecutionResult::launch_failure(e.to_string())
            }
        };

        let script_path = script.to_path_buf();
        if let Err(e) = script.close() {
            log::warn!("Failed to remove {}: {}", script_path.display(), e);
        }
        result
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Reads a child stream to EOF, keeping at most `max_bytes`. Reading continues
/// past the cap so the child never blocks on a full pipe.
fn spawn_capture<R>(stream: Option<R>, max_bytes: usize) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut captured = Vec::new();
        let Some(mut stream) = stream else {
            return captured;
        };

        let mut buf = [0u8; 8192];
        let mut truncated = false;
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let room = max_bytes.saturating_sub(captured.len());
                    captured.extend_from_slice(&buf[..n.min(room)]);
                    if n > room {
                        truncated = true;
                    }
                }
                Err(e) => {
                    log::debug!("Stopped reading child output: {}", e);
                    break;
                }
            }
        }

        if truncated {
            captured.extend_from_slice(format!("\n[output truncated at {} bytes]\n", max_bytes).as_bytes());
        }
        captured
    })
}

async fn collect_output(task: &mut JoinHandle<Vec<u8>>, grace: Duration) -> String {
    match tokio::time::timeout(grace, &mut *task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            log::error!("Output reader failed: {}", e);
            String::new()
        }
        Err(_) => {
            // A descendant outside the group still holds the pipe open
            log::warn!("Output stream still open {:?} after exit, discarding", grace);
            task.abort();
            String::new()
        }
    }
}

fn describe_status(status: ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("Process terminated by signal {}", signal);
        }
    }
    match status.code() {
        Some(code) => format!("Process exited with status {}", code),
        None => "Process exited abnormally".to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sh_executor(scratch: &TempDir) -> ProcessCodeExecutor {
        ProcessCodeExecutor::new(SandboxConfig {
            execution_dir: scratch.path().join("executions"),
            interpreter: "/bin/sh".to_string(),
            kill_grace_ms: 200,
            ..SandboxConfig::default()
        })
    }

    fn leftover_files(executor: &ProcessCodeExecutor) -> Vec<PathBuf> {
        match std::fs::read_dir(&executor.config().execution_dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_dead(pid: u32) -> bool {
        for _ in 0..40 {
            match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Err(_) => return true,
                Ok(stat) => {
                    // Field 3 is the state; a zombie is already dead
                    let state = stat.rsplit(')').next().and_then(|rest| rest.split_whitespace().next());
                    if state == Some("Z") {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_successful_execution_captures_stdout() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);

        let result = executor.execute("echo hello", 5.0).await;

        assert!(result.success, "unexpected failure: {:?}", result);
        assert_eq!(result.output, "hello\n");
        assert_eq!(result.error, None);
        assert!(result.execution_time > 0.0 && result.execution_time < 5.0);
        assert!(leftover_files(&executor).is_empty());
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr_only() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);

        let result = executor.execute("echo partial; echo boom >&2; exit 3", 5.0).await;

        assert!(!result.success);
        assert_eq!(result.output, "");
        assert_eq!(result.error.as_deref(), Some("boom\n"));
        assert!(leftover_files(&executor).is_empty());
    }

    #[tokio::test]
    async fn test_silent_failure_gets_synthesized_error() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);

        let result = executor.execute("exit 4", 5.0).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Process exited with status 4"));
    }

    #[tokio::test]
    async fn test_timeout_is_bounded_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);

        let started = Instant::now();
        let result = executor.execute("echo before; sleep 10", 0.5).await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
        assert!(!result.success);
        assert_eq!(result.output, "");
        assert_eq!(result.error.as_deref(), Some("Execution timed out after 0.5 seconds"));
        assert_eq!(result.execution_time, 0.5);
        assert!(leftover_files(&executor).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_clamped_to_ceiling() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = ProcessCodeExecutor::new(SandboxConfig {
            max_timeout_seconds: 0.5,
            ..sh_executor(&scratch).config().clone()
        });

        let started = Instant::now();
        let result = executor.execute("sleep 10", 60.0).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.error.as_deref(), Some("Execution timed out after 0.5 seconds"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_launch_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = ProcessCodeExecutor::new(SandboxConfig {
            interpreter: "/nonexistent/bin/python".to_string(),
            ..sh_executor(&scratch).config().clone()
        });

        let result = executor.execute("print('hi')", 5.0).await;

        assert!(!result.success);
        assert_eq!(result.output, "");
        assert_eq!(result.execution_time, 0.0);
        assert!(result
            .error_text()
            .starts_with("Failed to launch interpreter '/nonexistent/bin/python'"));
        assert!(leftover_files(&executor).is_empty());
    }

    #[tokio::test]
    async fn test_unwritable_execution_dir_is_launch_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let blocker = scratch.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let executor = ProcessCodeExecutor::new(SandboxConfig {
            execution_dir: blocker.join("executions"),
            ..sh_executor(&scratch).config().clone()
        });

        let result = executor.execute("echo hi", 5.0).await;

        assert!(!result.success);
        assert_eq!(result.execution_time, 0.0);
        assert!(result.error_text().contains("Could not prepare execution directory"));
    }

    #[tokio::test]
    async fn test_unrepresentable_timeout_is_a_failed_result() {
        let scratch = tempfile::tempdir().unwrap();

        for ceiling in [1e20, -1.0] {
            let executor = ProcessCodeExecutor::new(SandboxConfig {
                max_timeout_seconds: ceiling,
                ..sh_executor(&scratch).config().clone()
            });

            let result = executor.execute("echo hi", 1e20).await;

            assert!(!result.success);
            assert_eq!(result.output, "");
            assert_eq!(result.execution_time, 0.0);
            assert!(result.error_text().starts_with("Invalid execution timeout"), "{:?}", result);
            assert!(leftover_files(&executor).is_empty());
        }
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = ProcessCodeExecutor::new(SandboxConfig {
            max_output_bytes: 16,
            ..sh_executor(&scratch).config().clone()
        });

        let result = executor.execute("printf '%0100d' 0", 5.0).await;

        assert!(result.success);
        assert!(result.output.starts_with("0000000000000000\n"));
        assert!(result.output.contains("[output truncated at 16 bytes]"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_do_not_collide() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = Arc::new(sh_executor(&scratch));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let executor = executor.clone();
                tokio::spawn(async move { (i, executor.execute(&format!("echo run-{}", i), 5.0).await) })
            })
            .collect();

        for handle in handles {
            let (i, result) = handle.await.unwrap();
            assert!(result.success);
            assert_eq!(result.output, format!("run-{}\n", i));
        }
        assert!(leftover_files(&executor).is_empty());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_whole_process_group() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);
        let pid_file = scratch.path().join("descendant.pid");

        let code = format!("sleep 30 &\necho $! > {}\nwait\n", pid_file.display());
        let result = executor.execute(&code, 0.5).await;
        assert!(!result.success);

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(wait_until_dead(pid).await, "descendant {} survived the timeout", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_background_descendant_does_not_outlive_request() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);
        let pid_file = scratch.path().join("background.pid");

        let code = format!("sleep 30 &\necho $! > {}\necho done\n", pid_file.display());
        let started = Instant::now();
        let result = executor.execute(&code, 5.0).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(result.success);
        assert_eq!(result.output, "done\n");

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(wait_until_dead(pid).await, "background process {} survived", pid);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_group_ignoring_sigterm_is_killed() {
        let scratch = tempfile::tempdir().unwrap();
        let executor = sh_executor(&scratch);
        let pid_file = scratch.path().join("stubborn.pid");

        let code = format!(
            "trap '' TERM\nsleep 30 &\necho $! > {}\nwhile :; do sleep 0.1; done\n",
            pid_file.display()
        );
        let started = Instant::now();
        let result = executor.execute(&code, 0.5).await;

        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
        assert_eq!(result.error.as_deref(), Some("Execution timed out after 0.5 seconds"));
        assert!(leftover_files(&executor).is_empty());

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(wait_until_dead(pid).await, "descendant {} ignored the kill", pid);
    }
}
