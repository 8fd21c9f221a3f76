use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, timeout};

use crate::constants::OUTPUT_DRAIN_GRACE;
use crate::core::traits::invoker::{CommandSpec, InvokeError, ProcessInvoker, ProcessOutput};

/// Runs toolchain commands as local child processes.
///
/// Every child leads its own process group so a timeout can take down
/// anything it forked along with it.
#[derive(Clone, Debug)]
pub struct NativeInvoker {
    max_output_bytes: usize,
}

impl NativeInvoker {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }
}

#[async_trait::async_trait]
impl ProcessInvoker for NativeInvoker {
    #[tracing::instrument(skip(self, stdin))]
    async fn run(
        &self,
        command: &CommandSpec,
        working_dir: &Path,
        stdin: &[u8],
        limit: Duration,
    ) -> Result<ProcessOutput, InvokeError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let start_time = Instant::now();
        let mut child = cmd.spawn().map_err(|e| InvokeError::Spawn {
            program: command.program.display().to_string(),
            msg: e.to_string(),
        })?;
        let pid = child.id();

        let stdin_task = child.stdin.take().map(|mut handle| {
            let input = stdin.to_vec();
            tokio::spawn(async move {
                if let Err(e) = handle.write_all(&input).await {
                    // The program is free to exit without reading its input
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        tracing::debug!("Failed to write to stdin: {}", e);
                    }
                }
            })
        });
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(read_bounded(out, self.max_output_bytes)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(read_bounded(err, self.max_output_bytes)));

        let waited = timeout(limit, child.wait()).await;
        let (status, timed_out) = match waited {
            Ok(status) => {
                let status = status.map_err(|e| InvokeError::Wait { msg: e.to_string() })?;
                // Background descendants would otherwise keep the output pipes open
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                (Some(status), false)
            }
            Err(_) => {
                tracing::debug!("Process {:?} timed out after {:?}", pid, limit);
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                // Reap the direct child; the group kill already took care of descendants
                let _ = child.kill().await;
                (None, true)
            }
        };
        let duration = start_time.elapsed();

        if let Some(task) = stdin_task {
            task.abort();
        }
        let (stdout, stdout_truncated) = collect(stdout_task).await;
        let (stderr, stderr_truncated) = collect(stderr_task).await;

        Ok(ProcessOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            duration,
            timed_out,
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

fn kill_process_group(pid: u32) {
    let Ok(raw) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        // ESRCH: the whole group already exited
        if e != nix::errno::Errno::ESRCH {
            tracing::warn!("Failed to kill process group {}: {}", raw, e);
        }
    }
}

/// Reads up to `limit` bytes and drains the rest so the writer never blocks.
async fn read_bounded<R>(mut reader: R, limit: usize) -> (Vec<u8>, bool)
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Err(e) = (&mut reader).take(limit as u64).read_to_end(&mut buf).await {
        tracing::debug!("Failed to read process output: {}", e);
        return (buf, false);
    }
    let dropped = tokio::io::copy(&mut reader, &mut tokio::io::sink())
        .await
        .unwrap_or(0);
    (buf, dropped > 0)
}

async fn collect(task: Option<JoinHandle<(Vec<u8>, bool)>>) -> (String, bool) {
    let Some(mut task) = task else {
        return (String::new(), false);
    };
    // A descendant that left the process group can keep the pipe open forever
    match timeout(OUTPUT_DRAIN_GRACE, &mut task).await {
        Ok(Ok((bytes, truncated))) => (String::from_utf8_lossy(&bytes).into_owned(), truncated),
        Ok(Err(e)) => {
            tracing::warn!("Output reader failed: {}", e);
            (String::new(), false)
        }
        Err(_) => {
            task.abort();
            tracing::warn!("Gave up waiting for process output after {:?}", OUTPUT_DRAIN_GRACE);
            (String::new(), true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    fn invoker() -> NativeInvoker {
        NativeInvoker::new(1024 * 1024)
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let dir = tempdir().unwrap();
        let out = invoker()
            .run(&sh("printf hello"), dir.path(), b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(0));
        assert_eq!(out.stdout, "hello");
        assert!(out.stderr.is_empty());
        assert!(!out.timed_out);
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_passes_stdin_through_unchanged() {
        let dir = tempdir().unwrap();
        let input = b"line one\n  line two\r\n\n";
        let out = invoker()
            .run(&CommandSpec::new("cat"), dir.path(), input, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(out.stdout.as_bytes(), input);
    }

    #[tokio::test]
    async fn test_ignores_unread_stdin() {
        let dir = tempdir().unwrap();
        let input = vec![b'x'; 1024 * 1024];
        let out = invoker()
            .run(&sh("exit 0"), dir.path(), &input, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(out.success());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_a_timeout() {
        let dir = tempdir().unwrap();
        let out = invoker()
            .run(&sh("echo boom >&2; exit 3"), dir.path(), b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr, "boom\n");
        assert!(!out.timed_out);
        assert!(!out.success());
    }

    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempdir().unwrap();
        invoker()
            .run(&sh("echo data > made.txt"), dir.path(), b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(dir.path().join("made.txt").exists());
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let dir = tempdir().unwrap();
        let started = std::time::Instant::now();
        let out = invoker()
            .run(&sh("sleep 30"), dir.path(), b"", Duration::from_millis(300))
            .await
            .unwrap();

        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(!out.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_kills_grandchildren() {
        let dir = tempdir().unwrap();
        let out = invoker()
            .run(
                &sh("sleep 30 & echo $! > child.pid; wait"),
                dir.path(),
                b"",
                Duration::from_millis(500),
            )
            .await
            .unwrap();
        assert!(out.timed_out);

        let pid = std::fs::read_to_string(dir.path().join("child.pid")).unwrap();
        let pid = pid.trim();

        // The grandchild is either gone or a zombie waiting to be reaped
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        let alive = loop {
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid));
            let running = match stat {
                Ok(stat) => !stat.contains(") Z "),
                Err(_) => false,
            };
            if !running || std::time::Instant::now() > deadline {
                break running;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        };
        assert!(!alive, "grandchild {} survived the timeout", pid);
    }

    #[tokio::test]
    async fn test_clean_exit_reaps_background_children() {
        let dir = tempdir().unwrap();
        let started = std::time::Instant::now();
        let out = invoker()
            .run(&sh("sleep 30 & echo done"), dir.path(), b"", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(out.success());
        assert_eq!(out.stdout, "done\n");
        assert!(!out.truncated);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_output_is_bounded() {
        let dir = tempdir().unwrap();
        let out = NativeInvoker::new(16)
            .run(
                &sh("head -c 100000 /dev/zero | tr '\\0' a"),
                dir.path(),
                b"",
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(out.stdout.len(), 16);
        assert!(out.truncated);
        assert!(out.success());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = tempdir().unwrap();
        let result = invoker()
            .run(
                &CommandSpec::new("/nonexistent/compiler"),
                dir.path(),
                b"",
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(result, Err(InvokeError::Spawn { .. })));
    }
}
