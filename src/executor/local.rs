use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use uuid::Uuid;

use crate::constants::{DEFAULT_CAPTURE_LIMIT_BYTES, WATCHDOG_POLL_INTERVAL};
use crate::domain::{ExecutionLimits, HarnessSource, Language, RawResult};
use crate::errors::LaunchError;
use crate::executor::{Sandbox, parse_markers};

/// Capability-scoped description of how submissions run: scratch space,
/// toolchain commands, capture ceilings, isolation flags. Constructed once
/// and injected into [`LocalSandbox`].
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub scratch_root: PathBuf,
    pub python_cmd: Vec<String>,
    pub typescript_cmd: Vec<String>,
    pub capture_limit_bytes: usize,
    pub poll_interval: Duration,
    /// Best-effort in this tier: honored via `unshare -r -n` when available.
    pub deny_network: bool,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext {
            scratch_root: std::env::temp_dir().join("codegrader"),
            python_cmd: vec!["python3".to_string()],
            typescript_cmd: vec!["npx".to_string(), "--yes".to_string(), "tsx".to_string()],
            capture_limit_bytes: DEFAULT_CAPTURE_LIMIT_BYTES,
            poll_interval: WATCHDOG_POLL_INTERVAL,
            deny_network: true,
        }
    }
}

/// Process-based sandbox: each run gets a disposable private directory, a
/// cleared environment, its own process group and a watchdog that kills the
/// whole tree at the wall-clock limit.
///
/// Memory limiting is advisory: the watchdog polls the child's resident set
/// and kills on breach. There is no kernel-level cgroup in this tier.
#[derive(Debug)]
pub struct LocalSandbox {
    ctx: ExecutionContext,
    unshare: Option<PathBuf>,
}

impl LocalSandbox {
    pub fn new(ctx: ExecutionContext) -> Self {
        let unshare = if ctx.deny_network {
            let probed = probe_unshare();
            if probed.is_none() {
                tracing::warn!(
                    "unshare unavailable; running without network isolation in this tier"
                );
            }
            probed
        } else {
            None
        };
        LocalSandbox { ctx, unshare }
    }

    fn toolchain(&self, language: &Language) -> &[String] {
        match language {
            Language::Python => &self.ctx.python_cmd,
            Language::TypeScript => &self.ctx.typescript_cmd,
        }
    }

    async fn run_in(
        &self,
        run_dir: &PathBuf,
        source: &HarnessSource,
        language: &Language,
        stdin: Option<&str>,
        limits: &ExecutionLimits,
    ) -> Result<RawResult, LaunchError> {
        fs::write(run_dir.join(source.file_name), &source.code)
            .await
            .map_err(workspace_err)?;
        if let Some((name, body)) = &source.manifest {
            fs::write(run_dir.join(name), body)
                .await
                .map_err(workspace_err)?;
        }

        let mut argv: Vec<String> = Vec::new();
        if let Some(unshare) = &self.unshare {
            argv.push(unshare.to_string_lossy().into_owned());
            argv.extend(["-r", "-n", "--"].map(str::to_string));
        }
        argv.extend(self.toolchain(language).iter().cloned());
        argv.push(source.file_name.to_string());

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(run_dir)
            .env_clear()
            .env(
                "PATH",
                std::env::var_os("PATH").unwrap_or_else(|| "/usr/local/bin:/usr/bin:/bin".into()),
            )
            .env("HOME", run_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            cmd.process_group(0);
            let wall_secs = limits.time.as_secs();
            unsafe {
                cmd.pre_exec(move || apply_rlimits(wall_secs));
            }
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| LaunchError::Spawn {
            msg: format!("{}: {e}", argv[0]),
        })?;
        let pid = child.id();

        if let Some(input) = stdin {
            if let Some(mut handle) = child.stdin.take() {
                let input = input.to_string();
                // The child may exit without reading; a broken pipe is fine.
                tokio::spawn(async move {
                    let _ = handle.write_all(input.as_bytes()).await;
                    let _ = handle.shutdown().await;
                });
            }
        } else {
            drop(child.stdin.take());
        }

        let cap = self.ctx.capture_limit_bytes;
        let stdout_pipe = child.stdout.take().ok_or_else(|| LaunchError::Spawn {
            msg: "stdout pipe missing".to_string(),
        })?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| LaunchError::Spawn {
            msg: "stderr pipe missing".to_string(),
        })?;
        let stdout_task = tokio::spawn(read_capped(stdout_pipe, cap));
        let stderr_task = tokio::spawn(read_capped(stderr_pipe, cap));

        let (status, timed_out, killed_for_memory) =
            self.supervise(&mut child, pid, limits, start).await?;
        let wall_time = start.elapsed();

        let (stdout_bytes, stdout_truncated) =
            stdout_task.await.unwrap_or_else(|_| (Vec::new(), false));
        let (stderr_bytes, stderr_truncated) =
            stderr_task.await.unwrap_or_else(|_| (Vec::new(), false));

        let stdout = String::from_utf8_lossy(&stdout_bytes).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();
        let markers = parse_markers(&stdout);

        Ok(RawResult {
            exit_code: exit_code_of(&status),
            stdout,
            stderr,
            stdout_truncated,
            stderr_truncated,
            wall_time,
            timed_out,
            killed_for_memory,
            markers,
        })
    }

    /// Watchdog loop: polls for exit, enforces the wall-clock limit and the
    /// advisory memory ceiling. Termination is unconditional; the loop only
    /// sleeps between polls, so a spinning child cannot block it.
    async fn supervise(
        &self,
        child: &mut Child,
        pid: Option<u32>,
        limits: &ExecutionLimits,
        start: Instant,
    ) -> Result<(std::process::ExitStatus, bool, bool), LaunchError> {
        let mut timed_out = false;
        let mut killed_for_memory = false;
        let status = loop {
            if let Some(status) = child.try_wait().map_err(|e| LaunchError::Wait {
                msg: e.to_string(),
            })? {
                break status;
            }
            if !timed_out && !killed_for_memory {
                if start.elapsed() >= limits.time {
                    timed_out = true;
                    tracing::debug!(?pid, "wall-clock limit hit, killing process tree");
                    kill_tree(pid, child);
                } else if let Some(rss) = pid.and_then(probe_rss) {
                    if rss > limits.memory_bytes {
                        killed_for_memory = true;
                        tracing::debug!(?pid, rss, "memory ceiling hit, killing process tree");
                        kill_tree(pid, child);
                    }
                }
            }
            tokio::time::sleep(self.ctx.poll_interval).await;
        };
        Ok((status, timed_out, killed_for_memory))
    }
}

#[async_trait::async_trait]
impl Sandbox for LocalSandbox {
    #[tracing::instrument(skip(self, source, stdin), fields(%language))]
    async fn execute<'a>(
        &self,
        source: &HarnessSource,
        language: &Language,
        stdin: Option<&'a str>,
        limits: &ExecutionLimits,
    ) -> Result<RawResult, LaunchError> {
        let run_dir = self
            .ctx
            .scratch_root
            .join(format!("run-{}", Uuid::new_v4()));
        fs::create_dir_all(&run_dir).await.map_err(workspace_err)?;

        let result = self
            .run_in(&run_dir, source, language, stdin, limits)
            .await;

        if let Err(e) = fs::remove_dir_all(&run_dir).await {
            tracing::debug!("failed to remove {}: {e}", run_dir.display());
        }
        result
    }
}

fn workspace_err(e: std::io::Error) -> LaunchError {
    LaunchError::Workspace { msg: e.to_string() }
}

/// Reads a stream to EOF, capturing at most `cap` bytes. Past the ceiling
/// the stream keeps draining so the child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> (Vec<u8>, bool) {
    let mut captured = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if truncated {
                    continue;
                }
                let remaining = cap.saturating_sub(captured.len());
                if n <= remaining {
                    captured.extend_from_slice(&buf[..n]);
                } else {
                    captured.extend_from_slice(&buf[..remaining]);
                    truncated = true;
                }
            }
        }
    }
    (captured, truncated)
}

/// Resident set size in bytes, read from procfs. Advisory only; returns
/// `None` off Linux or when the process is already gone.
#[cfg(target_os = "linux")]
fn probe_rss(pid: u32) -> Option<u64> {
    let statm = std::fs::read_to_string(format!("/proc/{pid}/statm")).ok()?;
    let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn probe_rss(_pid: u32) -> Option<u64> {
    None
}

fn kill_tree(pid: Option<u32>, child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        // The child was spawned as a process group leader; a negative pid
        // signals the whole group, including anything it spawned.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
    let _ = child.start_kill();
}

fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(unix)]
fn apply_rlimits(wall_secs: u64) -> std::io::Result<()> {
    unsafe {
        let core = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if libc::setrlimit(libc::RLIMIT_CORE, &core) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        // CPU backstop one second past the wall limit, in case the watchdog
        // itself is ever delayed.
        let cpu = libc::rlimit {
            rlim_cur: wall_secs.saturating_add(1) as libc::rlim_t,
            rlim_max: wall_secs.saturating_add(2) as libc::rlim_t,
        };
        if libc::setrlimit(libc::RLIMIT_CPU, &cpu) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Network denial needs user+net namespaces; probe whether `unshare` can
/// actually grant them here instead of assuming.
fn probe_unshare() -> Option<PathBuf> {
    let status = std::process::Command::new("unshare")
        .args(["-r", "-n", "true"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .ok()?;
    status.success().then(|| PathBuf::from("unshare"))
}
