//! ffmpeg subprocess management.
//!
//! Runs bounded transcode jobs: spawn ffmpeg with piped stderr, collect
//! diagnostics on a reader thread, enforce a wall-clock timeout, and tear
//! the process down cleanly on Ctrl-C.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default wall-clock limit for a single ffmpeg job.
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Grace period between SIGINT and SIGKILL on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How many trailing stderr lines to keep in error reports.
const STDERR_TAIL_LINES: usize = 12;

/// Errors from running ffmpeg jobs.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("ffmpeg not found. Install it with your package manager (e.g. `apt install ffmpeg` or `brew install ffmpeg`)")]
    FfmpegNotFound,

    #[error("failed to spawn ffmpeg: {0}")]
    SpawnFailed(std::io::Error),

    #[error("ffmpeg exited with code {exit_code:?}\n{stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("ffmpeg job exceeded {0:?} and was killed")]
    Timeout(Duration),

    #[error("ffmpeg job interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Runner for ffmpeg invocations with a fixed per-job timeout.
pub struct Transcoder {
    binary: PathBuf,
    timeout: Duration,
}

impl Transcoder {
    /// Create a transcoder for the given ffmpeg binary.
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    /// Override the per-job timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The ffmpeg binary this runner invokes.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run one ffmpeg job to completion.
    ///
    /// Blocks until the process exits, the timeout elapses, or Ctrl-C is
    /// received. Non-zero exit surfaces the tail of stderr.
    pub fn run(&self, args: &[String]) -> Result<(), TranscodeError> {
        log::debug!("ffmpeg {}", args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfmpegNotFound
                } else {
                    TranscodeError::SpawnFailed(e)
                }
            })?;

        let stderr_thread = spawn_stderr_reader(&mut child);
        let started = Instant::now();

        let status = loop {
            if interrupt_received() {
                let _ = shutdown(&mut child);
                drain_stderr(stderr_thread);
                return Err(TranscodeError::Interrupted);
            }

            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if started.elapsed() > self.timeout {
                        let _ = shutdown(&mut child);
                        drain_stderr(stderr_thread);
                        return Err(TranscodeError::Timeout(self.timeout));
                    }
                    thread::sleep(Duration::from_millis(50));
                }
            }
        };

        let stderr_lines = drain_stderr(stderr_thread);

        if status.success() {
            Ok(())
        } else {
            let tail: Vec<String> = stderr_lines
                .iter()
                .rev()
                .take(STDERR_TAIL_LINES)
                .rev()
                .cloned()
                .collect();
            Err(TranscodeError::ProcessFailed {
                exit_code: status.code(),
                stderr: tail.join("\n"),
            })
        }
    }
}

/// Collect stderr lines on a background thread.
fn spawn_stderr_reader(child: &mut Child) -> Option<JoinHandle<Vec<String>>> {
    child.stderr.take().map(|stderr| {
        thread::spawn(move || {
            let reader = BufReader::new(stderr);
            let mut lines = Vec::new();
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        log::debug!("[ffmpeg] {}", l);
                        lines.push(l);
                    }
                    Err(_) => break,
                }
            }
            lines
        })
    })
}

fn drain_stderr(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Terminate a child: SIGINT first, SIGKILL after the grace period.
fn shutdown(child: &mut Child) -> Result<(), std::io::Error> {
    #[cfg(unix)]
    {
        unsafe {
            let pid = child.id() as i32;
            libc::kill(pid, libc::SIGINT);
        }
    }

    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }

    let start = Instant::now();
    loop {
        match child.try_wait()? {
            Some(_) => return Ok(()),
            None => {
                if start.elapsed() > SHUTDOWN_GRACE {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Global flag for Ctrl-C across the application.
static INTERRUPT_RECEIVED: AtomicBool = AtomicBool::new(false);

/// Check whether Ctrl-C has been received.
pub fn interrupt_received() -> bool {
    INTERRUPT_RECEIVED.load(Ordering::SeqCst)
}

/// Install the Ctrl-C handler. Call once at startup.
pub fn setup_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        INTERRUPT_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ffmpeg() -> Option<PathBuf> {
        which::which("ffmpeg").ok()
    }

    #[test]
    fn test_run_version_succeeds() {
        let Some(bin) = ffmpeg() else { return };
        let transcoder = Transcoder::new(bin);
        assert!(transcoder.run(&["-version".to_string()]).is_ok());
    }

    #[test]
    fn test_run_invalid_args_fails_with_stderr() {
        let Some(bin) = ffmpeg() else { return };
        let transcoder = Transcoder::new(bin);
        let err = transcoder
            .run(&["-invalid_nonexistent_flag_xyz".to_string()])
            .unwrap_err();
        assert!(matches!(err, TranscodeError::ProcessFailed { .. }));
    }

    #[test]
    fn test_missing_binary_is_not_found() {
        let transcoder = Transcoder::new(PathBuf::from("/nonexistent/ffmpeg-xyz"));
        let err = transcoder.run(&["-version".to_string()]).unwrap_err();
        assert!(matches!(err, TranscodeError::FfmpegNotFound));
    }

    #[test]
    fn test_error_display_has_remediation() {
        let msg = TranscodeError::FfmpegNotFound.to_string();
        assert!(msg.contains("ffmpeg not found"));
        assert!(msg.contains("Install"));
    }
}
