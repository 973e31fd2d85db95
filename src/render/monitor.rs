//! Bounded polling of a remote render job.
//!
//! The loop runs at a fixed interval up to a hard iteration cap. It ends on
//! `done` (exactly one download attempt), `failed`, or cap exhaustion. A
//! tick that cannot reach the API is logged and still counts against the
//! cap.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::client::{JobState, RenderClient, RenderError};

/// Poll pacing and bound.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Fixed delay between polls.
    pub interval: Duration,
    /// Hard cap on status checks.
    pub max_checks: u32,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_checks: 240,
        }
    }
}

/// How the monitor loop ended.
#[derive(Debug)]
pub enum MonitorOutcome {
    /// The job finished and the file was downloaded.
    Completed { path: PathBuf },
    /// The job failed on the server.
    Failed { error: String },
    /// The cap was reached before a terminal status.
    TimedOut { checks: u32 },
}

/// Poll a render job until it terminates or the check cap is reached.
///
/// On `done` the output is downloaded once and a `render_status.json`
/// sidecar is written next to it.
pub async fn monitor_render(
    client: &RenderClient,
    render_id: &str,
    dest: &Path,
    opts: &MonitorOptions,
) -> Result<MonitorOutcome, RenderError> {
    log::info!(
        "Monitoring render {} (interval {:?}, up to {} checks)",
        render_id,
        opts.interval,
        opts.max_checks
    );

    for check in 0..opts.max_checks {
        match client.status(render_id).await {
            Err(e) => {
                log::warn!("[{}] unable to reach render API: {}", check, e);
            }
            Ok(status) => {
                log::info!(
                    "[{}] status: {:?} ({}%)",
                    check,
                    status.state,
                    status.progress
                );

                match status.state {
                    JobState::Done => {
                        let url = status.url.ok_or_else(|| {
                            RenderError::ApiError(
                                "render done but no download URL in response".to_string(),
                            )
                        })?;
                        let path = client.download(&url, dest).await?;
                        write_status_sidecar(render_id, "done", &path)?;
                        return Ok(MonitorOutcome::Completed { path });
                    }
                    JobState::Failed => {
                        let error = status
                            .error
                            .unwrap_or_else(|| "unknown render failure".to_string());
                        log::error!("Render failed: {}", error);
                        return Ok(MonitorOutcome::Failed { error });
                    }
                    _ => {}
                }
            }
        }

        if check + 1 < opts.max_checks {
            tokio::time::sleep(opts.interval).await;
        }
    }

    log::warn!(
        "Render {} did not finish within {} checks",
        render_id,
        opts.max_checks
    );
    Ok(MonitorOutcome::TimedOut {
        checks: opts.max_checks,
    })
}

fn write_status_sidecar(
    render_id: &str,
    status: &str,
    output: &Path,
) -> Result<(), std::io::Error> {
    let sidecar = output.with_file_name("render_status.json");
    let doc = serde_json::json!({
        "render_id": render_id,
        "status": status,
        "output": output.to_string_lossy(),
    });
    std::fs::write(sidecar, serde_json::to_string_pretty(&doc)?)
}
