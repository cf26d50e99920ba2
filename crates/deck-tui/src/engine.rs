//! The external mpv process: version probe, headless launch, and the
//! `EngineLauncher` seam the controller plays through.

use crate::session::{ConnectTimeouts, Session, SessionWiring};
use deck_proto::config::EngineConfig;
use deck_proto::platform;
use deck_proto::protocol::Command;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Child;
use tracing::{debug, info, warn};

const KILL_WAIT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not run {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },
    #[error("{0:?} --version did not answer within {1:?}")]
    ProbeTimeout(PathBuf, Duration),
    #[error("{binary:?} --version exited with {status}")]
    ProbeFailed { binary: PathBuf, status: ExitStatus },
}

/// Run `<binary> --version` and return its first output line.
pub async fn probe_version(binary: &Path, limit: Duration) -> Result<String, EngineError> {
    let output = tokio::process::Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(limit, output)
        .await
        .map_err(|_| EngineError::ProbeTimeout(binary.to_path_buf(), limit))?
        .map_err(|source| EngineError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(EngineError::ProbeFailed {
            binary: binary.to_path_buf(),
            status: output.status,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

/// Command line for one headless playback.  `--` keeps a track named like
/// an option from being parsed as one.
pub fn engine_args(endpoint: &Path, track: &Path, volume: f64) -> Vec<OsString> {
    vec![
        "--no-video".into(),
        "--quiet".into(),
        platform::ipc_server_arg(endpoint).into(),
        format!("--volume={}", volume.clamp(0.0, 100.0).round() as i64).into(),
        "--".into(),
        track.as_os_str().to_os_string(),
    ]
}

/// A running mpv child.  Killed on drop if `kill` was never awaited.
pub struct EngineProcess {
    child: Child,
}

impl EngineProcess {
    pub fn spawn(
        binary: &Path,
        endpoint: &Path,
        track: &Path,
        volume: f64,
    ) -> Result<Self, EngineError> {
        // mpv's own complaints go to a side log; the terminal belongs to us.
        let stderr = match open_stderr_log() {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                debug!("engine: no stderr log ({}), discarding", e);
                Stdio::null()
            }
        };

        let child = tokio::process::Command::new(binary)
            .args(engine_args(endpoint, track, volume))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                binary: binary.to_path_buf(),
                source,
            })?;

        info!("engine: spawned pid {:?} for {:?}", child.id(), track);
        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate the process and reap it, giving up after a short wait.
    pub async fn kill(mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("engine: kill: {}", e);
        }
        match tokio::time::timeout(KILL_WAIT, self.child.wait()).await {
            Ok(Ok(status)) => debug!("engine: exited with {}", status),
            Ok(Err(e)) => warn!("engine: wait failed: {}", e),
            Err(_) => warn!("engine: did not exit within {:?}", KILL_WAIT),
        }
    }
}

fn open_stderr_log() -> std::io::Result<std::fs::File> {
    let dir = platform::data_dir();
    std::fs::create_dir_all(&dir)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("mpv-stderr.log"))
}

/// One track being played: the engine process (if we own one) and its session.
pub struct Playback {
    pub process: Option<EngineProcess>,
    pub session: Session,
}

impl Playback {
    /// Ask the engine to quit, stop the session, then make sure the process is gone.
    pub async fn teardown(mut self) {
        if let Err(e) = self.session.send(&Command::Quit) {
            debug!("engine: quit not sent: {}", e);
        }
        self.session.shutdown().await;
        if let Some(process) = self.process.take() {
            process.kill().await;
        }
    }
}

/// Starts playback of one track.  The controller only talks to this trait.
#[allow(async_fn_in_trait)]
pub trait EngineLauncher {
    async fn launch(
        &mut self,
        track: &Path,
        volume: f64,
        wiring: SessionWiring,
    ) -> anyhow::Result<Playback>;
}

pub struct MpvLauncher {
    binary: PathBuf,
    timeouts: ConnectTimeouts,
}

impl MpvLauncher {
    pub fn new(binary: PathBuf, config: &EngineConfig) -> Self {
        Self {
            binary,
            timeouts: ConnectTimeouts {
                startup: config.startup_timeout(),
                connect: config.connect_timeout(),
            },
        }
    }
}

impl EngineLauncher for MpvLauncher {
    async fn launch(
        &mut self,
        track: &Path,
        volume: f64,
        wiring: SessionWiring,
    ) -> anyhow::Result<Playback> {
        let endpoint = platform::ipc_endpoint();
        let process = EngineProcess::spawn(&self.binary, &endpoint, track, volume)?;
        let session = Session::connect(&endpoint, wiring, self.timeouts).await;
        Ok(Playback {
            process: Some(process),
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_args_are_headless() {
        let args = engine_args(Path::new("/tmp/e.sock"), Path::new("-odd name.flac"), 72.4);
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args[0], "--no-video");
        assert_eq!(args[1], "--quiet");
        assert!(args[2].starts_with("--input-ipc-server="));
        assert_eq!(args[3], "--volume=72");
        assert_eq!(args[4], "--");
        assert_eq!(args[5], "-odd name.flac");
    }

    #[tokio::test]
    async fn test_probe_missing_binary_is_spawn_error() {
        let err = probe_version(Path::new("/no/such/mpv"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_reads_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "mpv-ok", "echo 'mpv 0.38.0 Copyright'; echo 'built on ...'");
        let version = probe_version(&bin, Duration::from_secs(2)).await.unwrap();
        assert_eq!(version, "mpv 0.38.0 Copyright");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_failure_and_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "mpv-fail", "exit 3");
        let err = probe_version(&bin, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, EngineError::ProbeFailed { .. }));

        let bin = script(dir.path(), "mpv-hang", "sleep 5");
        let err = probe_version(&bin, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, EngineError::ProbeTimeout(..)));
    }
}
