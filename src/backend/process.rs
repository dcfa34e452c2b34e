// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Backend process supervisor.
//!
//! Owns the lifecycle of the spawned Python inpainting backend:
//! `stopped -> starting -> running -> stopping -> stopped`. Layers that
//! need the backend receive the supervisor explicitly; there is no
//! ambient process handle.

use crate::config::LaunchMode;
use std::path::{Path, PathBuf};
use std::process::Output;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Lifecycle state of the backend process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Errors from backend process supervision.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend is {state:?}, cannot {operation}")]
    InvalidState {
        state: ProcessState,
        operation: &'static str,
    },

    #[error("no Python interpreter found on PATH")]
    PythonMissing,

    #[error("backend project directory {0} does not exist")]
    ProjectMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supervises the external Python backend process.
pub struct BackendSupervisor {
    state: ProcessState,
    child: Option<Child>,
    project_dir: PathBuf,
    port: u32,
    launch_mode: LaunchMode,
}

impl BackendSupervisor {
    pub fn new(project_dir: impl Into<PathBuf>, port: u32, launch_mode: LaunchMode) -> Self {
        Self {
            state: ProcessState::Stopped,
            child: None,
            project_dir: project_dir.into(),
            port,
            launch_mode,
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    /// Spawn the backend process.
    ///
    /// Only valid from the stopped state. The process is launched from
    /// the configured project directory with the configured port and
    /// device.
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        if self.state != ProcessState::Stopped {
            return Err(SupervisorError::InvalidState {
                state: self.state,
                operation: "start",
            });
        }
        if !self.project_dir.exists() {
            return Err(SupervisorError::ProjectMissing(self.project_dir.clone()));
        }

        self.state = ProcessState::Starting;
        let python = match detect_python().await {
            Some(python) => python,
            None => {
                self.state = ProcessState::Stopped;
                return Err(SupervisorError::PythonMissing);
            }
        };

        let device = match self.launch_mode {
            LaunchMode::Cuda => "cuda",
            LaunchMode::Cpu => "cpu",
        };
        log::info!(
            "Starting backend: {} main.py --port {} --device {} (cwd {})",
            python,
            self.port,
            device,
            self.project_dir.display()
        );

        let spawned = Command::new(&python)
            .arg("main.py")
            .args(["--port", &self.port.to_string()])
            .args(["--device", device])
            .current_dir(&self.project_dir)
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                self.child = Some(child);
                self.state = ProcessState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = ProcessState::Stopped;
                Err(SupervisorError::Io(e))
            }
        }
    }

    /// Stop the backend process. Stopping an already-stopped backend
    /// is a no-op.
    pub async fn stop(&mut self) -> Result<(), SupervisorError> {
        if self.state == ProcessState::Stopped {
            return Ok(());
        }
        self.state = ProcessState::Stopping;

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                log::warn!("Failed to kill backend process: {}", e);
            }
            let _ = child.wait().await;
        }
        self.state = ProcessState::Stopped;
        log::info!("Backend stopped");
        Ok(())
    }

    /// Current state, reconciled with the child process.
    ///
    /// A child that exited on its own moves the supervisor back to
    /// stopped.
    pub fn status(&mut self) -> ProcessState {
        if let Some(child) = &mut self.child {
            if let Ok(Some(exit)) = child.try_wait() {
                log::warn!("Backend process exited on its own: {}", exit);
                self.child = None;
                self.state = ProcessState::Stopped;
            }
        }
        self.state
    }

    /// Ensure the project has a virtual environment with dependencies.
    ///
    /// Creates `.venv` when missing and installs `requirements.txt`
    /// when present. Returns the venv directory.
    pub async fn ensure_venv(&self) -> Result<PathBuf, SupervisorError> {
        if !self.project_dir.exists() {
            return Err(SupervisorError::ProjectMissing(self.project_dir.clone()));
        }
        let venv_dir = self.project_dir.join(".venv");

        if !venv_dir.exists() {
            let python = detect_python()
                .await
                .ok_or(SupervisorError::PythonMissing)?;
            log::info!("Creating virtual environment at {}", venv_dir.display());
            let output = Command::new(&python)
                .args(["-m", "venv", ".venv"])
                .current_dir(&self.project_dir)
                .output()
                .await?;
            if !output.status.success() {
                return Err(SupervisorError::Io(std::io::Error::other(format!(
                    "venv creation failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ))));
            }
        }

        let requirements = self.project_dir.join("requirements.txt");
        if requirements.exists() {
            let pip = venv_pip(&venv_dir);
            log::info!("Installing backend dependencies from requirements.txt");
            let output = Command::new(&pip)
                .args(["install", "-r", "requirements.txt"])
                .current_dir(&self.project_dir)
                .output()
                .await?;
            if !output.status.success() {
                return Err(SupervisorError::Io(std::io::Error::other(format!(
                    "dependency install failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ))));
            }
        }
        Ok(venv_dir)
    }

    /// Run an arbitrary command scoped to the project directory.
    pub async fn run_command(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<Output, SupervisorError> {
        if !self.project_dir.exists() {
            return Err(SupervisorError::ProjectMissing(self.project_dir.clone()));
        }
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.project_dir)
            .output()
            .await?;
        Ok(output)
    }
}

/// Probe PATH for a usable Python interpreter.
pub async fn detect_python() -> Option<String> {
    for candidate in ["python3", "python"] {
        let probe = Command::new(candidate).arg("--version").output().await;
        if matches!(probe, Ok(output) if output.status.success()) {
            return Some(candidate.to_string());
        }
    }
    None
}

fn venv_pip(venv_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        venv_dir.join("Scripts").join("pip.exe")
    } else {
        venv_dir.join("bin").join("pip")
    }
}
