//! Lets one-shot CLI invocations find the running daemon. The daemon keeps
//! its pid in a file next to the config; edits made from the command line end
//! with a SIGHUP so the daemon re-reads its files and rebinds hotkeys.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::command::{run_command, CommandError};

/// Removes the pid file again when dropped, unless another daemon took it
/// over in the meantime.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id();
        fs::write(path, pid.to_string())?;
        tracing::debug!(?path, pid, "pid file written");
        Ok(Self {
            path: path.to_path_buf(),
            pid,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if read_pid(&self.path) == Some(self.pid) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Pid of a live daemon recorded at `path`. Stale files, and pids that now
/// belong to some other program, are ignored.
pub fn running_daemon(path: &Path) -> Option<u32> {
    let pid = read_pid(path)?;
    let comm = fs::read_to_string(format!("/proc/{pid}/comm")).ok()?;
    let own = fs::read_to_string("/proc/self/comm").ok()?;
    (comm == own).then_some(pid)
}

/// Sends SIGHUP to the daemon recorded at `path`. `Ok(None)` when no daemon
/// is running.
pub fn signal_reload(path: &Path) -> Result<Option<u32>, CommandError> {
    let Some(pid) = running_daemon(path) else {
        return Ok(None);
    };
    send_hangup(pid)?;
    tracing::debug!(pid, "asked daemon to reload");
    Ok(Some(pid))
}

fn send_hangup(pid: u32) -> Result<(), CommandError> {
    let pid_arg = pid.to_string();
    run_command("kill", &["-HUP", &pid_arg])
}
