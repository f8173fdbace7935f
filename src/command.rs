//! Thin wrappers around the external programs the system backends drive
//! (`hyprctl`, `grim`, `slurp`, `wl-copy`).

use std::io::Write;
use std::process::{Child, Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command failed: {command}: {message}")]
    Failed { command: String, message: String },
    #[error("command io error: {command}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn run_command_text(command: &str, args: &[&str]) -> Result<String, CommandError> {
    let stdout = run_command_internal(command, args)?;
    let text = String::from_utf8_lossy(&stdout).into_owned();
    if text.trim().is_empty() {
        return Err(CommandError::Failed {
            command: command.to_string(),
            message: "command produced no stdout output".to_string(),
        });
    }
    Ok(text)
}

/// Runs `command` for its exit status only.
pub(crate) fn run_command(command: &str, args: &[&str]) -> Result<(), CommandError> {
    run_command_internal(command, args).map(|_| ())
}

pub(crate) fn run_command_bytes(command: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
    let stdout = run_command_internal(command, args)?;
    if stdout.is_empty() {
        return Err(CommandError::Failed {
            command: command.to_string(),
            message: "command produced no stdout output".to_string(),
        });
    }
    Ok(stdout)
}

/// Feeds `stdin_payload` to `command` and waits for it to exit. Output is
/// discarded: `wl-copy` forks a server that keeps any inherited pipe open.
pub(crate) fn run_command_with_stdin(
    command: &str,
    args: &[&str],
    stdin_payload: &[u8],
) -> Result<(), CommandError> {
    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| CommandError::Io {
            command: command.to_string(),
            source: err,
        })?;

    let Some(mut stdin) = child.stdin.take() else {
        cleanup_command_child(&mut child);
        return Err(CommandError::Failed {
            command: command.to_string(),
            message: "command stdin unavailable".to_string(),
        });
    };
    if let Err(err) = stdin.write_all(stdin_payload) {
        cleanup_command_child(&mut child);
        return Err(CommandError::Io {
            command: command.to_string(),
            source: err,
        });
    }
    // closing stdin lets the child see EOF
    drop(stdin);

    let status = child.wait().map_err(|err| CommandError::Io {
        command: command.to_string(),
        source: err,
    })?;
    if !status.success() {
        return Err(CommandError::Failed {
            command: command.to_string(),
            message: format!("exit status: {status}"),
        });
    }
    Ok(())
}

fn run_command_internal(command: &str, args: &[&str]) -> Result<Vec<u8>, CommandError> {
    let output = Command::new(command)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|err| CommandError::Io {
            command: command.to_string(),
            source: err,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            command: command.to_string(),
            message: format!("exit status: {}; stderr: {}", output.status, stderr.trim()),
        });
    }

    Ok(output.stdout)
}

pub(crate) fn cleanup_command_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_io_error_with_command_name() {
        let err = run_command_text("ft-capture-definitely-missing-binary", &[])
            .expect_err("missing program should fail to spawn");
        assert!(matches!(err, CommandError::Io { ref command, .. } if command == "ft-capture-definitely-missing-binary"));
        assert!(err.to_string().contains("ft-capture-definitely-missing-binary"));
    }

    #[test]
    fn failed_error_message_includes_command() {
        let err = CommandError::Failed {
            command: "grim".to_string(),
            message: "exit status: 1".to_string(),
        };
        assert_eq!(err.to_string(), "command failed: grim: exit status: 1");
    }

    #[test]
    fn stdin_command_does_not_wait_for_forked_children() {
        let started = std::time::Instant::now();

        run_command_with_stdin("sh", &["-c", "cat >/dev/null; sleep 3 &"], b"png bytes")
            .expect("shell should accept the payload");

        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn stdin_command_reports_exit_status() {
        let err = run_command_with_stdin("sh", &["-c", "cat >/dev/null; exit 3"], b"data")
            .expect_err("non-zero exit should fail");
        assert!(matches!(err, CommandError::Failed { ref command, .. } if command == "sh"));
    }
}
