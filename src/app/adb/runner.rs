use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;
use crate::app::models::ConsoleOutput;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Runs `program` to completion. `timeout: None` waits for as long as the child runs.
pub fn run_command(
    program: &str,
    args: &[String],
    timeout: Option<Duration>,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Drain stdout/stderr in parallel; otherwise, a chatty child process can block once the pipe
    // buffer fills.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;

    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if timeout.is_some_and(|limit| start.elapsed() > limit) {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::system("Command timed out".to_string(), trace_id));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to wait for command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

/// Splits a command line into program + args. A leading `adb` token is replaced by `adb_program`.
pub fn split_command_line(command_line: &str, adb_program: &str) -> Option<(String, Vec<String>)> {
    let mut tokens = command_line.split_whitespace().map(str::to_string);
    let first = tokens.next()?;
    let program = if first == "adb" {
        adb_program.to_string()
    } else {
        first
    };
    Some((program, tokens.collect()))
}

/// Maps a finished (or failed) command onto console outputs. Success precedes Error.
pub fn classify_output(result: Result<CommandOutput, AppError>) -> Vec<ConsoleOutput> {
    let output = match result {
        Ok(output) => output,
        Err(err) => return vec![ConsoleOutput::Error(err.error)],
    };
    let mut outputs = Vec::new();
    if !output.stdout.is_empty() {
        outputs.push(ConsoleOutput::Success(output.stdout));
    }
    if !output.stderr.is_empty() {
        outputs.push(ConsoleOutput::Error(output.stderr));
    } else {
        match output.exit_code {
            Some(0) => {}
            Some(code) => {
                outputs.push(ConsoleOutput::Error(format!("Command exited with code {code}")))
            }
            // No exit code on unix means a signal ended the child.
            None => outputs.push(ConsoleOutput::Error("Command terminated by signal".to_string())),
        }
    }
    outputs
}

/// Executes a full command line and classifies the result. Blocking.
pub fn execute(
    command_line: &str,
    adb_program: &str,
    timeout: Option<Duration>,
    trace_id: &str,
) -> Vec<ConsoleOutput> {
    let Some((program, args)) = split_command_line(command_line, adb_program) else {
        warn!(trace_id = %trace_id, "refusing to execute an empty command line");
        return vec![ConsoleOutput::Error("Command is empty".to_string())];
    };
    debug!(trace_id = %trace_id, program = %program, args = ?args, "execute");
    let result = run_command(&program, &args, timeout, trace_id);
    if let Err(err) = &result {
        warn!(trace_id = %trace_id, error = %err, "command failed");
    }
    classify_output(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[cfg(unix)]
    #[test]
    fn run_command_does_not_deadlock_on_large_stdout() {
        let output = run_command(
            "sh",
            &sh("i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done"),
            Some(Duration::from_secs(20)),
            "test-trace-large-output",
        )
        .expect("expected large-output command to complete without timing out");

        assert_eq!(output.exit_code, Some(0));
        assert!(output.stdout.len() >= 1_000_000);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_times_out() {
        let err = run_command("sh", &sh("sleep 5"), Some(Duration::from_millis(100)), "t")
            .expect_err("expected timeout");
        assert!(err.error.contains("timed out"));
    }

    #[test]
    fn spawn_failure_is_a_system_error() {
        let err = run_command("/this/path/should/not/exist/adb", &[], None, "trace-x")
            .expect_err("expected spawn failure");
        assert_eq!(err.code, "ERR_SYSTEM");
        assert_eq!(err.trace_id, "trace-x");
    }

    #[test]
    fn splits_and_substitutes_adb() {
        let (program, args) =
            split_command_line("adb  shell am broadcast -n pkg", "/opt/adb").expect("split");
        assert_eq!(program, "/opt/adb");
        assert_eq!(args, vec!["shell", "am", "broadcast", "-n", "pkg"]);

        let (program, _) = split_command_line("echo adb", "/opt/adb").expect("split");
        assert_eq!(program, "echo");
        assert!(split_command_line("   ", "adb").is_none());
    }

    #[test]
    fn classifies_stdout_and_stderr() {
        let outputs = classify_output(Ok(CommandOutput {
            stdout: "Broadcasting: Intent".to_string(),
            stderr: "warning".to_string(),
            exit_code: Some(0),
        }));
        assert_eq!(
            outputs,
            vec![
                ConsoleOutput::Success("Broadcasting: Intent".to_string()),
                ConsoleOutput::Error("warning".to_string()),
            ]
        );
    }

    #[test]
    fn classifies_silent_failure_as_error() {
        let outputs = classify_output(Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(3),
        }));
        assert_eq!(
            outputs,
            vec![ConsoleOutput::Error("Command exited with code 3".to_string())]
        );
        let quiet = classify_output(Ok(CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
        }));
        assert!(quiet.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn classifies_killed_child_as_error() {
        let output = run_command("sh", &sh("kill -9 $$"), Some(Duration::from_secs(5)), "t")
            .expect("child was spawned");
        assert_eq!(output.exit_code, None);
        assert_eq!(
            classify_output(Ok(output)),
            vec![ConsoleOutput::Error("Command terminated by signal".to_string())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn execute_reports_stdout_and_stderr() {
        let outputs = execute("sh -c exit", "adb", None, "t");
        assert!(outputs.is_empty());

        let outputs = execute("echo hello", "adb", None, "t");
        assert_eq!(outputs, vec![ConsoleOutput::Success("hello\n".to_string())]);
    }

    #[test]
    fn execute_reports_spawn_failure() {
        let outputs = execute("adb devices -l", "/this/path/should/not/exist/adb", None, "t");
        assert_eq!(outputs.len(), 1);
        assert!(matches!(&outputs[0], ConsoleOutput::Error(message) if message.contains("Failed to spawn")));
    }

    #[test]
    fn execute_rejects_empty_command() {
        assert_eq!(
            execute("", "adb", None, "t"),
            vec![ConsoleOutput::Error("Command is empty".to_string())]
        );
    }
}
