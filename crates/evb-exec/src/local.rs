//! Local command execution: a plain pipe by default, a PTY when the caller
//! needs one (some agent CLIs refuse to emit output to a non-TTY stdout).

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ExecutorError;
use crate::trait_def::CommandExecutor;
use crate::types::{ExecOutcome, ExecRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize2 {
    pub rows: u16,
    pub cols: u16,
}

impl Default for PtySize2 {
    fn default() -> Self {
        Self {
            rows: 40,
            cols: 120,
        }
    }
}

/// Executes commands on the host, via `bash -lc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExecutor {
    pub shell_bin: String,
    pub pty_size: PtySize2,
    pub poll_interval: Duration,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self {
            shell_bin: "bash".to_string(),
            pty_size: PtySize2::default(),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl CommandExecutor for LocalExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
        if request.timeout_secs == 0 {
            return Err(ExecutorError::InvalidRequest {
                message: "timeout_secs must be greater than zero".to_string(),
            });
        }
        if request.command.trim().is_empty() {
            return Err(ExecutorError::InvalidRequest {
                message: "command must not be empty".to_string(),
            });
        }

        if request.tty {
            self.execute_pty(request)
        } else {
            self.execute_piped(request)
        }
    }
}

impl LocalExecutor {
    fn execute_piped(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
        let deadline = Instant::now() + Duration::from_secs(request.timeout_secs);

        let mut command = Command::new(&self.shell_bin);
        command
            .arg("-lc")
            .arg(&request.command)
            .current_dir(&request.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            command: request.command.clone(),
            source,
        })?;

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut stderr = child.stderr.take().expect("piped stderr");
        let (tx, rx) = mpsc::channel::<String>();

        let stdout_tx = tx.clone();
        let stdout_handle = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            let _ = stdout_tx.send(buf);
        });
        let stderr_handle = thread::spawn(move || {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf);
            let _ = tx.send(buf);
        });

        loop {
            match child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) => {}
                Err(err) => {
                    return Err(ExecutorError::Runtime {
                        message: err.to_string(),
                    })
                }
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutorError::TestExecutionTimeout {
                    command: request.command.clone(),
                    timeout_secs: request.timeout_secs,
                });
            }
            thread::sleep(Duration::from_millis(20));
        }

        let status = child.wait().map_err(|err| ExecutorError::Runtime {
            message: err.to_string(),
        })?;

        let mut output = String::new();
        if let Ok(chunk) = rx.recv() {
            output.push_str(&chunk);
        }
        if let Ok(chunk) = rx.recv() {
            output.push_str(&chunk);
        }
        let _ = stdout_handle.join();
        let _ = stderr_handle.join();

        Ok(ExecOutcome {
            exit_code: status.code(),
            output,
        })
    }

    fn execute_pty(&self, request: &ExecRequest) -> Result<ExecOutcome, ExecutorError> {
        let deadline = Instant::now() + Duration::from_secs(request.timeout_secs);

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: self.pty_size.rows,
                cols: self.pty_size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| ExecutorError::PtySetup {
                message: err.to_string(),
            })?;

        let mut command = CommandBuilder::new(self.shell_bin.clone());
        command.arg("-lc");
        command.arg(&request.command);
        command.cwd(&request.workdir);
        for (key, value) in &request.env {
            command.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(|err| ExecutorError::Spawn {
                command: request.command.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
            })?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| ExecutorError::PtySetup {
                message: err.to_string(),
            })?;
        let (tx, rx) = mpsc::channel::<String>();
        let stream = request.stream;
        let reader_handle = thread::spawn(move || {
            let mut buf = BufReader::new(reader);
            loop {
                let mut line = String::new();
                match buf.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if stream {
                            tracing::info!(target: "evb_exec::pty", "{}", line.trim_end());
                        }
                        let _ = tx.send(line);
                    }
                    Err(_) => break,
                }
            }
        });

        let mut output = String::new();
        loop {
            while let Ok(line) = rx.try_recv() {
                output.push_str(&line);
            }

            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecutorError::TestExecutionTimeout {
                    command: request.command.clone(),
                    timeout_secs: request.timeout_secs,
                });
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    let _ = reader_handle.join();
                    while let Ok(line) = rx.try_recv() {
                        output.push_str(&line);
                    }
                    return Ok(ExecOutcome {
                        exit_code: i32::try_from(status.exit_code()).ok(),
                        output,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    return Err(ExecutorError::Runtime {
                        message: err.to_string(),
                    })
                }
            }

            thread::sleep(self.poll_interval);
        }
    }
}
