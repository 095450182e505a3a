//! `CommandExecutor` that dispatches into a running container via `docker
//! exec`, kept fully synchronous: container exec calls are plain blocking
//! subprocess calls, distinct from the image/container lifecycle calls that
//! go through an async runtime in the environment manager.

use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use evb_exec::{CommandExecutor, ExecOutcome, ExecRequest, ExecutorError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerExecutor {
    pub docker_binary: String,
    pub container_id: String,
}

impl ContainerExecutor {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            docker_binary: "docker".to_string(),
            container_id: container_id.into(),
        }
    }
}

impl CommandExecutor for ContainerExecutor {
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

        let deadline = Instant::now() + Duration::from_secs(request.timeout_secs);

        let mut command = Command::new(&self.docker_binary);
        command
            .arg("exec")
            .arg("-w")
            .arg(&request.workdir)
            .args(request.env.iter().flat_map(|(k, v)| {
                ["-e".to_string(), format!("{k}={v}")]
            }))
            .arg(&self.container_id)
            .arg("bash")
            .arg("-lc")
            .arg(&request.command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            command: request.command.clone(),
            source,
        })?;

        let mut stdout = child.stdout.take().expect("piped stdout");
        let mut stderr = child.stderr.take().expect("piped stderr");
        let (tx, rx) = mpsc::channel::<String>();

        let stdout_tx = tx.clone();
        let stdout_handle = thread::spawn(move || {
            use std::io::Read;
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            let _ = stdout_tx.send(buf);
        });
        let stderr_handle = thread::spawn(move || {
            use std::io::Read;
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
}
