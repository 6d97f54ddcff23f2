//! External document compiler invocation.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// File in the working directory that receives the compiler's stdout and stderr.
const LOG_FILE: &str = "compiler-output.log";

/// Errors that can occur while compiling a document.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        log: String,
    },

    #[error("{program} exited successfully but produced no {}", .path.display())]
    MissingArtifact {
        program: String,
        path: PathBuf,
        log: String,
    },

    #[error("{program} timed out after {seconds} seconds")]
    TimedOut {
        program: String,
        seconds: u64,
        log: String,
    },

    #[error("I/O error while compiling: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Captured compiler output, if the compiler got far enough to produce any.
    pub fn log(&self) -> Option<&str> {
        match self {
            CompileError::Failed { log, .. }
            | CompileError::MissingArtifact { log, .. }
            | CompileError::TimedOut { log, .. } => Some(log),
            CompileError::Spawn { .. } | CompileError::Io(_) => None,
        }
    }
}

/// A successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Artifact in the working directory
    pub artifact: PathBuf,

    /// Combined stdout and stderr
    pub log: String,

    /// Wall-clock time in milliseconds
    pub duration_ms: u64,
}

/// Invokes an external TeX engine.
#[derive(Debug, Clone)]
pub struct Compiler {
    program: String,
    args: Vec<String>,
    extension: String,
    timeout: Option<Duration>,
}

impl Compiler {
    /// Create a compiler running `program` with `args`, followed by the document name.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            extension: "pdf".to_string(),
            timeout: None,
        }
    }

    /// Set the extension of the artifact the compiler writes.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Kill the compiler if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extension of compiled artifacts.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Compile `document`, a file name inside `workdir`.
    ///
    /// The compiler runs with `workdir` as its current directory and is
    /// expected to write `<document stem>.<extension>` there.
    pub fn compile(&self, workdir: &Path, document: &str) -> Result<Compilation, CompileError> {
        let start = Instant::now();
        let log_path = workdir.join(LOG_FILE);
        let stdout = File::create(&log_path)?;
        let stderr = stdout.try_clone()?;

        tracing::debug!(
            "Running {} {:?} {} in {}",
            self.program,
            self.args,
            document,
            workdir.display()
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(document)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let status = match self.timeout {
            Some(timeout) => {
                let waited = child.wait_timeout(timeout);
                match settle(&mut child, waited)? {
                    Some(status) => status,
                    None => {
                        return Err(CompileError::TimedOut {
                            program: self.program.clone(),
                            seconds: timeout.as_secs(),
                            log: read_log(&log_path),
                        });
                    }
                }
            }
            None => child.wait()?,
        };

        let log = read_log(&log_path);

        if !status.success() {
            return Err(CompileError::Failed {
                program: self.program.clone(),
                status,
                log,
            });
        }

        let stem = Path::new(document)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(document);
        let artifact = workdir.join(format!("{}.{}", stem, self.extension));

        if !artifact.is_file() {
            return Err(CompileError::MissingArtifact {
                program: self.program.clone(),
                path: artifact,
                log,
            });
        }

        Ok(Compilation {
            artifact,
            log,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(
            "pdflatex",
            vec![
                "-interaction=nonstopmode".to_string(),
                "-halt-on-error".to_string(),
            ],
        )
    }
}

/// Settle the result of a timed wait on `child`.
///
/// Returns `None` if the child timed out. Unless it exited, the child is
/// killed and reaped before this returns, including when the wait failed.
fn settle(
    child: &mut Child,
    waited: io::Result<Option<ExitStatus>>,
) -> io::Result<Option<ExitStatus>> {
    if let Ok(Some(status)) = waited {
        return Ok(Some(status));
    }

    if let Err(e) = &waited {
        tracing::debug!("Waiting for compiler failed, killing it: {}", e);
    }
    let _ = child.kill();
    let _ = child.wait();
    waited
}

/// TeX engines may emit non-UTF-8 bytes, so the log is decoded lossily.
fn read_log(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
