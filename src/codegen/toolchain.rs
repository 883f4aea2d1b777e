use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot run `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed with {status}")]
    Status { command: String, status: ExitStatus },
}

/// Files produced for one output prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub asm: PathBuf,
    pub object: PathBuf,
    pub executable: PathBuf,
}

impl Artifacts {
    /// `<prefix>.asm`, `<prefix>.o` and `<prefix>`.
    pub fn from_prefix(prefix: &Path) -> Self {
        Self {
            asm: with_suffix(prefix, ".asm"),
            object: with_suffix(prefix, ".o"),
            executable: prefix.to_path_buf(),
        }
    }
}

/// Append to the full prefix; a dot already in the file name stays.
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Captured result of running a built executable.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunOutput {
    /// Exit code, or 1 when the process was killed by a signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(1)
    }
}

/// Write the assembly, then assemble with `nasm -felf64` and link with `ld`.
pub fn build(asm_text: &str, prefix: &Path) -> Result<Artifacts, ToolchainError> {
    let artifacts = Artifacts::from_prefix(prefix);

    if let Some(dir) = artifacts.asm.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ToolchainError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    fs::write(&artifacts.asm, asm_text).map_err(|source| ToolchainError::Write {
        path: artifacts.asm.clone(),
        source,
    })?;
    info!("wrote {}", artifacts.asm.display());

    run_command(
        Command::new("nasm")
            .arg("-felf64")
            .arg(&artifacts.asm)
            .arg("-o")
            .arg(&artifacts.object),
    )?;
    run_command(
        Command::new("ld")
            .arg("-o")
            .arg(&artifacts.executable)
            .arg(&artifacts.object),
    )?;

    Ok(artifacts)
}

/// Run a tool to completion, failing on a non-zero status. Tool output goes
/// straight to the terminal.
pub fn run_command(command: &mut Command) -> Result<(), ToolchainError> {
    let described = describe(command);
    info!("[CMD] {}", described);

    let status = command.status().map_err(|source| ToolchainError::Spawn {
        program: command.get_program().to_string_lossy().into_owned(),
        source,
    })?;

    if !status.success() {
        return Err(ToolchainError::Status {
            command: described,
            status,
        });
    }
    Ok(())
}

/// Run a built executable and capture its output. A non-zero exit is not an
/// error here; callers decide what to do with the status.
pub fn run_executable(path: &Path) -> Result<RunOutput, ToolchainError> {
    let path = executable_path(path);
    info!("[CMD] {}", path.display());

    let output = Command::new(&path)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| ToolchainError::Spawn {
            program: path.display().to_string(),
            source,
        })?;

    Ok(RunOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Whether `program` can be spawned at all.
pub fn available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// A bare file name would be looked up in PATH; anchor it to the current
/// directory instead.
fn executable_path(path: &Path) -> PathBuf {
    if path.components().count() == 1 && path.is_relative() {
        Path::new(".").join(path)
    } else {
        path.to_path_buf()
    }
}

fn describe(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().into_owned()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}
