//! Supervised invocation of external command-line tools.
//!
//! Every collaborator (pdftotext, pdftoppm, camelot, ocrmypdf) runs through
//! [`run_tool`], which enforces a timeout and captures output through
//! temporary files so a chatty child cannot block on a full pipe.

use std::ffi::OsStr;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::ToolError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_STDERR: usize = 4096;

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Run `program` with `args`, killing it once `timeout` elapses.
pub fn run_tool<I, S>(program: &str, args: I, timeout: Duration) -> Result<ToolOutput, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let io_err = |source: std::io::Error| ToolError::Io {
        program: program.to_string(),
        source,
    };

    let mut stdout_file = tempfile::tempfile().map_err(io_err)?;
    let mut stderr_file = tempfile::tempfile().map_err(io_err)?;

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone().map_err(io_err)?))
        .stderr(Stdio::from(stderr_file.try_clone().map_err(io_err)?))
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ToolError::NotFound {
                    program: program.to_string(),
                }
            } else {
                io_err(e)
            }
        })?;

    let status = loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            break status;
        }
        if start.elapsed() >= timeout {
            warn!("{} exceeded {:?}, killing", program, timeout);
            // The child may have exited between the poll and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let elapsed = start.elapsed();
    let stdout = read_back(&mut stdout_file).map_err(io_err)?;
    let stderr_raw = read_back(&mut stderr_file).map_err(io_err)?;
    let mut stderr = String::from_utf8_lossy(&stderr_raw).into_owned();
    if stderr.len() > MAX_STDERR {
        let mut cut = MAX_STDERR;
        while !stderr.is_char_boundary(cut) {
            cut -= 1;
        }
        stderr.truncate(cut);
    }

    debug!("{} finished with {} in {:?}", program, status, elapsed);

    if !status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            code: status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(ToolOutput {
        stdout,
        stderr,
        elapsed,
    })
}

/// Whether `program` can be spawned at all.
pub fn is_available(program: &str, version_flag: &str) -> bool {
    match run_tool(program, [version_flag], Duration::from_secs(10)) {
        Ok(_) => true,
        // Some tools print their version and exit non-zero.
        Err(ToolError::Failed { .. }) => true,
        Err(_) => false,
    }
}

fn read_back(file: &mut std::fs::File) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}
