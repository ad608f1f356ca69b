//! File carving through an external recovery program (foremost by default)
//!
//! The program is run directly, never through a shell, as
//! `<program> <evidence> -o <output_dir>`. The output directory is created
//! here and must not exist beforehand.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, instrument};

use crate::error::RecoveryError;
use crate::report::ReportTimestamp;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryRun {
    pub evidence: PathBuf,
    pub output_dir: PathBuf,
    pub program: String,
}

/// `<image name up to its first dot>_<timestamp>`
pub fn recovery_dir_name(evidence: &Path, timestamp: &ReportTimestamp) -> String {
    let name = evidence
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    format!("{}_{}", stem, timestamp.file_suffix())
}

#[instrument(skip(timestamp))]
pub fn recover(
    evidence: &Path,
    program: &str,
    output_root: &Path,
    timestamp: &ReportTimestamp,
) -> Result<RecoveryRun, RecoveryError> {
    if !evidence.is_file() {
        return Err(RecoveryError::NotFound {
            path: evidence.to_path_buf(),
        });
    }

    let output_dir = output_root.join(recovery_dir_name(evidence, timestamp));
    std::fs::create_dir_all(output_root).map_err(|source| RecoveryError::CreateDir {
        path: output_root.to_path_buf(),
        source,
    })?;
    std::fs::create_dir(&output_dir).map_err(|source| {
        if source.kind() == io::ErrorKind::AlreadyExists {
            RecoveryError::OutputExists {
                path: output_dir.clone(),
            }
        } else {
            RecoveryError::CreateDir {
                path: output_dir.clone(),
                source,
            }
        }
    })?;

    let status = Command::new(program)
        .arg(evidence)
        .arg("-o")
        .arg(&output_dir)
        .status()
        .map_err(|source| RecoveryError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(RecoveryError::Failed {
            program: program.to_string(),
            status: status.to_string(),
        });
    }

    info!(output = %output_dir.display(), "Recovery complete");
    Ok(RecoveryRun {
        evidence: evidence.to_path_buf(),
        output_dir,
        program: program.to_string(),
    })
}
