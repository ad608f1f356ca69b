//! Error taxonomy for the evidence pipeline
//!
//! Each pipeline stage owns one error type. Fatal stages (open, read, layout,
//! seal) propagate their error to the caller; the content search collects
//! per-document [`SearchError`]s instead of aborting the batch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to open an evidence container
#[derive(Debug, Error)]
pub enum ContainerOpenError {
    #[error("evidence file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("no segment files match {}", base.display())]
    NoSegments { base: PathBuf },

    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid container {}: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("unsupported container {}: {reason}", path.display())]
    Unsupported { path: PathBuf, reason: String },

    #[error("unknown container kind '{0}' (expected raw or ewf)")]
    UnknownKind(String),
}

/// Failure while reading bytes from an opened container
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read at offset {offset} is beyond the end of the image ({size} bytes)")]
    OutOfRange { offset: u64, size: u64 },

    #[error("short read at offset {offset}: wanted {wanted} bytes, got {got}")]
    ShortRead { offset: u64, wanted: usize, got: usize },

    #[error("container is closed")]
    Closed,

    #[error("I/O error at offset {offset}: {source}")]
    Io {
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("corrupt data at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },
}

/// Neither a volume layout nor a filesystem could be opened
#[derive(Debug, Error)]
pub enum LayoutOpenError {
    #[error("unknown partition table kind '{0}' (expected DOS, GPT, MAC or SUN)")]
    UnknownKind(String),

    #[error("unable to read {kind} partition table: {reason}")]
    Volume { kind: &'static str, reason: String },

    #[error("unable to open file system at byte offset {offset}: {reason}")]
    FileSystem { offset: u64, reason: String },

    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Failure while watermarking, encrypting or persisting a report
#[derive(Debug, Error)]
pub enum SealError {
    #[error("a report password is required")]
    NoPassword,

    #[error("table '{table}' row {row} has {got} cells, header has {expected}")]
    Shape {
        table: String,
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("document rendering failed: {0}")]
    Render(String),

    #[error("font lookup failed: {0}")]
    Font(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("rasterizer produced no pages")]
    NoPages,

    #[error("watermarking failed: {0}")]
    Watermark(String),

    #[error("page reassembly failed: {0}")]
    Assemble(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("failed to write report {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error during sealing: {0}")]
    Io(#[from] io::Error),
}

/// Failure in the content search pipeline
///
/// `Extract` is the per-document failure that is recorded and skipped; the
/// others abort the search before any document is processed.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search root not found or not a directory: {}", path.display())]
    RootNotFound { path: PathBuf },

    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("search query has no words")]
    EmptyQuery,

    #[error("text extraction failed for {}: {reason}", path.display())]
    Extract { path: PathBuf, reason: String },
}

/// Failure of the external file-recovery tool
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("evidence file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("recovery output directory already exists: {}", path.display())]
    OutputExists { path: PathBuf },

    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with status {status}")]
    Failed { program: String, status: String },
}

/// Invalid pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("report password must not be empty")]
    EmptyPassword,

    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),

    #[error("raster DPI must be greater than zero")]
    InvalidDpi,

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Any fatal pipeline failure, tagged with the stage that produced it
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("open: {0}")]
    Open(#[from] ContainerOpenError),

    #[error("read: {0}")]
    Read(#[from] ReadError),

    #[error("layout: {0}")]
    Layout(#[from] LayoutOpenError),

    #[error("seal: {0}")]
    Seal(#[from] SealError),

    #[error("search: {0}")]
    Search(#[from] SearchError),

    #[error("recovery: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("output: {0}")]
    Output(#[from] serde_json::Error),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
