//! FFX Evidence: read-only access to disk image containers and sealed,
//! watermarked forensic reports.
//!
//! ```text
//! container ──▶ volume / filesystem ──▶ extract ──┐
//!                                                  ├─▶ report::assemble ─▶ report::Sealer ─▶ <base>_<timestamp>.pdf
//! search (marker dirs, page text, counts) ────────┘
//! ```
//!
//! [`pipeline::Pipeline`] wires the stages together for the command line.

pub mod common;
pub mod config;
pub mod container;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod filesystem;
pub mod logging;
pub mod pipeline;
pub mod recovery;
pub mod report;
pub mod search;
pub mod verify;
pub mod volume;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::PipelineConfig;
pub use container::{ContainerKind, EvidenceContainer};
pub use error::PipelineError;
pub use pipeline::Pipeline;
pub use volume::PartitionKind;
