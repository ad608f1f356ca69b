//! Acquisition hash verification
//!
//! Streams the whole logical image through a hasher and compares the digest
//! with the hash recorded at acquisition time, when the container has one.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::common::{hashes_match, HashAlgorithm, StreamingHasher, BUFFER_SIZE};
use crate::container::EvidenceContainer;
use crate::error::ReadError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VerifyStatus {
    Match,
    Mismatch,
    NoStoredHash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub algorithm: HashAlgorithm,
    pub computed: String,
    pub stored: Option<String>,
    pub status: VerifyStatus,
    pub bytes_hashed: u64,
}

pub fn verify(container: &mut EvidenceContainer, algorithm: HashAlgorithm) -> Result<VerifyReport, ReadError> {
    verify_with_progress(container, algorithm, |_current, _total| {})
}

#[instrument(skip(container, progress_callback), fields(path = %container.path().display()))]
pub fn verify_with_progress<F>(
    container: &mut EvidenceContainer,
    algorithm: HashAlgorithm,
    mut progress_callback: F,
) -> Result<VerifyReport, ReadError>
where
    F: FnMut(u64, u64),
{
    let total = container.size();
    let mut hasher = StreamingHasher::new(algorithm);
    let mut offset = 0u64;

    while offset < total {
        let chunk = container.read(offset, BUFFER_SIZE)?;
        if chunk.is_empty() {
            return Err(ReadError::ShortRead {
                offset,
                wanted: BUFFER_SIZE,
                got: 0,
            });
        }
        hasher.update(&chunk);
        offset += chunk.len() as u64;
        progress_callback(offset, total);
    }
    let computed = hasher.finalize();

    let stored = container
        .hash_values()
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(algorithm.name()))
        .map(|(_, value)| value);

    let status = match &stored {
        None => VerifyStatus::NoStoredHash,
        Some(expected) if hashes_match(expected, &computed) => VerifyStatus::Match,
        Some(_) => VerifyStatus::Mismatch,
    };

    match status {
        VerifyStatus::Mismatch => warn!(%algorithm, %computed, stored = ?stored, "Acquisition hash mismatch"),
        _ => info!(%algorithm, %computed, ?status, "Image hashed"),
    }
    debug!(bytes = offset, "Verification complete");

    Ok(VerifyReport {
        algorithm,
        computed,
        stored,
        status,
        bytes_hashed: offset,
    })
}
