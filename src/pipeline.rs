//! End-to-end sequences behind each CLI command
//!
//! Each run owns its container handle exclusively and finishes one stage
//! before starting the next: open, extract, assemble, seal.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::PipelineConfig;
use crate::container::{ContainerKind, EvidenceContainer};
use crate::error::PipelineError;
use crate::extract::{
    acquisition_metadata, acquisition_table, directory_table, enumerate_layout, list_root_directory,
    partition_entries, partition_table, LayoutView,
};
use crate::filesystem::open_filesystem;
use crate::report::{assemble, ReportClock, SealedReport, Sealer, TabularDocument};
use crate::search::{results_table, search, LopdfTextExtractor, SearchOutcome, TextExtractor};
use crate::volume::PartitionKind;

/// Acquisition metadata (segmented only), then the partition table when a
/// kind is given or the root directory of the file system at `offset`
pub fn metadata_tables(
    container: &mut EvidenceContainer,
    partition: Option<PartitionKind>,
    offset: u64,
) -> Result<Vec<TabularDocument>, PipelineError> {
    let mut tables = Vec::new();
    if let Some(metadata) = acquisition_metadata(container) {
        tables.push(acquisition_table(&metadata)?);
    }

    match enumerate_layout(&mut *container, partition, offset)? {
        LayoutView::Volume(layout) => tables.push(partition_table(&partition_entries(&layout))?),
        LayoutView::FileSystem(mut fs) => {
            let entries = list_root_directory(fs.as_mut(), &mut *container)?;
            tables.push(directory_table(&entries)?);
        }
    }
    Ok(tables)
}

/// Root directory table of the file system at `offset`
pub fn directory_tables(container: &mut EvidenceContainer, offset: u64) -> Result<Vec<TabularDocument>, PipelineError> {
    let mut fs = open_filesystem(&mut *container, offset)?;
    let entries = list_root_directory(fs.as_mut(), &mut *container)?;
    Ok(vec![directory_table(&entries)?])
}

fn image_stem(image: &Path) -> String {
    image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "evidence".to_string())
}

fn image_name(image: &Path) -> String {
    image
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub struct Pipeline {
    config: PipelineConfig,
    sealer: Sealer,
    extractor: Box<dyn TextExtractor>,
}

impl Pipeline {
    /// Validate `config` and wire up the default sealing collaborators
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let clock = Arc::new(ReportClock::new(config.tz()?));
        let sealer = Sealer::from_config(&config, clock)?;
        Ok(Self::with_parts(config, sealer, Box::new(LopdfTextExtractor)))
    }

    pub fn with_parts(
        config: PipelineConfig,
        sealer: Sealer,
        extractor: Box<dyn TextExtractor>,
    ) -> Self {
        Self {
            config,
            sealer,
            extractor,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn seal(&self, title: &str, tables: &[TabularDocument], base_name: &str) -> Result<SealedReport, PipelineError> {
        let document = assemble(title, tables, self.config.obfuscate);
        Ok(self.sealer.seal(&document, &self.config.password, base_name)?)
    }

    /// Sealed `meta_<stem>` report for one evidence image
    #[instrument(skip(self))]
    pub fn metadata(
        &self,
        image: &Path,
        kind: ContainerKind,
        partition: Option<PartitionKind>,
        offset: u64,
    ) -> Result<SealedReport, PipelineError> {
        let mut container = EvidenceContainer::open(image, kind)?;
        let tables = metadata_tables(&mut container, partition, offset)?;
        container.close();

        let title = format!("Evidence Metadata: {}", image_name(image));
        self.seal(&title, &tables, &format!("meta_{}", image_stem(image)))
    }

    /// Sealed `dir_<stem>` report listing the root directory
    #[instrument(skip(self))]
    pub fn directory(&self, image: &Path, kind: ContainerKind, offset: u64) -> Result<SealedReport, PipelineError> {
        let mut container = EvidenceContainer::open(image, kind)?;
        let tables = directory_tables(&mut container, offset)?;
        container.close();

        let title = format!("Root Directory: {}", image_name(image));
        self.seal(&title, &tables, &format!("dir_{}", image_stem(image)))
    }

    /// Search marker directories under `root` and seal a `pdf_analysis` report
    #[instrument(skip(self, words), fields(words = words.len()))]
    pub fn search(&self, root: &Path, words: &[String]) -> Result<(SearchOutcome, SealedReport), PipelineError> {
        let outcome = search(
            root,
            words,
            &self.config.search_marker,
            &self.config.document_extension,
            self.extractor.as_ref(),
        )?;
        let table = results_table(&outcome)?;
        let report = self.seal("Content Search", &[table], "pdf_analysis")?;
        info!(
            documents = outcome.documents.len(),
            failures = outcome.failures.len(),
            report = %report.path.display(),
            "Search report sealed"
        );
        Ok((outcome, report))
    }
}
