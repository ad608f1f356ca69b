//! FFX Evidence command line

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use ffx_evidence::common::HashAlgorithm;
use ffx_evidence::discovery::discover_evidence;
use ffx_evidence::recovery::recover;
use ffx_evidence::report::{ReportClock, SealedReport};
use ffx_evidence::verify::verify;
use ffx_evidence::{logging, ContainerKind, EvidenceContainer, PartitionKind, Pipeline, PipelineConfig, PipelineError};

#[derive(Parser)]
#[command(name = "ffx-evidence")]
#[command(author, version, about = "Evidence container metadata, content search and sealed PDF reports")]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Report password
    #[arg(long, global = true, env = "FFX_REPORT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Base64-encode every report cell
    #[arg(long, global = true)]
    obfuscate: bool,

    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// IANA time zone for watermarks and file names
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a report of acquisition metadata plus partitions or root directory
    Metadata {
        image: PathBuf,
        /// raw or ewf
        kind: ContainerKind,
        /// Partition table type (DOS, GPT, MAC, SUN); omit to read a file system
        #[arg(short, long)]
        partition: Option<PartitionKind>,
        /// Byte offset of the file system
        #[arg(short, long, default_value = "0")]
        offset: u64,
    },
    /// Seal a report listing the root directory of a file system
    Directory {
        image: PathBuf,
        kind: ContainerKind,
        #[arg(short, long, default_value = "0")]
        offset: u64,
    },
    /// Count words in documents under "pdf" directories and seal the results
    Search {
        root: PathBuf,
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Carve files out of an image with the recovery program
    Recover { image: PathBuf },
    /// List evidence images below a directory
    Discover { root: PathBuf },
    /// Hash an image and compare with the acquisition hash
    Verify {
        image: PathBuf,
        kind: ContainerKind,
        #[arg(short, long, default_value = "md5")]
        algorithm: HashAlgorithm,
    },
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, PipelineError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(password) = &cli.password {
        config.password = password.clone();
    }
    if cli.obfuscate {
        config.obfuscate = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(tz) = &cli.timezone {
        config.timezone = tz.clone();
    }
    Ok(config)
}

fn print_sealed(report: &SealedReport) {
    println!("{}", report.path.display());
    info!(pages = report.page_count, watermark = %report.watermark, "Report written");
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), PipelineError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Metadata {
            image,
            kind,
            partition,
            offset,
        } => {
            let report = Pipeline::new(config)?.metadata(&image, kind, partition, offset)?;
            print_sealed(&report);
        }
        Commands::Directory { image, kind, offset } => {
            let report = Pipeline::new(config)?.directory(&image, kind, offset)?;
            print_sealed(&report);
        }
        Commands::Search { root, words } => {
            let (outcome, report) = Pipeline::new(config)?.search(&root, &words)?;
            for failure in &outcome.failures {
                eprintln!("skipped: {}", failure);
            }
            print_json(&outcome.documents)?;
            print_sealed(&report);
        }
        Commands::Recover { image } => {
            let clock = ReportClock::new(config.tz()?);
            let run = recover(&image, &config.recovery_program, &config.output_dir, &clock.now())?;
            println!("{}", run.output_dir.display());
        }
        Commands::Discover { root } => {
            let found = discover_evidence(&root, &config.evidence_extensions)?;
            print_json(&found)?;
        }
        Commands::Verify { image, kind, algorithm } => {
            let mut container = EvidenceContainer::open(&image, kind)?;
            let report = verify(&mut container, algorithm)?;
            print_json(&report)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.verbose {
        logging::init_verbose();
    } else {
        logging::init();
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
