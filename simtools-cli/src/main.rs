#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Commands};
use cmd::{create, fcr, normalize_manifest, qc, view};
use human_panic::setup_panic;
use lazy_static::lazy_static;
use simtools::egt::ClusterFile;

use crate::logging::init_logging;
use crate::opts::{OutputMode, OutputWriter};
use crate::progress_bar::SimProgressBar;
use crate::sample_list::SampleList;

mod cli;
mod cmd;
mod logging;
mod opts;
mod progress_bar;
mod sample_list;

lazy_static! {
    pub(crate) static ref PROGRESS_BAR: SimProgressBar = SimProgressBar::new();
}

fn main() -> anyhow::Result<()> {
    setup_panic!();

    let cli: Cli = Cli::parse();

    if !cli.no_progress {
        PROGRESS_BAR.show();
    }

    init_logging(cli.verbose.log_level_filter()).expect("Could not initialize logging");

    match &cli.command {
        Commands::View { input, intensities } => {
            view::view(input, *intensities, &*PROGRESS_BAR)
                .context("Failed to display given SIM file")?;
        }
        Commands::Create {
            input,
            output,
            manifest,
            normalize,
        } => {
            let samples = SampleList::open(input.path())?;
            let mut manifest_data = manifest.load(&manifest.params_builder().build())?;
            let output =
                OutputWriter::from_path_and_input(output, input.path(), "sim", OutputMode::Binary)?;

            PROGRESS_BAR.set_stage("Samples");
            create::create(
                &samples,
                &mut manifest_data,
                output.into_write(),
                *normalize,
                &*PROGRESS_BAR,
            )
            .context("Failed to create a SIM file")?;
        }
        Commands::Fcr {
            input,
            output,
            manifest,
            egt,
            gzip,
        } => {
            let samples = SampleList::open(input.path())?;
            let manifest_data = manifest.load(&manifest.params_builder().build())?;
            let clusters = ClusterFile::open(egt.path())
                .with_context(|| format!("Could not read the cluster file {}", egt))?;
            let extension = if *gzip { "fcr.txt.gz" } else { "fcr.txt" };
            let output =
                OutputWriter::from_path_and_input(output, input.path(), extension, OutputMode::Text)?;

            PROGRESS_BAR.set_stage("Samples");
            fcr::fcr(
                &samples,
                &manifest_data,
                &clusters,
                output.into_text_write(*gzip),
                &*PROGRESS_BAR,
            )
            .context("Failed to write the final call report")?;
        }
        Commands::Qc {
            input,
            magnitude,
            xydiff,
        } => {
            qc::qc(input.path(), magnitude.as_deref(), xydiff.as_deref())
                .context("Failed to compute QC metrics")?;
        }
        Commands::NormalizeManifest {
            manifest,
            output,
            chromosome,
            exclude_cnvs,
        } => {
            let params = manifest
                .params_builder()
                .chromosome(chromosome.as_deref())
                .exclude_cnvs(*exclude_cnvs)
                .build();
            let manifest_data = manifest.load(&params)?;
            let output = OutputWriter::from_path_and_input(
                output,
                manifest.manifest.path(),
                "normalized.csv",
                OutputMode::Text,
            )?;

            normalize_manifest::normalize_manifest(&manifest_data, output.into_write())
                .context("Failed to normalize given manifest")?;
        }
    }

    PROGRESS_BAR.finish();
    Ok(())
}
