use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};

use crate::opts::{input_file, input_source, InputFile, InputSource};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Don't display a progress bar/spinner
    #[clap(long, global = true, value_parser)]
    pub no_progress: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Options shared by the commands that read a manifest.
#[derive(clap::Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Manifest (bpm.csv) file path
    #[clap(short, long, value_parser = input_file)]
    pub manifest: InputFile,

    /// Read the manifest in the wide layout with an `IlmnID` header column
    #[clap(long, value_parser)]
    pub wide_manifest: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Display the header and sample names of a SIM file
    View {
        /// Input SIM file to read; `-` is the standard input
        #[clap(default_value_t, value_parser = input_source)]
        input: InputSource,

        /// Display intensities as well as sample names
        #[clap(long, value_parser)]
        intensities: bool,
    },

    /// Create a SIM file from a list of GTC files
    Create {
        /// File listing the GTC files to process: one path per line, or a
        /// JSON array of `{"uri": ..., "result": ...}` objects
        #[clap(value_parser = input_file)]
        input: InputFile,

        /// Output SIM file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        #[clap(flatten)]
        manifest: ManifestArgs,

        /// Store normalized float intensities instead of raw integer ones
        #[clap(long, value_parser)]
        normalize: bool,
    },

    /// Write a final call report for a list of GTC files
    Fcr {
        /// File listing the GTC files to process: one path per line, or a
        /// JSON array of `{"uri": ..., "result": ...}` objects
        #[clap(value_parser = input_file)]
        input: InputFile,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        #[clap(flatten)]
        manifest: ManifestArgs,

        /// EGT cluster file path
        #[clap(short, long, value_parser = input_file)]
        egt: InputFile,

        /// Compress the report with gzip
        #[clap(long, value_parser)]
        gzip: bool,
    },

    /// Compute per-sample QC metrics from a SIM file
    Qc {
        /// Input SIM file; the metrics need several passes, so the standard
        /// input cannot be used
        #[clap(value_parser = input_file)]
        input: InputFile,

        /// Output file for the sample magnitude (normalized by probe)
        #[clap(long, value_parser, required_unless_present = "xydiff")]
        magnitude: Option<PathBuf>,

        /// Output file for the XY intensity difference
        #[clap(long, value_parser)]
        xydiff: Option<PathBuf>,
    },

    /// Rewrite a manifest in the canonical 9-column layout
    NormalizeManifest {
        #[clap(flatten)]
        manifest: ManifestArgs,

        /// Output file path; `-` is the standard output
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,

        /// Keep only the probes on given chromosome (`MT` for mitochondrial
        /// probes)
        #[clap(long, value_parser)]
        chromosome: Option<String>,

        /// Skip CNV probes
        #[clap(long, value_parser)]
        exclude_cnvs: bool,
    },
}
