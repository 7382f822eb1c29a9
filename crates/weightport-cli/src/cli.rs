use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "weightport",
    version,
    about = "Export AlexNet parameters as raw f32 files for a framework-free inference engine"
)]
pub struct Cli {
    /// Log level (RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write every layer's weight, bias and combined files plus network_metadata.txt
    Export {
        /// torchvision AlexNet state dict saved as .safetensors
        #[arg(long, required_unless_present = "synthetic", conflicts_with = "synthetic")]
        model: Option<PathBuf>,

        /// Generate seeded parameters with AlexNet shapes instead of loading a model
        #[arg(long)]
        synthetic: bool,

        /// Seed for --synthetic
        #[arg(long, default_value_t = 17)]
        seed: u64,

        /// Prefix in front of the state-dict keys, e.g. "model."
        #[arg(long, default_value = "")]
        key_prefix: String,

        /// Output directory
        #[arg(long, default_value = "weights")]
        out_dir: PathBuf,

        /// Stage all files and move them into the output directory only if every layer succeeds
        #[arg(long)]
        staged: bool,
    },

    /// Check an output directory against its metadata
    Inspect {
        /// Directory holding network_metadata.txt and the .bin files
        #[arg(long, default_value = "weights")]
        dir: PathBuf,
    },
}
