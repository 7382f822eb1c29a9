mod cli;
mod sources;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use tracing::info;
use tracing_subscriber::EnvFilter;
use weightport_core::ModelArtifact;
use weightport_export::{verify_output, CommitMode, Extractor};

fn main() -> Result<()> {
    let cli = Cli::parse();

    std::env::set_var("RUST_LOG", &cli.log);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match cli.command {
        Command::Export {
            model,
            synthetic: _,
            seed,
            key_prefix,
            out_dir,
            staged,
        } => {
            // clap guarantees --model or --synthetic, never both
            let artifact = match model {
                Some(path) => ModelArtifact::SafetensorsPath(path),
                None => ModelArtifact::Synthetic { seed },
            };
            let commit = if staged {
                CommitMode::Staged
            } else {
                CommitMode::InPlace
            };
            export(&artifact, &key_prefix, out_dir, commit)
        }
        Command::Inspect { dir } => inspect(&dir),
    }
}

fn export(
    artifact: &ModelArtifact,
    key_prefix: &str,
    out_dir: PathBuf,
    commit: CommitMode,
) -> Result<()> {
    let provider = sources::load_provider(artifact, key_prefix)?;

    if !out_dir.is_dir() {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        info!(dir = %out_dir.display(), "created directory");
    }

    let summary = Extractor::new(provider.as_ref())
        .with_commit_mode(commit)
        .run(&out_dir)
        .context("weight export aborted")?;

    info!(
        layers = summary.layers.len(),
        bytes = summary.bytes_written(),
        out_dir = %summary.out_dir.display(),
        "weight extraction complete"
    );
    Ok(())
}

fn inspect(dir: &Path) -> Result<()> {
    let checks = verify_output(dir)
        .with_context(|| format!("{} failed verification", dir.display()))?;

    println!(
        "{:<6} {:<18} {:>12} {:>10} {:>12}",
        "layer", "dims", "weights", "bias", "combined"
    );
    for check in &checks {
        let dims = check
            .dims
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("x");
        println!(
            "{:<6} {:<18} {:>12} {:>10} {:>12}",
            check.name, dims, check.weight_bytes, check.bias_bytes, check.combined_bytes
        );
    }
    info!(layers = checks.len(), dir = %dir.display(), "output directory is consistent");
    Ok(())
}
