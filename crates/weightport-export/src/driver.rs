use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use weightport_core::{
    ExportError, ExportResult, LayerDescriptor, LayerSpec, ModelProvider, ALEXNET_LAYERS,
    METADATA_FILE_NAME,
};

use crate::{prepare_layer, write_layer, write_metadata, LayerFiles, WrittenLayer};

/// How files reach the output directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommitMode {
    /// Write straight into the output directory. An aborted run leaves the
    /// layers it already wrote next to files from earlier runs.
    #[default]
    InPlace,
    /// Write into a sibling staging directory and move the files over only
    /// after every layer and the metadata were written.
    Staged,
}

#[derive(Clone, Debug)]
pub struct ExportedLayer {
    pub descriptor: LayerDescriptor,
    pub files: LayerFiles,
    pub written: WrittenLayer,
}

#[derive(Clone, Debug)]
pub struct ExportSummary {
    pub out_dir: PathBuf,
    pub layers: Vec<ExportedLayer>,
    pub metadata_path: PathBuf,
}

impl ExportSummary {
    pub fn bytes_written(&self) -> u64 {
        self.layers.iter().map(|l| l.written.total()).sum()
    }
}

/// Runs provider -> layout -> serializer -> metadata over a fixed layer list.
pub struct Extractor<'a> {
    provider: &'a dyn ModelProvider,
    layers: &'a [LayerSpec],
    commit: CommitMode,
}

impl<'a> Extractor<'a> {
    pub fn new(provider: &'a dyn ModelProvider) -> Self {
        Self {
            provider,
            layers: &ALEXNET_LAYERS,
            commit: CommitMode::InPlace,
        }
    }

    pub fn with_commit_mode(mut self, commit: CommitMode) -> Self {
        self.commit = commit;
        self
    }

    /// Exports every layer into `out_dir`, which must already exist.
    pub fn run(&self, out_dir: &Path) -> ExportResult<ExportSummary> {
        match self.commit {
            CommitMode::InPlace => self.write_all(out_dir),
            CommitMode::Staged => self.run_staged(out_dir),
        }
    }

    fn write_all(&self, dir: &Path) -> ExportResult<ExportSummary> {
        let mut layers = Vec::with_capacity(self.layers.len());

        for spec in self.layers {
            let params = self
                .provider
                .get_layer(spec.name)
                .map_err(|reason| ExportError::Extraction {
                    layer: spec.name.to_string(),
                    reason,
                })?;

            let prepared =
                prepare_layer(spec.kind, &params).map_err(|v| ExportError::shape(spec.name, v))?;
            let written = write_layer(dir, spec.name, &prepared)?;

            info!(
                layer = spec.name,
                weight_shape = %prepared.weight.shape(),
                bias_shape = %prepared.bias.shape(),
                bytes = written.combined_bytes,
                "saved layer"
            );

            layers.push(ExportedLayer {
                descriptor: LayerDescriptor {
                    name: spec.name.to_string(),
                    kind: spec.kind,
                    weight_shape: prepared.source_shape,
                },
                files: LayerFiles::new(dir, spec.name),
                written,
            });
        }

        let metadata_path = dir.join(METADATA_FILE_NAME);
        let descriptors: Vec<_> = layers.iter().map(|l| l.descriptor.clone()).collect();
        write_metadata(&metadata_path, &descriptors)?;
        info!(path = %metadata_path.display(), "generated metadata file");

        Ok(ExportSummary {
            out_dir: dir.to_path_buf(),
            layers,
            metadata_path,
        })
    }

    fn run_staged(&self, out_dir: &Path) -> ExportResult<ExportSummary> {
        let meta = fs::metadata(out_dir).map_err(|e| ExportError::io(out_dir, e))?;
        if !meta.is_dir() {
            return Err(ExportError::io(
                out_dir,
                std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }

        let parent = out_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let staging = tempfile::Builder::new()
            .prefix(".weightport-staging-")
            .tempdir_in(parent)
            .map_err(|e| ExportError::io(parent, e))?;

        // dropping `staging` on error removes everything written so far
        let staged = self.write_all(staging.path())?;

        let mut replaced = 0usize;
        let mut layers = Vec::with_capacity(staged.layers.len());
        for layer in staged.layers {
            let files = LayerFiles::new(out_dir, &layer.descriptor.name);
            replaced += commit_file(&layer.files.weights, &files.weights)?;
            replaced += commit_file(&layer.files.bias, &files.bias)?;
            replaced += commit_file(&layer.files.combined, &files.combined)?;
            layers.push(ExportedLayer { files, ..layer });
        }

        // metadata last, so it never describes files that were not moved yet
        let metadata_path = out_dir.join(METADATA_FILE_NAME);
        replaced += commit_file(&staged.metadata_path, &metadata_path)?;
        if replaced > 0 {
            warn!(out_dir = %out_dir.display(), replaced, "staged export replaced existing files");
        }

        Ok(ExportSummary {
            out_dir: out_dir.to_path_buf(),
            layers,
            metadata_path,
        })
    }
}

/// Moves a staged file into place; returns 1 if it replaced an existing file.
fn commit_file(from: &Path, to: &Path) -> ExportResult<usize> {
    let existed = to.exists();
    fs::rename(from, to).map_err(|e| ExportError::io(to, e))?;
    Ok(usize::from(existed))
}

/// Exports `provider` into `out_dir` with the default in-place commit.
pub fn export_network(provider: &dyn ModelProvider, out_dir: &Path) -> ExportResult<ExportSummary> {
    Extractor::new(provider).run(out_dir)
}
