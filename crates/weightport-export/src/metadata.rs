use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use tracing::debug;
use weightport_core::{layer_spec, ExportError, ExportResult, LayerDescriptor, LayerKind};

/// `conv1 96 3 11` or `fc6 4096 9216`.
pub fn metadata_line(layer: &LayerDescriptor) -> String {
    let dims: Vec<String> = layer.metadata_dims().iter().map(|d| d.to_string()).collect();
    format!("{} {}", layer.name, dims.join(" "))
}

pub fn render_metadata(layers: &[LayerDescriptor]) -> String {
    let mut text = String::new();
    for layer in layers {
        text.push_str(&metadata_line(layer));
        text.push('\n');
    }
    text
}

/// Writes one line per layer, in the order given.
pub fn write_metadata(path: &Path, layers: &[LayerDescriptor]) -> ExportResult<()> {
    fs::write(path, render_metadata(layers)).map_err(|e| ExportError::io(path, e))?;
    debug!(path = %path.display(), lines = layers.len(), "wrote metadata");
    Ok(())
}

/// One parsed metadata line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataEntry {
    pub name: String,
    pub kind: LayerKind,
    pub dims: Vec<usize>,
}

impl MetadataEntry {
    /// Element count of the serialized weight tensor.
    pub fn weight_numel(&self) -> usize {
        match (self.kind, self.dims.as_slice()) {
            (LayerKind::Convolution, [m, n, k]) => m * n * k * k,
            _ => self.dims.iter().product(),
        }
    }

    pub fn bias_numel(&self) -> usize {
        self.dims.first().copied().unwrap_or(0)
    }
}

/// Parses metadata the way the consumer does: leading name token, then
/// integers. Blank lines are skipped; names must be known and unique.
pub fn parse_metadata(text: &str) -> Result<Vec<MetadataEntry>> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };

        let Some(spec) = layer_spec(name) else {
            bail!("line {lineno}: unknown layer {name}");
        };
        ensure!(seen.insert(name.to_string()), "line {lineno}: duplicate layer {name}");

        let dims = tokens
            .map(|t| {
                t.parse::<usize>()
                    .with_context(|| format!("line {lineno}: invalid dimension {t:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        ensure!(
            dims.len() == spec.kind.metadata_arity(),
            "line {lineno}: {name} expects {} dimensions, got {}",
            spec.kind.metadata_arity(),
            dims.len()
        );

        entries.push(MetadataEntry {
            name: name.to_string(),
            kind: spec.kind,
            dims,
        });
    }

    Ok(entries)
}

pub fn read_metadata(path: &Path) -> Result<Vec<MetadataEntry>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_metadata(&text)
}
