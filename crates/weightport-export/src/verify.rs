//! Reads an output directory back the way the consumer would and checks
//! that every file has the length its metadata line implies.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{ensure, Context, Result};
use weightport_core::{LayerKind, ALEXNET_LAYERS, METADATA_FILE_NAME};

use crate::{read_metadata, LayerFiles, MetadataEntry};

const F32_BYTES: u64 = std::mem::size_of::<f32>() as u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerCheck {
    pub name: String,
    pub kind: LayerKind,
    pub dims: Vec<usize>,
    pub weight_bytes: u64,
    pub bias_bytes: u64,
    pub combined_bytes: u64,
}

/// Verifies metadata completeness and every layer's three files.
///
/// Checks are returned in metadata order.
pub fn verify_output(dir: &Path) -> Result<Vec<LayerCheck>> {
    let entries = read_metadata(&dir.join(METADATA_FILE_NAME))?;
    for spec in &ALEXNET_LAYERS {
        ensure!(
            entries.iter().any(|e| e.name == spec.name),
            "metadata is missing layer {}",
            spec.name
        );
    }

    entries.iter().map(|entry| verify_layer(dir, entry)).collect()
}

fn verify_layer(dir: &Path, entry: &MetadataEntry) -> Result<LayerCheck> {
    let files = LayerFiles::new(dir, &entry.name);

    let weight_bytes = file_len(&files.weights)?;
    let bias_bytes = file_len(&files.bias)?;
    let combined_bytes = file_len(&files.combined)?;

    let expected_weight = entry.weight_numel() as u64 * F32_BYTES;
    let expected_bias = entry.bias_numel() as u64 * F32_BYTES;
    ensure!(
        weight_bytes == expected_weight,
        "{} is {weight_bytes} bytes, metadata implies {expected_weight}",
        files.weights.display()
    );
    ensure!(
        bias_bytes == expected_bias,
        "{} is {bias_bytes} bytes, metadata implies {expected_bias}",
        files.bias.display()
    );
    ensure!(
        combined_bytes == weight_bytes + bias_bytes,
        "{} is {combined_bytes} bytes, expected {}",
        files.combined.display(),
        weight_bytes + bias_bytes
    );
    ensure!(
        is_concatenation(&files.combined, &[&files.weights, &files.bias])?,
        "{} is not the weights file followed by the bias file",
        files.combined.display()
    );

    Ok(LayerCheck {
        name: entry.name.clone(),
        kind: entry.kind,
        dims: entry.dims.clone(),
        weight_bytes,
        bias_bytes,
        combined_bytes,
    })
}

fn file_len(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)
        .with_context(|| format!("missing {}", path.display()))?
        .len())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// True if `whole` is byte-for-byte the parts in order (lengths checked by the caller).
fn is_concatenation(whole: &Path, parts: &[&Path]) -> Result<bool> {
    let mut whole_reader = open(whole)?;
    let mut part_buf = vec![0u8; 64 * 1024];
    let mut whole_buf = vec![0u8; 64 * 1024];

    for part in parts {
        let mut part_reader = open(part)?;
        loop {
            let n = part_reader
                .read(&mut part_buf)
                .with_context(|| format!("failed to read {}", part.display()))?;
            if n == 0 {
                break;
            }
            whole_reader
                .read_exact(&mut whole_buf[..n])
                .with_context(|| format!("failed to read {}", whole.display()))?;
            if part_buf[..n] != whole_buf[..n] {
                return Ok(false);
            }
        }
    }

    Ok(true)
}
