//! Raw f32 writers.
//!
//! Files carry no header, length prefix or shape; the metadata index is the
//! only place shapes are recorded. Elements are little-endian f32 in
//! row-major order.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use weightport_core::{ExportError, ExportResult, Shape, ShapeViolation, Tensor};

use crate::PreparedLayer;

/// The three files written for one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerFiles {
    pub weights: PathBuf,
    pub bias: PathBuf,
    pub combined: PathBuf,
}

impl LayerFiles {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            weights: dir.join(format!("{name}.bin")),
            bias: dir.join(format!("{name}_bias.bin")),
            combined: dir.join(format!("{name}_combined.bin")),
        }
    }
}

/// Byte counts of one layer's files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WrittenLayer {
    pub weight_bytes: u64,
    pub bias_bytes: u64,
    pub combined_bytes: u64,
}

impl WrittenLayer {
    pub fn total(&self) -> u64 {
        self.weight_bytes + self.bias_bytes + self.combined_bytes
    }
}

/// Writes the tensors back to back into `path`, creating or truncating it.
///
/// The parent directory must already exist.
pub fn write_tensors(path: &Path, tensors: &[&Tensor]) -> ExportResult<u64> {
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let mut written = 0u64;
    for tensor in tensors {
        out.write_all(&tensor.data)
            .map_err(|e| ExportError::io(path, e))?;
        written += tensor.data.len() as u64;
    }
    out.flush().map_err(|e| ExportError::io(path, e))?;
    debug!(path = %path.display(), bytes = written, "wrote file");
    Ok(written)
}

pub fn write_tensor(path: &Path, tensor: &Tensor) -> ExportResult<u64> {
    write_tensors(path, &[tensor])
}

/// Weights immediately followed by bias, no separator.
pub fn write_combined(path: &Path, weight: &Tensor, bias: &Tensor) -> ExportResult<u64> {
    write_tensors(path, &[weight, bias])
}

/// Writes the weights, bias and combined files of one prepared layer.
pub fn write_layer(dir: &Path, name: &str, layer: &PreparedLayer) -> ExportResult<WrittenLayer> {
    let files = LayerFiles::new(dir, name);

    let weight_bytes = write_tensor(&files.weights, &layer.weight)?;
    let bias_bytes = write_tensor(&files.bias, &layer.bias)?;
    let combined_bytes = write_combined(&files.combined, &layer.weight, &layer.bias)?;

    let expected = (layer.weight.dense_byte_len() + layer.bias.dense_byte_len()) as u64;
    if combined_bytes != expected || combined_bytes != weight_bytes + bias_bytes {
        return Err(ExportError::shape(
            name,
            ShapeViolation::ByteLength {
                shape: Shape::from_slice(&[layer.weight.numel() + layer.bias.numel()]),
                expected: expected as usize,
                got: combined_bytes as usize,
            },
        ));
    }

    Ok(WrittenLayer {
        weight_bytes,
        bias_bytes,
        combined_bytes,
    })
}
