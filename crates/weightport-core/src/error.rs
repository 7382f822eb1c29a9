//! Error taxonomy for an export run.
//!
//! Every variant is fatal: the driver stops at the first one and the run
//! reports which layer or file failed.

use std::path::PathBuf;

use thiserror::Error;

use crate::{DType, Shape};

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// A tensor whose shape, dtype or storage breaks the assumptions of its layer.
#[derive(Debug, Error)]
pub enum ShapeViolation {
    /// The tensor does not have the rank its layer kind requires.
    #[error("expected a rank-{expected} tensor, got shape {shape}")]
    Rank {
        /// Required rank.
        expected: usize,
        /// Shape actually supplied.
        shape: Shape,
    },

    /// Convolution kernels must be square.
    #[error("kernel is not square: {height}x{width}")]
    NonSquareKernel {
        /// Kernel height.
        height: usize,
        /// Kernel width.
        width: usize,
    },

    /// Only 32-bit floats are serialized.
    #[error("expected f32 elements, got {0:?}")]
    DType(DType),

    /// The bias does not carry one value per output channel.
    #[error("bias shape {bias} does not match {expected} output channels")]
    BiasLength {
        /// Output channels (or features) of the weight tensor.
        expected: usize,
        /// Bias shape actually supplied.
        bias: Shape,
    },

    /// The storage buffer cannot back the described shape.
    #[error("shape {shape} needs {expected} bytes of storage, got {got}")]
    ByteLength {
        /// Shape of the tensor.
        shape: Shape,
        /// Bytes required.
        expected: usize,
        /// Bytes available.
        got: usize,
    },

    /// Stride vector length differs from the rank.
    #[error("shape {shape} has {strides} strides")]
    StrideRank {
        /// Shape of the tensor.
        shape: Shape,
        /// Number of strides supplied.
        strides: usize,
    },

    /// A reshape changed the element count.
    #[error("cannot reshape {from} into {to}")]
    Reshape {
        /// Source shape.
        from: Shape,
        /// Requested shape.
        to: Shape,
    },
}

/// Errors that abort an export run.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The provider could not supply a layer's tensors.
    #[error("failed to extract layer {layer}: {reason:#}")]
    Extraction {
        /// Layer that could not be extracted.
        layer: String,
        /// Provider-side failure.
        reason: anyhow::Error,
    },

    /// A layer's tensors violate the shape contract.
    #[error("shape check failed for layer {layer}: {violation}")]
    Shape {
        /// Offending layer.
        layer: String,
        /// What was wrong.
        #[source]
        violation: ShapeViolation,
    },

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Create a `Shape` error for `layer`.
    pub fn shape(layer: impl Into<String>, violation: ShapeViolation) -> Self {
        Self::Shape {
            layer: layer.into(),
            violation,
        }
    }

    /// Create an `Io` error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
