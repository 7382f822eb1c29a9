use weightport_core::{DType, LayerKind, LayerParams, Shape, ShapeViolation, Tensor};

/// Flattens a convolution kernel `(M, N, K, K)` into `(M, N, K*K)`.
///
/// Kernel position `(r, c)` lands at `r*K + c`. Dense inputs are reshaped in
/// place (the storage is shared); strided inputs are gathered first.
pub fn flatten_kernel(weight: &Tensor) -> Result<Tensor, ShapeViolation> {
    let &[m, n, kh, kw] = weight.shape().dims() else {
        return Err(ShapeViolation::Rank {
            expected: 4,
            shape: weight.shape().clone(),
        });
    };
    if kh != kw {
        return Err(ShapeViolation::NonSquareKernel {
            height: kh,
            width: kw,
        });
    }
    weight.reshape(Shape::from_slice(&[m, n, kh * kw]))
}

/// A layer's tensors in the exact layout they are written in.
#[derive(Clone, Debug)]
pub struct PreparedLayer {
    /// Weight shape as the provider supplied it; this is what metadata records.
    pub source_shape: Shape,
    pub weight: Tensor,
    pub bias: Tensor,
}

/// Validates a layer's tensors against its kind and lays them out for writing.
///
/// Nothing touches the filesystem here, so a malformed layer is rejected
/// before any of its bytes are written.
pub fn prepare_layer(kind: LayerKind, params: &LayerParams) -> Result<PreparedLayer, ShapeViolation> {
    for tensor in [&params.weight, &params.bias] {
        if tensor.desc.dtype != DType::F32 {
            return Err(ShapeViolation::DType(tensor.desc.dtype));
        }
        tensor.check_storage()?;
    }

    let source_shape = params.weight.shape().clone();
    if source_shape.rank() != kind.weight_rank() {
        return Err(ShapeViolation::Rank {
            expected: kind.weight_rank(),
            shape: source_shape,
        });
    }

    let outputs = source_shape.dims()[0];
    let bias_shape = params.bias.shape();
    if bias_shape.dims() != [outputs] {
        return Err(ShapeViolation::BiasLength {
            expected: outputs,
            bias: bias_shape.clone(),
        });
    }

    let weight = match kind {
        LayerKind::Convolution => flatten_kernel(&params.weight)?,
        LayerKind::FullyConnected => params.weight.to_contiguous()?,
    };

    Ok(PreparedLayer {
        source_shape,
        weight,
        bias: params.bias.to_contiguous()?,
    })
}
