use crate::Shape;

/// Name of the text index written next to the binary files.
pub const METADATA_FILE_NAME: &str = "network_metadata.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Weights `(M, N, K, K)`, bias `(M,)`.
    Convolution,
    /// Weights `(out_features, in_features)`, bias `(out_features,)`.
    FullyConnected,
}

impl LayerKind {
    /// Rank of the weight tensor as the provider supplies it.
    pub fn weight_rank(self) -> usize {
        match self {
            LayerKind::Convolution => 4,
            LayerKind::FullyConnected => 2,
        }
    }

    /// Number of integers following the name on a metadata line.
    pub fn metadata_arity(self) -> usize {
        match self {
            LayerKind::Convolution => 3,
            LayerKind::FullyConnected => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerSpec {
    pub name: &'static str,
    pub kind: LayerKind,
}

const fn conv(name: &'static str) -> LayerSpec {
    LayerSpec {
        name,
        kind: LayerKind::Convolution,
    }
}

const fn fc(name: &'static str) -> LayerSpec {
    LayerSpec {
        name,
        kind: LayerKind::FullyConnected,
    }
}

/// The parameterised layers of AlexNet, in export order.
pub const ALEXNET_LAYERS: [LayerSpec; 8] = [
    conv("conv1"),
    conv("conv2"),
    conv("conv3"),
    conv("conv4"),
    conv("conv5"),
    fc("fc6"),
    fc("fc7"),
    fc("fc8"),
];

/// Looks up a fixed layer by name.
pub fn layer_spec(name: &str) -> Option<LayerSpec> {
    ALEXNET_LAYERS.iter().copied().find(|l| l.name == name)
}

/// One extracted layer: its name, kind and weight shape before flattening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub name: String,
    pub kind: LayerKind,
    pub weight_shape: Shape,
}

impl LayerDescriptor {
    /// Dimensions written to the metadata line.
    ///
    /// Convolutions write `M N K` (the square kernel side, not `K*K`);
    /// fully-connected layers write `out in`.
    pub fn metadata_dims(&self) -> &[usize] {
        let dims = self.weight_shape.dims();
        &dims[..self.kind.metadata_arity().min(dims.len())]
    }

    /// Weight shape as serialized: `(M, N, K*K)` for convolutions.
    pub fn serialized_weight_shape(&self) -> Shape {
        match (self.kind, self.weight_shape.dims()) {
            (LayerKind::Convolution, [m, n, k, w]) => Shape::from_slice(&[*m, *n, k * w]),
            _ => self.weight_shape.clone(),
        }
    }
}
