use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::{ModelArtifact, Tensor};

/// The weight and bias tensors of one layer.
#[derive(Clone, Debug)]
pub struct LayerParams {
    pub weight: Tensor,
    pub bias: Tensor,
}

/// Loads a [`ModelProvider`] from an artifact.
pub trait ModelSource {
    type Provider: ModelProvider;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Provider>;
}

/// Supplies already-trained parameters by layer name.
///
/// Object-safe so the export driver can take `&dyn ModelProvider`.
pub trait ModelProvider {
    fn get_layer(&self, name: &str) -> Result<LayerParams>;
}

impl<P: ModelProvider + ?Sized> ModelProvider for Box<P> {
    fn get_layer(&self, name: &str) -> Result<LayerParams> {
        (**self).get_layer(name)
    }
}

/// A provider backed by tensors held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryProvider {
    layers: HashMap<String, LayerParams>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            layers: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, weight: Tensor, bias: Tensor) {
        self.layers.insert(name.into(), LayerParams { weight, bias });
    }

    pub fn remove(&mut self, name: &str) -> Option<LayerParams> {
        self.layers.remove(name)
    }
}

impl ModelProvider for InMemoryProvider {
    fn get_layer(&self, name: &str) -> Result<LayerParams> {
        self.layers
            .get(name)
            .cloned()
            .with_context(|| format!("no tensors registered for layer {name}"))
    }
}
