use std::collections::HashMap;
use std::ops::Range;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use safetensors::{Dtype, SafeTensors};
use tracing::{debug, info};
use weightport_core::{
    DType, LayerParams, ModelArtifact, ModelProvider, ModelSource, Shape, Tensor,
};

/// State-dict prefix of each exported layer in torchvision's AlexNet.
pub const TORCHVISION_ALEXNET_KEYS: [(&str, &str); 8] = [
    ("conv1", "features.0"),
    ("conv2", "features.3"),
    ("conv3", "features.6"),
    ("conv4", "features.8"),
    ("conv5", "features.10"),
    ("fc6", "classifier.1"),
    ("fc7", "classifier.4"),
    ("fc8", "classifier.6"),
];

pub struct SafetensorsSource {
    key_prefix: String,
}

impl SafetensorsSource {
    pub fn new() -> Self {
        Self {
            key_prefix: String::new(),
        }
    }

    /// For state dicts saved from a wrapper, e.g. `"model."`.
    pub fn with_key_prefix(prefix: impl Into<String>) -> Self {
        Self {
            key_prefix: prefix.into(),
        }
    }
}

impl Default for SafetensorsSource {
    fn default() -> Self {
        Self::new()
    }
}

struct Entry {
    dtype: std::result::Result<DType, Dtype>,
    shape: Shape,
    range: Range<usize>,
}

/// Tensors of one `.safetensors` file, sliced out of a single shared buffer.
pub struct SafetensorsModel {
    buffer: Bytes,
    entries: HashMap<String, Entry>,
    key_prefix: String,
}

impl ModelSource for SafetensorsSource {
    type Provider = SafetensorsModel;

    fn name(&self) -> &'static str {
        "safetensors"
    }

    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Provider> {
        let ModelArtifact::SafetensorsPath(path) = artifact else {
            bail!("safetensors source expects a .safetensors file path");
        };

        let buffer = Bytes::from(
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        );
        let model = SafetensorsModel::from_bytes(buffer, &self.key_prefix)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        info!(
            path = %path.display(),
            tensors = model.entries.len(),
            "loaded safetensors model"
        );
        Ok(model)
    }
}

impl SafetensorsModel {
    pub fn from_bytes(buffer: Bytes, key_prefix: &str) -> Result<Self> {
        let entries = {
            let parsed = SafeTensors::deserialize(&buffer).context("invalid safetensors data")?;
            let base = buffer.as_ptr() as usize;

            parsed
                .tensors()
                .into_iter()
                .map(|(name, view)| {
                    let start = view.data().as_ptr() as usize - base;
                    let entry = Entry {
                        dtype: st_dtype_to_dtype(view.dtype()),
                        shape: Shape::from_slice(view.shape()),
                        range: start..start + view.data().len(),
                    };
                    (name, entry)
                })
                .collect::<HashMap<_, _>>()
        };

        Ok(Self {
            buffer,
            entries,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn tensor(&self, key: &str) -> Result<Tensor> {
        let entry = self
            .entries
            .get(key)
            .with_context(|| format!("tensor {key} not found"))?;
        let dtype = match entry.dtype {
            Ok(dtype) => dtype,
            Err(raw) => bail!("tensor {key} has unsupported dtype {raw:?}"),
        };
        if dtype != DType::F32 {
            bail!("tensor {key} is {dtype:?}, expected F32");
        }
        debug!(key, shape = %entry.shape, "sliced tensor");
        Ok(Tensor::from_bytes(
            dtype,
            entry.shape.clone(),
            self.buffer.slice(entry.range.clone()),
        ))
    }
}

impl ModelProvider for SafetensorsModel {
    fn get_layer(&self, name: &str) -> Result<LayerParams> {
        let Some((_, module)) = TORCHVISION_ALEXNET_KEYS.iter().find(|(layer, _)| *layer == name)
        else {
            bail!("no state-dict mapping for layer {name}");
        };

        let prefix = &self.key_prefix;
        Ok(LayerParams {
            weight: self.tensor(&format!("{prefix}{module}.weight"))?,
            bias: self.tensor(&format!("{prefix}{module}.bias"))?,
        })
    }
}

fn st_dtype_to_dtype(dtype: Dtype) -> std::result::Result<DType, Dtype> {
    match dtype {
        Dtype::F32 => Ok(DType::F32),
        Dtype::F16 => Ok(DType::F16),
        Dtype::I64 => Ok(DType::I64),
        Dtype::I32 => Ok(DType::I32),
        Dtype::U8 => Ok(DType::U8),
        other => Err(other),
    }
}
