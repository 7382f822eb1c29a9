/// Where a model provider gets its parameters from.
#[derive(Clone, Debug)]
pub enum ModelArtifact {
    /// A torchvision AlexNet state dict saved as `.safetensors`.
    SafetensorsPath(std::path::PathBuf),
    /// Deterministic parameters with AlexNet shapes, generated from a seed.
    Synthetic { seed: u64 },
}
