use anyhow::{Context, Result};
use tracing::info;
use weightport_core::{ModelArtifact, ModelProvider, ModelSource};
use weightport_export::SyntheticSource;
use weightport_source_safetensors::SafetensorsSource;

/// Picks the source that understands `artifact` and loads a provider from it.
pub fn load_provider(artifact: &ModelArtifact, key_prefix: &str) -> Result<Box<dyn ModelProvider>> {
    match artifact {
        ModelArtifact::SafetensorsPath(_) => {
            load_with(&SafetensorsSource::with_key_prefix(key_prefix), artifact)
        }
        ModelArtifact::Synthetic { .. } => load_with(&SyntheticSource::new(), artifact),
    }
}

fn load_with<S>(source: &S, artifact: &ModelArtifact) -> Result<Box<dyn ModelProvider>>
where
    S: ModelSource,
    S::Provider: 'static,
{
    let provider = source
        .load(artifact)
        .with_context(|| format!("{} source failed to load the model", source.name()))?;
    info!(source = source.name(), "model loaded");
    Ok(Box::new(provider))
}
