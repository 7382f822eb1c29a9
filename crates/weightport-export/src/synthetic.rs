//! Deterministic stand-in parameters with torchvision AlexNet shapes.
//!
//! Lets a consumer be exercised end to end without a downloaded model. The
//! values are uniform in `[-0.05, 0.05)` and depend only on the seed.

use anyhow::{bail, Result};
use weightport_core::{InMemoryProvider, ModelArtifact, ModelSource, Shape, Tensor};

/// Weight shapes of torchvision's AlexNet, in export order.
pub const ALEXNET_WEIGHT_SHAPES: [(&str, &[usize]); 8] = [
    ("conv1", &[64, 3, 11, 11]),
    ("conv2", &[192, 64, 5, 5]),
    ("conv3", &[384, 192, 3, 3]),
    ("conv4", &[256, 384, 3, 3]),
    ("conv5", &[256, 256, 3, 3]),
    ("fc6", &[4096, 9216]),
    ("fc7", &[4096, 4096]),
    ("fc8", &[1000, 4096]),
];

const SCALE: f32 = 0.05;

pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSource for SyntheticSource {
    type Provider = InMemoryProvider;

    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn load(&self, artifact: &ModelArtifact) -> Result<Self::Provider> {
        let ModelArtifact::Synthetic { seed } = artifact else {
            bail!("synthetic source expects a Synthetic artifact");
        };
        Ok(synthetic_network(&ALEXNET_WEIGHT_SHAPES, *seed))
    }
}

/// Builds a provider holding seeded tensors for each `(name, weight shape)`.
pub fn synthetic_network(layers: &[(&str, &[usize])], seed: u64) -> InMemoryProvider {
    let mut rng = SmallRng::new(seed);
    let mut provider = InMemoryProvider::new();
    for (name, dims) in layers {
        let weight = random_tensor(&mut rng, Shape::from_slice(dims));
        let bias = random_tensor(&mut rng, Shape::from_slice(&dims[..1]));
        provider.insert(*name, weight, bias);
    }
    provider
}

fn random_tensor(rng: &mut SmallRng, shape: Shape) -> Tensor {
    let values: Vec<f32> = (0..shape.numel()).map(|_| rng.next_signed() * SCALE).collect();
    Tensor::from_f32(shape, &values)
}

struct SmallRng {
    state: u64,
}

impl SmallRng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        // xorshift64*
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_signed(&mut self) -> f32 {
        let bits = self.next_u64() >> 40;
        (bits as f32) / ((1u32 << 24) as f32) * 2.0 - 1.0
    }
}
