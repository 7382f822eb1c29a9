pub mod artifact;
pub mod error;
pub mod layer;
pub mod provider;
pub mod tensor;

pub use artifact::*;
pub use error::*;
pub use layer::*;
pub use provider::*;
pub use tensor::*;
