pub mod driver;
pub mod layout;
pub mod metadata;
pub mod serializer;
pub mod synthetic;
pub mod verify;

pub use driver::*;
pub use layout::*;
pub use metadata::*;
pub use serializer::*;
pub use synthetic::*;
pub use verify::*;
