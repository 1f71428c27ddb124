pub mod error;
pub mod generator;
pub mod layer;
pub mod query;
pub mod source;
pub mod symbology;
pub mod tile;

pub use error::*;
pub use generator::*;
pub use layer::*;
pub use source::*;
pub use tile::*;
