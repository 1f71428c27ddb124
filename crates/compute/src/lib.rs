pub mod analysis;
pub mod classifier;
pub mod dataview;
pub mod error;
pub mod stats;
pub mod style;

pub use classifier::*;
pub use error::*;
pub use stats::*;
