pub mod components;
pub mod feature;
pub mod viewport;
pub mod visibility;

pub use feature::*;
pub use viewport::*;
