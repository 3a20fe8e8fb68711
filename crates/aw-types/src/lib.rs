pub mod dataset;
pub mod errors;
pub mod risk;

pub use dataset::*;
pub use errors::*;
pub use risk::*;
