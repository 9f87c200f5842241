mod dataset;
mod region;
mod types;

pub use dataset::*;
pub use region::*;
pub use types::*;
