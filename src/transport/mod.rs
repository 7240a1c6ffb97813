mod coupling;
mod density;
mod measure;
mod support;

pub use coupling::*;
pub use density::*;
pub use measure::*;
pub use support::*;
