//! Data models

mod kind;
mod labels;
mod pod;
mod workload;

pub use kind::*;
pub use labels::*;
pub use pod::*;
pub use workload::*;
