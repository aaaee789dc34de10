pub mod inflation;
pub mod static_layer;

pub use inflation::{InflationConfig, InflationLayer};
pub use static_layer::{StaticLayer, StaticMap};
