// Domain layer: neutral models, native handle types and ports. Provider SDK
// specifics live in adapters.

pub mod model;
pub mod native;
pub mod ports;
