// Domain layer: annotation models and ports (interfaces). Backends live under adapters.

pub mod model;
pub mod ports;
pub mod web_annotation;
