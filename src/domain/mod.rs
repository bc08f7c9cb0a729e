//! Domain layer: models, ports, and errors — no I/O, no async runtime
//! dependency beyond the trait signatures in `ports`.

pub mod error;
pub mod models;
pub mod ports;
