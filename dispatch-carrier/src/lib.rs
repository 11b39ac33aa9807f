pub mod client;
pub mod decode;

pub use client::{CarrierClient, CarrierConfig};
