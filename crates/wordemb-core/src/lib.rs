#![deny(unused_variables)]
#![deny(unused_imports)]

//! Shared contract, configuration and error types for the `wordemb` adapters.

pub mod config;
pub mod device;
pub mod error;
pub mod traits;

pub use device::DeviceSpec;
pub use error::{Error, Result};
pub use traits::Embedder;
