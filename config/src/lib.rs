//! Configuration types and loading for the inventory synchronization services.

pub mod environment;
mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config, load_config_from};
