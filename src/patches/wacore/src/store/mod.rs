pub mod commands;
pub mod device;
pub mod error;
pub mod traits;

pub use commands::*;
pub use device::Device;
