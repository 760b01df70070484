//! Core types shared across the Siembra workspace.

pub mod config;
pub mod error;
pub mod markers;
pub mod message;
pub mod phone;
pub mod traits;

pub use config::Config;
pub use error::SiembraError;
