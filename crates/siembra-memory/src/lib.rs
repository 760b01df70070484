//! SQLite-backed persistence for the Siembra learning platform.

pub mod seed;
pub mod store;
pub mod types;

pub use store::{AdvanceOutcome, Store};
pub use types::{Course, Enrollment, LoggedMessage, Module, Student};
