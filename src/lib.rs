// File: src/lib.rs

pub mod core;
pub mod overlay;
pub mod profile;
pub mod c_api;

pub use crate::core::engine::{BrailleEngine, EmitError, EngineConfig, Host, Position};
pub use crate::core::types::Mode;
