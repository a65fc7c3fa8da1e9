pub mod cli;
pub mod config;
pub mod encode;
pub mod highlight;
pub mod processor;
pub mod sidecar;
mod utils;
pub mod vision;
pub mod walker;

pub use config::{Config, Opts};
