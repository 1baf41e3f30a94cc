pub mod config;
pub mod error;
pub mod gateway;
pub mod server;
pub mod upstream;

pub use error::{Error, Result};
