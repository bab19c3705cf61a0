pub mod config;
pub mod controller;
pub mod events;
mod error;
pub mod http;
pub mod kubernetes;
pub mod metrics;
pub mod task;
pub mod tls;

pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) mod test_util;
