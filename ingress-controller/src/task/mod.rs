pub mod queue;
pub mod rate_limit;

pub use queue::{Item, Queue};
pub use rate_limit::RateLimiter;
