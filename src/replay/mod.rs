pub mod client;
pub mod error;
pub mod retry;

pub use client::{BlockSelector, ReplayClient};
pub use error::ReplayError;
pub use retry::RetryPolicy;
