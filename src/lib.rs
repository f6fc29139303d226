pub mod config;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod sse;

pub use config::Config;
pub use error::{AppError, Result};
pub use sse::{Broadcaster, ConnectionRegistry, StreamEvent};
