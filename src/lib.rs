pub mod config;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod mqtt;
pub mod power;
pub mod ws;

// Re-export commonly used items
pub use config::{RelayConfig, WatchConfig};
pub use error::{AppError, Result};
pub use power::{Phase, PhaseReading, PowerDelta, PowerSnapshot};
pub use ws::{AppState, ClientMessage, Hub, ServerMessage};
