// Core modules
pub mod config;
pub mod engine;
pub mod gateway;
pub mod indicators;
pub mod models;
pub mod rules;
pub mod session;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{PriceContext, PriceTracker};
pub use gateway::{HttpGateway, MarketGateway};
pub use models::*;
pub use rules::StrategyEvaluator;
pub use session::{BotSession, SessionConfig, SessionManager};
