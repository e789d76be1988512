// Session lifecycle: one self-pacing tick loop per session, plus the registry
pub mod manager;
pub mod session;

pub use manager::SessionManager;
pub use session::{BotSession, SessionConfig};
