//! Turn processing, session lifecycle and the pipeline host.

pub mod pipeline;
pub mod session;
pub mod turn;

pub use pipeline::run_pipeline;
pub use session::{SessionStats, VoiceAgent};
pub use turn::{AgentStats, TurnProcessor, TurnSettings};
