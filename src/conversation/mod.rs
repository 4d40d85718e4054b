//! Guided conversation that collects a number list and output parameters.
//!
//! A user moves through a fixed sequence of steps (file, file count, per-file
//! count, name prefix, base file name); each step validates its input before
//! the session advances. The last step partitions the numbers into card files
//! and hands them to the channel.

pub mod engine;
pub mod gate;
pub mod input;
pub mod prompts;
pub mod state;
pub mod store;
pub mod transition;

pub use engine::ConversationEngine;
pub use gate::AvailabilityGate;
pub use state::{ConversationPhase, Session, SessionState};
pub use store::{SessionStore, spawn_expiry_task};
pub use transition::{Step, Submission};
