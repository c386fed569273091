//! Assessment engine core for a learning app: heterogeneous quiz types, a
//! timed answer/scoring session state machine, a hint economy with point
//! penalties, and the repository/cache contract the engine runs against.
//!
//! The presentation layer drives a [`services::SessionEngine`] and renders
//! the [`services::SessionState`] snapshots it exposes; storage, analytics,
//! and caching are injected through the traits in [`repository`].

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod utils;

pub use config::EngineConfig;
pub use error::FactoryError;
pub use models::{
    create_quiz, HintLevel, Quiz, QuizHint, QuizKind, QuizLevel, QuizResult, QuizType, UserAnswer,
};
pub use services::{SessionEngine, SessionEvent, SessionState};
