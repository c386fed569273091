pub mod hint_service;
pub mod session_service;

pub use hint_service::{HintLevelUsage, HintPreview, HintService, HintStatistics};
pub use session_service::{
    reduce, score_answer, SessionAction, SessionEngine, SessionEvent, SessionState,
};
