pub mod difficulty;
pub mod generation;
pub mod language;
pub mod question;
pub mod session_config;

pub use difficulty::Difficulty;
pub use generation::{GenerationRequest, GenerationResponse};
pub use question::{Question, QuestionBatch};
pub use session_config::{SessionConfig, FIXED_CATEGORY, MIN_QUESTIONS, QUESTION_COUNTS};
