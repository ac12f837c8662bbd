pub mod question_fetcher;
pub mod retry_policy;
pub mod score_store;

pub use question_fetcher::QuestionFetcher;
pub use retry_policy::RetryPolicy;
pub use score_store::{MemoryScoreStore, ProgressBook, ScoreStore, StoreValue, TomlScoreStore};
