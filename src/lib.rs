//! # Trivia Session
//!
//! 限时选择题答题会话：题目由 Gemini 按难度 / 数量 / 语言生成，
//! 每题倒计时，按难度计分，累计分数持久化
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有唯一的倒计时任务，只暴露能力
//! - `RoundTimer` - start / cancel，每秒回调，归零回调一次
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `QuestionFetcher` - 组装提示词、调用模型、解析题目，带指数退避重试
//! - `RetryPolicy` - 重试次数与退避时长
//! - `ProgressBook` - 累计分数 / 解锁 / 钱包标记的持久化
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一局"的阶段与计分
//! - `SessionMachine` - Config → Loading → Game → Score，同步、无 I/O
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_engine` - 单一事件队列，驱动状态机与后台任务
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{GeminiClient, GenerationTransport, TransportResponse};
pub use config::{Config, EngineSettings};
pub use error::{ConfigError, FetchError, TriviaError, TriviaResult};
pub use infrastructure::RoundTimer;
pub use models::{Difficulty, Question, QuestionBatch, SessionConfig};
pub use orchestrator::{ConfigChange, SessionEngine, SessionHandle, SessionSnapshot};
pub use services::{MemoryScoreStore, ProgressBook, QuestionFetcher, RetryPolicy, TomlScoreStore};
pub use workflow::{Phase, RoundOutcome, SessionMachine};
