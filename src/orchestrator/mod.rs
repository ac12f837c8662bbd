//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把状态机、倒计时器、拉题服务、进度簿串起来，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_engine` - 会话引擎
//! - 单一事件队列，所有输入按顺序处理
//! - 启动 / 取消后台任务（拉题、倒计时、停留）
//! - 分数落盘
//! - 发布 `SessionSnapshot`
//!
//! ## 层次关系
//!
//! ```text
//! session_engine (事件队列 + 后台任务)
//!     ↓
//! workflow::SessionMachine (阶段与计分)
//!     ↓
//! services (能力层：fetch / retry / store)
//!     ↓
//! infrastructure (基础设施：RoundTimer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **串行处理**：同一时刻只有一个事件在处理
//! 2. **资源隔离**：只有编排层持有计时器和后台任务句柄
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：判分、阶段切换都交给状态机

pub mod session_engine;

// 重新导出主要类型
pub use session_engine::{ConfigChange, SessionEngine, SessionHandle, SessionSnapshot};
