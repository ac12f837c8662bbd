//! 错误类型
//!
//! - `ConfigError`：会话参数不合法，同步返回，会话不前进
//! - `AttemptError`：单次拉题失败，由重试循环吸收
//! - `FetchError`：所有尝试用尽后的最终失败
//! - `StoreError`：本地存储读写失败

use thiserror::Error;

/// 会话参数错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 题目数量不足
    #[error("题目数量至少为 {min}，当前为 {actual}")]
    TooFewQuestions { min: u32, actual: u32 },

    /// 题目数量不在可选范围内
    #[error("题目数量 {actual} 不在可选范围 {allowed:?} 内")]
    UnsupportedQuestionCount { actual: u32, allowed: &'static [u32] },

    /// 未选择任何分类
    #[error("至少需要选择一个分类")]
    NoCategory,

    /// 分类处于锁定状态
    #[error("分类已锁定: {0}")]
    CategoryLocked(String),

    /// 分类不存在
    #[error("未知分类: {0}")]
    UnknownCategory(String),

    /// 目标语言为空或不支持
    #[error("不支持的输出语言: '{0}'")]
    UnsupportedLanguage(String),

    /// 未配置 API Key
    #[error("缺少 API Key，请设置 GEMINI_API_KEY 环境变量")]
    MissingApiKey,

    /// 当前阶段不允许该操作
    #[error("当前阶段 ({phase}) 不允许修改配置")]
    NotInConfigPhase { phase: &'static str },
}

/// 单次拉题失败（可重试）
#[derive(Debug, Error)]
pub enum AttemptError {
    /// 网络请求失败
    #[error("网络请求失败: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 服务返回非成功状态码
    #[error("API 返回错误状态码: {status}")]
    BadStatus { status: u16 },

    /// 响应外层结构无法解析
    #[error("响应结构解析失败: {0}")]
    Envelope(#[source] serde_json::Error),

    /// 响应中没有生成的文本
    #[error("API 未返回有效的 JSON 内容")]
    MissingPayload,

    /// 生成的文本不是题目数组
    #[error("生成的内容不是合法的题目数组: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    /// 题目数组为空
    #[error("API 生成的题目数组为空")]
    EmptyBatch,
}

impl AttemptError {
    /// 包装任意传输层错误
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AttemptError::Transport(Box::new(source))
    }
}

/// 拉题最终失败
#[derive(Debug, Error)]
pub enum FetchError {
    /// 重试次数用尽，携带最后一次的失败原因
    #[error("生成题目失败（已尝试 {attempts} 次）: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptError,
    },
}

impl FetchError {
    /// 最后一次尝试的失败原因
    pub fn last_cause(&self) -> &AttemptError {
        match self {
            FetchError::Exhausted { last, .. } => last,
        }
    }

    /// 给玩家看的提示
    pub fn display_message(&self) -> String {
        format!("题目生成失败: {}。请重试。", self.last_cause())
    }
}

/// 本地存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("读取存储文件失败 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("写入存储文件失败 ({path}): {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("存储文件解析失败 ({path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("存储内容序列化失败: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum TriviaError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error("拉题错误: {0}")]
    Fetch(#[from] FetchError),

    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// 会话引擎已停止
    #[error("会话引擎已停止")]
    EngineStopped,
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type TriviaResult<T> = Result<T, TriviaError>;
