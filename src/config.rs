use std::time::Duration;

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    // --- Gemini 配置 ---
    pub gemini_api_key: String,
    pub gemini_api_base_url: String,
    pub gemini_model_name: String,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
    // --- 拉题重试 ---
    /// 最多尝试次数（含第一次）
    pub max_fetch_attempts: u32,
    /// 退避基数（毫秒），第 n 次失败后等待 2^n * base
    pub backoff_base_ms: u64,
    // --- 答题节奏 ---
    /// 每道题的倒计时（秒）
    pub round_seconds: u32,
    /// 答题结束后展示对错的停留时间（毫秒）
    pub settle_delay_ms: u64,
    // --- 本地存储 ---
    /// 累计分数 / 解锁标记存放的 TOML 文件
    pub score_store_path: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model_name: "gemini-2.5-flash-preview-09-2025".to_string(),
            request_timeout_secs: 60,
            max_fetch_attempts: 3,
            backoff_base_ms: 1000,
            round_seconds: 20,
            settle_delay_ms: 1500,
            score_store_path: "trivia_progress.toml".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or(default.gemini_api_key),
            gemini_api_base_url: std::env::var("GEMINI_API_BASE_URL").unwrap_or(default.gemini_api_base_url),
            gemini_model_name: std::env::var("GEMINI_MODEL_NAME").unwrap_or(default.gemini_model_name),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_fetch_attempts: std::env::var("MAX_FETCH_ATTEMPTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_fetch_attempts),
            backoff_base_ms: std::env::var("BACKOFF_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.backoff_base_ms),
            round_seconds: std::env::var("ROUND_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.round_seconds),
            settle_delay_ms: std::env::var("SETTLE_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.settle_delay_ms),
            score_store_path: std::env::var("SCORE_STORE_PATH").unwrap_or(default.score_store_path),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// API Key 是否缺失（空串或仍是占位符）
    pub fn is_api_key_missing(&self) -> bool {
        let key = self.gemini_api_key.trim();
        key.is_empty() || key == "[YOUR_GEMINI_API_KEY]"
    }

    /// 引擎使用的节奏参数
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            round_seconds: self.round_seconds,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

/// 会话引擎的节奏参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    pub round_seconds: u32,
    pub settle_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Config::default().engine_settings()
    }
}
