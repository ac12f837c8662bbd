//! 本地存储 - 业务能力层
//!
//! 只负责"按 key 读写"能力。引擎启动时从这里读出累计分数，之后每次变化写回

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

/// 累计分数
pub const SCORE_KEY: &str = "megaEthTriviaScore";
/// 解锁标记（只会从 false 变成 true）
pub const UNLOCK_KEY: &str = "megaEthTriviaUnlocked";
/// 钱包提交标记
pub const WALLET_SUBMITTED_KEY: &str = "megaEthTriviaWalletSubmitted";

/// 达到该分数后可以提交钱包地址领取奖励
pub const REWARD_THRESHOLD: u64 = 100;

/// 存储的值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreValue {
    Bool(bool),
    Int(u64),
}

impl StoreValue {
    pub fn as_int(self) -> Option<u64> {
        match self {
            StoreValue::Int(v) => Some(v),
            StoreValue::Bool(_) => None,
        }
    }

    pub fn as_bool(self) -> Option<bool> {
        match self {
            StoreValue::Bool(v) => Some(v),
            StoreValue::Int(_) => None,
        }
    }
}

/// 键值存储
pub trait ScoreStore: Send {
    fn get(&self, key: &str) -> Option<StoreValue>;
    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError>;
}

/// 内存存储，进程退出即丢失
#[derive(Debug, Default, Clone)]
pub struct MemoryScoreStore {
    values: BTreeMap<String, StoreValue>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreStore for MemoryScoreStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// TOML 文件存储，每次写入都落盘
#[derive(Debug)]
pub struct TomlScoreStore {
    path: PathBuf,
    values: BTreeMap<String, StoreValue>,
}

impl TomlScoreStore {
    /// 打开存储文件，不存在时从空表开始
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let display = path.display().to_string();

        let values = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
                path: display.clone(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| StoreError::Parse {
                path: display,
                source,
            })?
        } else {
            BTreeMap::new()
        };

        debug!("已打开存储文件 {}，共 {} 项", path.display(), values.len());

        Ok(Self { path, values })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let content = toml::to_string(&self.values)?;
        std::fs::write(&self.path, content).map_err(|source| StoreError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

impl ScoreStore for TomlScoreStore {
    fn get(&self, key: &str) -> Option<StoreValue> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// 进度簿：在键值存储之上提供带类型的读写
pub struct ProgressBook {
    store: Box<dyn ScoreStore>,
}

impl ProgressBook {
    pub fn new(store: Box<dyn ScoreStore>) -> Self {
        Self { store }
    }

    /// 累计分数，缺失或类型不对时视为 0
    pub fn cumulative_score(&self) -> u64 {
        self.store
            .get(SCORE_KEY)
            .and_then(StoreValue::as_int)
            .unwrap_or(0)
    }

    pub fn save_score(&mut self, score: u64) -> Result<(), StoreError> {
        self.store.set(SCORE_KEY, StoreValue::Int(score))
    }

    pub fn is_unlocked(&self) -> bool {
        self.flag(UNLOCK_KEY)
    }

    /// 解锁，已解锁时不重复写入
    pub fn unlock(&mut self) -> Result<(), StoreError> {
        if self.is_unlocked() {
            return Ok(());
        }
        self.store.set(UNLOCK_KEY, StoreValue::Bool(true))
    }

    pub fn wallet_submitted(&self) -> bool {
        self.flag(WALLET_SUBMITTED_KEY)
    }

    pub fn mark_wallet_submitted(&mut self) -> Result<(), StoreError> {
        self.store.set(WALLET_SUBMITTED_KEY, StoreValue::Bool(true))
    }

    fn flag(&self, key: &str) -> bool {
        self.store
            .get(key)
            .and_then(StoreValue::as_bool)
            .unwrap_or(false)
    }
}
