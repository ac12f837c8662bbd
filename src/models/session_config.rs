//! 会话参数（难度 / 题目数量 / 输出语言 / 分类）

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::difficulty::Difficulty;
use crate::models::language::{self, DEFAULT_LANGUAGE};

/// 最少题目数量
pub const MIN_QUESTIONS: u32 = 5;

/// 可选的题目数量
pub const QUESTION_COUNTS: &[u32] = &[5, 10, 15, 20];

/// 全部分类（界面展示用）
pub const CATEGORIES: &[&str] = &[
    "Blockchain Basics",
    "Ethereum",
    "Layer 1 Concepts",
    "Layer 2 Rollups",
    "MegaETH Architecture",
];

/// 唯一可选的分类，其余分类处于锁定状态
pub const FIXED_CATEGORY: &str = "MegaETH Architecture";

/// 分类是否可选，目前只开放固定分类
pub fn is_category_selectable(category: &str) -> bool {
    category == FIXED_CATEGORY
}

/// 会话参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub difficulty: Difficulty,
    pub num_questions: u32,
    pub target_language: String,
    pub categories: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            num_questions: 10,
            target_language: DEFAULT_LANGUAGE.to_string(),
            categories: vec![FIXED_CATEGORY.to_string()],
        }
    }
}

impl SessionConfig {
    /// 创建指定难度 / 数量 / 语言的配置，分类固定
    pub fn new(difficulty: Difficulty, num_questions: u32, target_language: impl Into<String>) -> Self {
        Self {
            difficulty,
            num_questions,
            target_language: target_language.into(),
            categories: vec![FIXED_CATEGORY.to_string()],
        }
    }

    /// 修改题目数量，只接受可选范围内的值
    pub fn set_num_questions(&mut self, count: u32) -> Result<(), ConfigError> {
        if !QUESTION_COUNTS.contains(&count) {
            return Err(ConfigError::UnsupportedQuestionCount {
                actual: count,
                allowed: QUESTION_COUNTS,
            });
        }
        self.num_questions = count;
        Ok(())
    }

    /// 修改输出语言，只接受支持列表中的语言代码
    pub fn set_target_language(&mut self, code: &str) -> Result<(), ConfigError> {
        if !language::is_supported(code) {
            return Err(ConfigError::UnsupportedLanguage(code.to_string()));
        }
        self.target_language = code.to_string();
        Ok(())
    }

    /// 选择分类
    ///
    /// 除固定分类外都处于锁定状态
    pub fn select_category(&mut self, category: &str) -> Result<(), ConfigError> {
        if !CATEGORIES.contains(&category) {
            return Err(ConfigError::UnknownCategory(category.to_string()));
        }
        if !is_category_selectable(category) {
            return Err(ConfigError::CategoryLocked(category.to_string()));
        }
        if !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
        Ok(())
    }

    /// 开始会话前的校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_questions < MIN_QUESTIONS {
            return Err(ConfigError::TooFewQuestions {
                min: MIN_QUESTIONS,
                actual: self.num_questions,
            });
        }
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategory);
        }
        if self.target_language.trim().is_empty() {
            return Err(ConfigError::UnsupportedLanguage(self.target_language.clone()));
        }
        Ok(())
    }

    /// 答对一题的得分
    pub fn points_per_question(&self) -> u64 {
        self.difficulty.points()
    }
}
