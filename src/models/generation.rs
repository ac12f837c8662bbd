//! Gemini `generateContent` 请求 / 响应结构
//!
//! 只建模用得到的字段，响应里其余字段全部忽略

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// 生成请求
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: JsonValue,
}

impl GenerationRequest {
    /// 由系统提示词和用户提示词构建请求，输出约束为题目数组
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::text(user_prompt)],
            system_instruction: Content::text(system_prompt),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: trivia_schema(),
            },
        }
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_instruction.first_text()
    }

    pub fn user_prompt(&self) -> Option<&str> {
        self.contents.first().and_then(Content::first_text)
    }
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().and_then(|p| p.text.as_deref())
    }
}

/// 题目数组的结构化输出 schema
pub fn trivia_schema() -> JsonValue {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING", "description": "The trivia question text." },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "An array of exactly four plausible answer choices."
                },
                "correctAnswer": {
                    "type": "STRING",
                    "description": "The correct answer, which must be identical to one of the options."
                }
            },
            "required": ["question", "options", "correctAnswer"],
            "propertyOrdering": ["question", "options", "correctAnswer"]
        }
    })
}

/// 生成响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerationResponse {
    /// 第一个候选的第一段文本
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(Content::first_text)
    }
}
