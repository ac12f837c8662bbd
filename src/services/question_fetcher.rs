//! 拉题服务 - 业务能力层
//!
//! 只负责"根据会话参数拿到一批题目"，不关心会话流程
//!
//! 每次尝试：发请求 → 检查状态码 → 解析外层结构 → 取出生成文本 → 解析题目数组。
//! 任一步失败都算可重试失败，按 `RetryPolicy` 退避后重试，最后一次失败才向上返回。

use regex::Regex;
use std::sync::{Arc, OnceLock};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::clients::GenerationTransport;
use crate::error::{AttemptError, FetchError};
use crate::models::generation::{GenerationRequest, GenerationResponse};
use crate::models::question::{Question, QuestionBatch};
use crate::models::session_config::SessionConfig;
use crate::services::retry_policy::RetryPolicy;

/// 拉题服务
///
/// 职责：
/// - 根据难度和语言构建提示词
/// - 调用生成服务并重试
/// - 解析返回的题目数组
/// - 不打乱选项顺序，不校验题目数量
pub struct QuestionFetcher {
    transport: Arc<dyn GenerationTransport>,
    policy: RetryPolicy,
}

impl QuestionFetcher {
    /// 创建新的拉题服务
    pub fn new(transport: Arc<dyn GenerationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// 传输层是否可用（例如 API Key 已配置）
    pub fn is_ready(&self) -> bool {
        self.transport.is_configured()
    }

    /// 拉取一批题目
    ///
    /// 成功时原样返回解析结果；所有尝试失败后返回携带最后一次原因的 `FetchError`
    pub async fn fetch(&self, config: &SessionConfig) -> Result<QuestionBatch, FetchError> {
        let request = build_request(config);
        info!(
            "📝 请求生成 {} 道题目 (难度: {}, 语言: {})",
            config.num_questions, config.difficulty, config.target_language
        );

        let mut attempt = 0;
        loop {
            match self.try_once(&request).await {
                Ok(batch) => {
                    let malformed = batch.malformed_indices();
                    if !malformed.is_empty() {
                        warn!("⚠️ 有 {} 道题目结构不完整: {:?}", malformed.len(), malformed);
                    }
                    if batch.len() != config.num_questions as usize {
                        debug!(
                            "返回题目数量 {} 与请求数量 {} 不一致",
                            batch.len(),
                            config.num_questions
                        );
                    }
                    info!("✓ 题目生成成功，共 {} 道 (第 {} 次尝试)", batch.len(), attempt + 1);
                    return Ok(batch);
                }
                Err(e) => match self.policy.backoff_after(attempt) {
                    Some(delay) => {
                        warn!(
                            "拉题失败 (尝试 {}/{}): {}，{} 毫秒后重试...",
                            attempt + 1,
                            self.policy.max_attempts(),
                            e,
                            delay.as_millis()
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!("❌ 拉题失败，已尝试 {} 次: {}", attempt + 1, e);
                        return Err(FetchError::Exhausted {
                            attempts: attempt + 1,
                            last: e,
                        });
                    }
                },
            }
        }
    }

    /// 单次尝试
    async fn try_once(&self, request: &GenerationRequest) -> Result<QuestionBatch, AttemptError> {
        let response = self.transport.generate(request).await?;
        if !response.is_success() {
            return Err(AttemptError::BadStatus {
                status: response.status,
            });
        }
        parse_response_body(&response.body)
    }
}

// ========== 请求构建 ==========

/// 构建系统提示词
pub fn build_system_prompt(config: &SessionConfig) -> String {
    format!(
        "You are a professional trivia question generator specializing in Web3. You must generate exactly {} trivia questions on the following topics: {}\n\n\
         The difficulty level must be: {}\n\n\
         Each question must have exactly four plausible, distinct options, one of which is the correct answer. \
         The entire output (questions, options, and correct answers) **must be written entirely in {}.** \
         The output must strictly follow the provided JSON schema.",
        config.num_questions,
        config.difficulty.topics(),
        config.difficulty.description(),
        config.target_language
    )
}

/// 构建用户提示词
pub fn build_user_prompt(config: &SessionConfig) -> String {
    format!("Generate {} questions now.", config.num_questions)
}

/// 构建完整的生成请求
pub fn build_request(config: &SessionConfig) -> GenerationRequest {
    GenerationRequest::new(build_system_prompt(config), build_user_prompt(config))
}

// ========== 响应解析 ==========

/// 解析响应体，取出题目列表
pub fn parse_response_body(body: &str) -> Result<QuestionBatch, AttemptError> {
    let envelope: GenerationResponse =
        serde_json::from_str(body).map_err(AttemptError::Envelope)?;

    let text = envelope
        .first_text()
        .filter(|t| !t.trim().is_empty())
        .ok_or(AttemptError::MissingPayload)?;

    parse_questions(text)
}

/// 把生成文本解析为题目数组
///
/// 模型偶尔会用 ```json 代码块包住输出，先剥掉
pub fn parse_questions(text: &str) -> Result<QuestionBatch, AttemptError> {
    let cleaned = strip_code_fence(text);
    debug!("生成文本长度: {} 字符", cleaned.len());

    let questions: Vec<Question> =
        serde_json::from_str(cleaned).map_err(AttemptError::InvalidPayload)?;

    QuestionBatch::new(questions).ok_or(AttemptError::EmptyBatch)
}

fn strip_code_fence(text: &str) -> &str {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").expect("代码块正则应当合法")
    });

    match re.captures(text).and_then(|cap| cap.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::TransportResponse;
    use crate::models::difficulty::Difficulty;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// 按脚本依次返回结果的假传输层
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<TransportResponse, AttemptError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportResponse, AttemptError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationTransport for ScriptedTransport {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<TransportResponse, AttemptError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(AttemptError::BadStatus { status: 599 }))
        }
    }

    fn envelope(text: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
    }

    fn questions_json(n: usize) -> String {
        let items: Vec<_> = (0..n)
            .map(|i| {
                json!({
                    "question": format!("Q{}", i),
                    "options": ["a", "b", "c", "d"],
                    "correctAnswer": "b"
                })
            })
            .collect();
        serde_json::Value::Array(items).to_string()
    }

    fn fetcher(transport: Arc<ScriptedTransport>) -> QuestionFetcher {
        QuestionFetcher::new(transport, RetryPolicy::default())
    }

    #[test]
    fn test_prompts() {
        let config = SessionConfig::new(Difficulty::Easy, 5, "French");
        let system = build_system_prompt(&config);
        assert!(system.contains("exactly 5 trivia questions"));
        assert!(system.contains(Difficulty::Easy.topics()));
        assert!(system.contains("written entirely in French"));
        assert_eq!(build_user_prompt(&config), "Generate 5 questions now.");

        let request = build_request(&config);
        assert_eq!(request.user_prompt(), Some("Generate 5 questions now."));
        assert_eq!(request.system_prompt(), Some(system.as_str()));
    }

    #[test]
    fn test_parse_response_body() {
        let batch = parse_response_body(&envelope(&questions_json(3))).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.get(0).unwrap().options, vec!["a", "b", "c", "d"]);

        assert!(matches!(
            parse_response_body("not json"),
            Err(AttemptError::Envelope(_))
        ));
        assert!(matches!(
            parse_response_body(r#"{"candidates":[]}"#),
            Err(AttemptError::MissingPayload)
        ));
        assert!(matches!(
            parse_response_body(&envelope("[]")),
            Err(AttemptError::EmptyBatch)
        ));
        assert!(matches!(
            parse_response_body(&envelope(r#"{"question":"Q"}"#)),
            Err(AttemptError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_parse_fenced_payload() {
        let fenced = format!("```json\n{}\n```", questions_json(2));
        assert_eq!(parse_questions(&fenced).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_keeps_option_order() {
        let text = r#"[{"question":"Q","options":["d","c","b","a"],"correctAnswer":"a"}]"#;
        let batch = parse_questions(text).unwrap();
        assert_eq!(batch.get(0).unwrap().options, vec!["d", "c", "b", "a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_success_first_attempt() {
        let transport = ScriptedTransport::new(vec![Ok(TransportResponse::new(
            200,
            envelope(&questions_json(5)),
        ))]);
        let batch = fetcher(transport.clone())
            .fetch(&SessionConfig::new(Difficulty::Medium, 5, "English"))
            .await
            .unwrap();

        assert_eq!(batch.len(), 5);
        assert_eq!(transport.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_retries_with_backoff_then_fails() {
        let transport = ScriptedTransport::new(vec![
            Ok(TransportResponse::new(500, "")),
            Ok(TransportResponse::new(200, envelope("[]"))),
            Ok(TransportResponse::new(503, "")),
            Ok(TransportResponse::new(200, envelope(&questions_json(5)))),
        ]);

        let err = fetcher(transport.clone())
            .fetch(&SessionConfig::default())
            .await
            .unwrap_err();

        let calls = transport.call_times();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_millis(1000));
        assert!(calls[2] - calls[1] >= Duration::from_millis(2000));

        let FetchError::Exhausted { attempts, last } = err;
        assert_eq!(attempts, 3);
        assert!(matches!(last, AttemptError::BadStatus { status: 503 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_recovers_after_transient_failure() {
        let transport = ScriptedTransport::new(vec![
            Err(AttemptError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))),
            Ok(TransportResponse::new(200, envelope(&questions_json(7)))),
        ]);

        let start = Instant::now();
        let batch = fetcher(transport.clone())
            .fetch(&SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(batch.len(), 7);
        assert_eq!(transport.call_times().len(), 2);
        assert!(Instant::now() - start >= Duration::from_millis(1000));
    }
}
