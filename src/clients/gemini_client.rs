/// Gemini API 客户端
///
/// 只负责把请求发出去、把状态码和响应体原样带回来，不解析业务内容
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AttemptError;
use crate::models::generation::GenerationRequest;

/// 一次请求的原始结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx 视为成功
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 生成服务的传输层
///
/// 拉题服务只依赖这个 trait，测试时注入假实现
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// 发送一次生成请求
    async fn generate(&self, request: &GenerationRequest) -> Result<TransportResponse, AttemptError>;

    /// 是否具备发请求的条件（例如已配置 API Key）
    fn is_configured(&self) -> bool {
        true
    }
}

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base_url: String,
    model_name: String,
    key_missing: bool,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key: config.gemini_api_key.clone(),
            api_base_url: config.gemini_api_base_url.trim_end_matches('/').to_string(),
            model_name: config.gemini_model_name.clone(),
            key_missing: config.is_api_key_missing(),
        })
    }

    /// generateContent 接口地址（不含 key）
    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base_url, self.model_name
        )
    }
}

#[async_trait]
impl GenerationTransport for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<TransportResponse, AttemptError> {
        let endpoint = self.endpoint();
        debug!("正在调用 Gemini API，模型: {}", self.model_name);

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!("Gemini API 请求失败: {}", e);
                AttemptError::transport(e)
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(AttemptError::transport)?;

        debug!("Gemini API 返回状态码: {}, 响应长度: {} 字节", status, body.len());

        Ok(TransportResponse { status, body })
    }

    fn is_configured(&self) -> bool {
        !self.key_missing
    }
}
