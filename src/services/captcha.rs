//! 验证码服务 - 业务能力层
//!
//! 通过 CapSolver 解 Friendly Captcha：先创建任务，再按固定间隔轮询结果，次数有上限。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::ExternalServiceError;

const SERVICE: &str = "CapSolver";
const TASK_TYPE: &str = "FriendlyCaptchaTaskProxyless";

/// 验证码求解器
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// 返回可注入页面的令牌
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, ExternalServiceError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskResponse {
    #[serde(default)]
    error_id: i64,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskResultResponse {
    #[serde(default)]
    error_id: i64,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    solution: Option<Solution>,
}

/// 一次轮询的结论
#[derive(Debug, PartialEq, Eq)]
enum PollStep {
    Ready(String),
    Pending,
    Failed(String),
}

fn interpret(result: TaskResultResponse) -> PollStep {
    if result.error_id != 0 {
        return PollStep::Failed(
            result
                .error_description
                .unwrap_or_else(|| format!("errorId={}", result.error_id)),
        );
    }
    match result.status.as_deref() {
        Some("ready") => match result.solution.and_then(|s| s.token) {
            Some(token) if !token.is_empty() => PollStep::Ready(token),
            _ => PollStep::Failed("结果中没有 token".to_string()),
        },
        Some("processing") | Some("idle") => PollStep::Pending,
        other => PollStep::Failed(format!("未知状态: {:?}", other)),
    }
}

/// CapSolver 客户端
pub struct CapSolverClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_polls: usize,
    poll_interval: Duration,
}

impl CapSolverClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_polls: 30,
            poll_interval: Duration::from_millis(500),
        }
    }

    /// 配置了 API Key 时才创建
    pub fn from_config(config: &Config) -> Option<Self> {
        config
            .captcha_api_key
            .as_ref()
            .map(|key| Self::new(key.clone(), config.captcha_api_base_url.clone()))
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, ExternalServiceError> {
        let request_failed = |e: reqwest::Error| ExternalServiceError::RequestFailed {
            service: SERVICE,
            source: Box::new(e),
        };
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, endpoint))
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(request_failed)?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::BadResponse {
                service: SERVICE,
                message: format!("{} 返回 HTTP {}", endpoint, response.status()),
            });
        }
        response.json().await.map_err(request_failed)
    }
}

#[async_trait]
impl CaptchaSolver for CapSolverClient {
    async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, ExternalServiceError> {
        info!("🧩 正在请求 CapSolver 解验证码...");
        let created: CreateTaskResponse = self
            .post(
                "createTask",
                json!({
                    "clientKey": self.api_key,
                    "task": {
                        "type": TASK_TYPE,
                        "websiteURL": page_url,
                        "websiteKey": site_key,
                    }
                }),
            )
            .await?;

        if created.error_id != 0 {
            return Err(ExternalServiceError::BadResponse {
                service: SERVICE,
                message: created
                    .error_description
                    .unwrap_or_else(|| format!("errorId={}", created.error_id)),
            });
        }
        let task_id = created.task_id.ok_or_else(|| ExternalServiceError::BadResponse {
            service: SERVICE,
            message: "createTask 没有返回 taskId".to_string(),
        })?;
        debug!("CapSolver 任务已创建: {}", task_id);

        for attempt in 1..=self.max_polls {
            let polled = self
                .post::<TaskResultResponse>(
                    "getTaskResult",
                    json!({ "clientKey": self.api_key, "taskId": task_id }),
                )
                .await;

            match polled.map(interpret) {
                Ok(PollStep::Ready(token)) => {
                    info!("✓ 验证码已解决 (第 {} 次轮询)", attempt);
                    return Ok(token);
                }
                Ok(PollStep::Pending) => {}
                Ok(PollStep::Failed(message)) => {
                    return Err(ExternalServiceError::BadResponse {
                        service: SERVICE,
                        message,
                    })
                }
                Err(e) => debug!("第 {} 次轮询失败: {}", attempt, e),
            }
            sleep(self.poll_interval).await;
        }

        Err(ExternalServiceError::Exhausted {
            service: SERVICE,
            attempts: self.max_polls,
        })
    }
}
