//! 审计日志服务 - 业务能力层
//!
//! 只负责"记下发生了什么"：提交创建、访问的步骤、每页填写的字段、截图证据。
//! 写入失败只记警告，不影响工作流。

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ExternalServiceError;
use crate::models::{FieldKey, PageState};

/// 审计事件内容
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEventKind {
    SubmissionCreated {
        record_index: usize,
        company: String,
    },
    StepLogged {
        url: String,
        title: String,
        step: String,
    },
    FieldsSnapshot {
        page: PageState,
        fields: BTreeMap<String, String>,
    },
    Evidence {
        kind: String,
        path: String,
    },
}

/// 审计事件
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuditEvent {
    pub submission_id: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub kind: AuditEventKind,
}

impl AuditEvent {
    pub fn new(submission_id: impl Into<String>, kind: AuditEventKind) -> Self {
        Self {
            submission_id: submission_id.into(),
            timestamp: chrono::Local::now().to_rfc3339(),
            kind,
        }
    }
}

/// 审计事件的落地方式
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &AuditEvent) -> Result<()>;
}

/// JSON Lines 文件：每行一个事件
pub struct JsonlAuditLog {
    path: String,
}

impl JsonlAuditLog {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn record(&self, event: &AuditEvent) -> Result<()> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("无法打开审计日志: {}", self.path))?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

/// 审计日志（发出即忘）
///
/// 职责：
/// - 组装事件并交给 sink
/// - 把截图写到证据目录，事件里只记路径
/// - 吞掉所有错误
pub struct AuditLog {
    sink: Box<dyn AuditSink>,
    evidence_dir: PathBuf,
}

impl AuditLog {
    pub fn new(sink: Box<dyn AuditSink>, evidence_dir: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            evidence_dir: evidence_dir.into(),
        }
    }

    async fn emit(&self, submission_id: &str, kind: AuditEventKind) {
        let event = AuditEvent::new(submission_id, kind);
        if let Err(e) = self.sink.record(&event).await {
            let err = ExternalServiceError::BadResponse {
                service: "audit-log",
                message: format!("{:#}", e),
            };
            warn!("⚠️ 审计事件写入失败: {}", err);
        }
    }

    pub async fn submission_created(&self, submission_id: &str, record_index: usize, company: &str) {
        self.emit(
            submission_id,
            AuditEventKind::SubmissionCreated {
                record_index,
                company: company.to_string(),
            },
        )
        .await;
    }

    pub async fn step(&self, submission_id: &str, url: &str, title: &str, step: &str) {
        self.emit(
            submission_id,
            AuditEventKind::StepLogged {
                url: url.to_string(),
                title: title.to_string(),
                step: step.to_string(),
            },
        )
        .await;
    }

    pub async fn fields(&self, submission_id: &str, page: PageState, fields: &[(FieldKey, String)]) {
        let fields = fields
            .iter()
            .map(|(key, value)| (key.canonical().to_string(), value.clone()))
            .collect();
        self.emit(submission_id, AuditEventKind::FieldsSnapshot { page, fields })
            .await;
    }

    /// 保存截图证据
    pub async fn evidence(&self, submission_id: &str, kind: &str, png: &[u8]) {
        let path = self
            .evidence_dir
            .join(format!("{}_{}.png", submission_id, kind));
        let written = fs::create_dir_all(&self.evidence_dir).and_then(|_| fs::write(&path, png));
        if let Err(e) = written {
            warn!("⚠️ 截图保存失败 {}: {}", path.display(), e);
            return;
        }
        debug!("截图已保存: {}", path.display());

        self.emit(
            submission_id,
            AuditEventKind::Evidence {
                kind: kind.to_string(),
                path: path.display().to_string(),
            },
        )
        .await;
    }
}
