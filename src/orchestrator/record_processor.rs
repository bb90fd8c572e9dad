//! 单条记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块负责把一条记录提交一次，是记录级别的编排器。
//!
//! ## 核心功能
//!
//! 1. **提交登记**：生成提交 ID，写入 SubmissionCreated 审计事件
//! 2. **起点导航**：打开起始地址并记录一步
//! 3. **流程调度**：委托 `WorkflowEngine` 跑完整个向导
//! 4. **结果输出**：部分完成也如实报告

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::infrastructure::UiDriver;
use crate::models::{FieldKey, Record};
use crate::services::AuditLog;
use crate::utils::logging::truncate_text;
use crate::workflow::{RunCtx, RunOutcome, WorkflowEngine};

/// 处理单条记录
///
/// # 参数
/// - `driver`: UI 会话（本条记录处理期间独占）
/// - `engine`: 工作流引擎（跨记录复用）
/// - `audit`: 审计日志
/// - `record`: 记录数据
/// - `ctx`: 运行上下文
/// - `start_url`: 起始地址
///
/// # 返回
/// 返回是否成功提交；只有起始地址无法打开时返回错误
pub async fn process_record(
    driver: &dyn UiDriver,
    engine: &WorkflowEngine,
    audit: &AuditLog,
    record: &Record,
    ctx: &RunCtx,
    start_url: &str,
) -> Result<bool> {
    let company = record.get(FieldKey::CompanyName);
    log_record_start(ctx, &company);

    audit
        .submission_created(&ctx.submission_id, ctx.record_index, &company)
        .await;

    driver
        .navigate(start_url)
        .await
        .with_context(|| format!("无法打开起始地址: {}", start_url))?;
    let url = driver.current_url().await.unwrap_or_default();
    let title = driver.title().await.unwrap_or_default();
    audit
        .step(&ctx.submission_id, &url, &title, "start_page_opened")
        .await;

    let outcome = engine.run(driver, audit, record, ctx).await;
    log_record_complete(ctx, &outcome);

    Ok(outcome.is_success())
}

// ========== 日志辅助函数 ==========

fn log_record_start(ctx: &RunCtx, company: &str) {
    info!("\n{}", "─".repeat(60));
    info!("{} 🏢 开始处理: {}", ctx, truncate_text(company, 60));
    info!("{}", "─".repeat(60));
}

fn log_record_complete(ctx: &RunCtx, outcome: &RunOutcome) {
    let pages = outcome
        .completed_pages
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if outcome.is_success() {
        info!(
            "{} ✅ {} (第 {} 轮, 已完成: [{}])",
            ctx, outcome.status, outcome.iterations, pages
        );
    } else {
        warn!(
            "{} ❌ {} (第 {} 轮, 仅完成 {} 页: [{}])",
            ctx,
            outcome.status,
            outcome.iterations,
            outcome.completed_pages.len(),
            pages
        );
    }
}
