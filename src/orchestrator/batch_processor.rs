//! 批量记录处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量记录的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：日志文件、输入文件、数据源校验、浏览器连接
//! 2. **资源管理**：持有 Browser 和 ChromeDriver，确保生命周期正确
//! 3. **顺序处理**：按数据源顺序逐条提交，一条处理完才开始下一条
//! 4. **全局统计**：汇总成功 / 失败数量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个页面的细节
//! - **资源所有者**：唯一持有 Browser 的模块
//! - **向下委托**：委托 record_processor 处理单条记录

use anyhow::{bail, Context, Result};
use chromiumoxide::Browser;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::ConfigError;
use crate::infrastructure::{ChromeDriver, UiDriver};
use crate::models::RecordSource;
use crate::orchestrator::record_processor;
use crate::services::{AuditLog, JsonlAuditLog};
use crate::utils::logging::{
    append_log_line, init_log_file, log_records_loaded, log_startup, print_final_stats,
};
use crate::workflow::{RunCtx, WorkflowEngine};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    driver: ChromeDriver,
    source: RecordSource,
    engine: WorkflowEngine,
    audit: AuditLog,
}

/// 处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProcessingStats {
    pub fn record(&mut self, succeeded: bool) {
        self.total += 1;
        if succeeded {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 输入文件
        let data_file = config
            .data_file
            .clone()
            .ok_or(ConfigError::MissingDataFile)?;
        if let Some(attachment) = &config.attachment_file {
            if !attachment.exists() {
                return Err(ConfigError::AttachmentNotFound {
                    path: attachment.display().to_string(),
                }
                .into());
            }
        }

        // 校验数据源
        let source = RecordSource::load(&data_file).await?;
        let report = source.report();
        if !report.is_valid {
            bail!(
                "数据文件校验失败 ({}): {}",
                data_file.display(),
                report.error.unwrap_or_default()
            );
        }
        log_records_loaded(&report);

        // 连接浏览器
        let (browser, page) = if config.launch_browser {
            browser::launch_browser(&config).await?
        } else {
            browser::connect_to_browser_and_page(config.browser_debug_port, &config.start_url)
                .await?
        };

        // 创建驱动（持有 page）
        let driver = ChromeDriver::new(page);
        driver.set_implicit_wait(config.implicit_wait());

        let audit = AuditLog::new(
            Box::new(JsonlAuditLog::with_path(config.audit_log_file.clone())),
            config.evidence_dir.clone(),
        );
        let engine = WorkflowEngine::from_config(&config);

        Ok(Self {
            config,
            _browser: browser,
            driver,
            source,
            engine,
            audit,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        let stats = self.process_all_records().await?;

        // 输出最终统计
        print_final_stats(stats.success, stats.failed, stats.total, &self.config.output_log_file);

        Ok(stats)
    }

    /// 按来源顺序处理所有记录
    async fn process_all_records(&self) -> Result<ProcessingStats> {
        let mut stats = ProcessingStats::default();

        for (index, record) in self.source.records().iter().enumerate() {
            let record_index = index + 1;
            if record.is_blank() {
                warn!("⚠️ 记录 #{} 为空，跳过", record_index);
                continue;
            }

            let ctx = RunCtx::new(
                RunCtx::generate_id(record_index),
                record_index,
                self.config.attachment_file.clone(),
            );

            let succeeded = match record_processor::process_record(
                &self.driver,
                &self.engine,
                &self.audit,
                record,
                &ctx,
                &self.config.start_url,
            )
            .await
            {
                Ok(succeeded) => succeeded,
                Err(e) => {
                    error!("{} ❌ 处理过程中发生错误: {:#}", ctx, e);
                    false
                }
            };
            stats.record(succeeded);

            append_log_line(
                &self.config.output_log_file,
                &format!(
                    "{} {}",
                    ctx,
                    if succeeded { "成功" } else { "失败" }
                ),
            )
            .with_context(|| format!("无法写入日志文件: {}", self.config.output_log_file))?;
            info!(
                "📈 当前统计: 成功 {} / 失败 {} / 已处理 {}",
                stats.success, stats.failed, stats.total
            );
        }

        Ok(stats)
    }
}
