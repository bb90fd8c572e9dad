//! # Wizard Autofill
//!
//! 用表格数据自动填写多页注册向导的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `UiDriver` - UI 驱动抽象，工作流只通过它接触浏览器
//! - `ChromeDriver` - 基于 chromiumoxide 的实现
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每项能力只处理一个页面或一个控件
//! - `PageClassifier` - 识别当前页面
//! - `Navigator` - 前往目标页面
//! - `FieldResolver` / `OptionMatcher` - 控件与字段、选项与取值的对应
//! - `ActionExecutor` - 按策略列表执行并验证交互
//! - `CapSolverClient` / `AuditLog` - 外部协作方
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条记录"的完整处理流程
//! - `RunCtx` - 运行上下文（提交 ID + 记录序号 + 附件）
//! - `PageHandlers` - 各页面的填写逻辑
//! - `WorkflowEngine` - 识别 → 处理 → 导航 循环
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量记录处理器，管理资源
//! - `orchestrator/record_processor` - 单条记录处理器
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{ChromeDriver, UiDriver};
pub use models::{PageState, Record, RecordSource};
pub use orchestrator::{process_record, App, ProcessingStats};
pub use workflow::{RunCtx, RunOutcome, RunStatus, WorkflowEngine};
