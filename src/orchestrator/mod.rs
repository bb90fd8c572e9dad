//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量记录处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载并校验数据源（`RecordSource`）
//! - 管理浏览器资源（Browser、ChromeDriver）
//! - 输出全局统计信息
//!
//! ### `record_processor` - 单条记录处理器
//! - 登记提交（审计日志）
//! - 打开起始页面
//! - 委托 WorkflowEngine 跑完向导
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Record>)
//!     ↓
//! record_processor (处理单条 Record)
//!     ↓
//! workflow::WorkflowEngine (识别 → 处理 → 导航 循环)
//!     ↓
//! services (能力层：classifier / navigator / resolver / matcher / executor)
//!     ↓
//! infrastructure (基础设施：UiDriver)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，record_processor 管单条
//! 2. **资源隔离**：只有编排层持有 Browser 和 ChromeDriver
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体页面判断

pub mod batch_processor;
pub mod record_processor;

// 重新导出主要类型
pub use batch_processor::{App, ProcessingStats};
pub use record_processor::process_record;
