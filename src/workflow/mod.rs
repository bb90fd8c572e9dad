pub mod engine;
pub mod page_handlers;
pub mod run_ctx;
pub mod toolkit;

pub use engine::{Dispatch, EngineLimits, RunOutcome, RunStatus, WorkflowEngine};
pub use page_handlers::{Credentials, HandlerOutcome, PageHandlers};
pub use run_ctx::RunCtx;
pub use toolkit::{PageCtx, Toolkit};
