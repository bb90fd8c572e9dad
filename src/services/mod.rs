pub mod action_executor;
pub mod audit_log;
pub mod captcha;
pub mod field_resolver;
pub mod navigator;
pub mod option_matcher;
pub mod page_classifier;

pub use action_executor::{ActionExecutor, InteractionStrategy, UiAction};
pub use audit_log::{AuditEvent, AuditEventKind, AuditLog, AuditSink, JsonlAuditLog};
pub use captcha::{CapSolverClient, CaptchaSolver};
pub use field_resolver::{FieldResolver, FillReport};
pub use navigator::Navigator;
pub use option_matcher::{MatchDecision, MatchOutcome, MatcherConfig, OptionMatcher};
pub use page_classifier::{PageClassifier, UiSnapshot};
