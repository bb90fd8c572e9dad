pub mod control;
pub mod loaders;
pub mod page_state;
pub mod record;

pub use control::{ControlDescriptor, ControlHandle, ControlKind, OptionCandidate};
pub use loaders::{RecordSource, ValidationReport};
pub use page_state::{CompletedPageSet, PageState};
pub use record::{flag_token, parse_flag, FieldKey, Record};
