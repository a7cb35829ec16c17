//! Change records and the types they are built from.

mod query;
mod reason;
mod record;
mod set;
mod source;
mod subject;

pub use query::ChangeQuery;
pub use reason::ChangeReason;
pub use record::{now_millis, ChangeRecord, ChangeRecordBuilder};
pub use set::ChangeSet;
pub use source::{ChangeSource, SourceRegistry, MAX_SOURCE_NAME_LEN};
pub use subject::{CellSubject, EntitySubject, Subject, SubjectKind, SubjectRegistry};
