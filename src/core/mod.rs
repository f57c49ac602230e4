//! Core module - identities, values, sessions and the submission boundary

pub mod config;
pub mod identity;
pub mod input;
pub mod session;
pub mod store;
pub mod submission;
pub mod value;

pub use config::Config;
pub use identity::{EntityId, EntityKind, IdParseError};
pub use input::{parse_input, read_input, InputError, RawValues};
pub use session::{
    FormSession, PendingSubmission, SessionError, SessionOptions, SessionState, SubmissionTicket,
    SubmitStep,
};
pub use store::{MemoryStore, StoreError};
pub use submission::{
    Payload, Persistence, RelationSource, SubmissionAdapter, SubmissionError, SubmitReceipt,
};
pub use value::{FileHandle, FormMode, RawValue, TypedValue, ValidatedRecord};
