//! Domain model (ids, payloads, progress, failures, events).

pub mod destination;
pub mod events;
pub mod failure;
pub mod file;
pub mod ids;
pub mod progress;

pub use destination::Destination;
pub use events::QueueEvent;
pub use failure::{FailureKind, UploadFailure};
pub use file::{FilePayload, PayloadSource, PayloadStream, guess_mime_type};
pub use ids::{RemoteFileId, UploadId};
pub use progress::Progress;
