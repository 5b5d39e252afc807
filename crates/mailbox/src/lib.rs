//! Mailbox crate - client-side mailbox synchronization engine
//!
//! This crate keeps a local model of a server-hosted mailbox consistent
//! with the remote store:
//! - Domain models (Message, Attachment, folder identities, quota)
//! - A folder tree of system and user folders, patched from snapshots
//! - Paged, searchable message lists with selection and bulk operations
//! - Draft composition, autosave, send and attachment uploads
//! - A `Transport` seam with an HTTP and a scripted in-memory implementation
//!
//! The engine never owns a UI; hosts drive a [`MailboxSession`] and listen
//! to [`MailboxEvent`]s.

pub mod actions;
pub mod config;
pub mod error;
pub mod events;
pub mod folder;
pub mod list;
pub mod logging;
pub mod models;
pub mod selection;
pub mod session;
pub mod sync;
pub mod transport;
pub mod tree;

pub use actions::{ActionHandler, SendReport, UploadReport};
pub use config::MailboxConfig;
pub use error::{ErrorCode, MailboxError, Result};
pub use events::{EventBus, MailboxEvent, SubscriptionId};
pub use folder::{Folder, FolderRef, TrashBin, TrashOutcome};
pub use list::{ListSource, MessageList, SelectionSnapshot, SyncOutcome, SyncParams, SyncTicket};
pub use logging::{LogSink, init_logger, set_log_level, set_log_sink};
pub use models::{
    Attachment, AttachmentSource, FolderClass, FolderKind, Message, MessageId, MessageState, Quota,
    Recipient, ReplyKind, SignaturePreference, SystemFolderKind, TrashedFolder, UploadSource,
    UploadStatus,
};
pub use selection::{Selectable, SelectionSet};
pub use session::MailboxSession;
pub use sync::{AutosaveOutcome, DraftAutosave};
pub use transport::{HttpTransport, Method, RecordingTransport, Request, Transport};
pub use tree::{FolderTree, RootTicket, SnapshotDiff};
