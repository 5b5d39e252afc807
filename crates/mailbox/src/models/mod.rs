//! Domain models for mail entities

mod attachment;
mod folder;
mod message;
mod quota;

pub use attachment::{Attachment, AttachmentSource, UploadSource, UploadStatus};
pub use folder::{FolderKind, SystemFolderKind, TrashedFolder, parent_path};
pub use message::{
    FolderClass, Message, MessageBuilder, MessageId, MessageState, NO_SUBJECT, Recipient, ReplyKind,
};
pub use quota::{Quota, ScaledSize, SignaturePreference, scale};
