//! Attachment records and their upload lifecycle

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the bytes of an attachment come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// A file on the local disk, uploaded as a raw body
    LocalFile { path: PathBuf },
    /// A file already stored in the user's workspace, copied server-side
    Workspace { file_id: String },
    /// Already persisted on the server (loaded with the message)
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Loading,
    Loaded,
    Error,
}

/// One attachment of a message.
///
/// A record created for an upload carries the attempt number it was
/// created for, so the result of that attempt replaces exactly this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub attempt: Option<u64>,
    pub source: AttachmentSource,
    pub status: UploadStatus,
    /// Persisted identity, set once the server accepted the upload
    pub id: Option<String>,
    pub filename: String,
    pub size: u64,
    pub content_type: Option<String>,
}

impl Attachment {
    /// An attachment already known to the server
    pub fn remote(
        id: impl Into<String>,
        filename: impl Into<String>,
        size: u64,
        content_type: Option<String>,
    ) -> Self {
        Self {
            attempt: None,
            source: AttachmentSource::Remote,
            status: UploadStatus::Loaded,
            id: Some(id.into()),
            filename: filename.into(),
            size,
            content_type,
        }
    }

    /// The placeholder record shown while an upload runs
    pub fn pending(attempt: u64, source: AttachmentSource, filename: impl Into<String>, size: u64) -> Self {
        Self {
            attempt: Some(attempt),
            source,
            status: UploadStatus::Loading,
            id: None,
            filename: filename.into(),
            size,
            content_type: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.status == UploadStatus::Loaded
    }
}

/// A file the host wants to attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    LocalFile(PathBuf),
    Workspace {
        file_id: String,
        filename: String,
        size: u64,
    },
}

impl UploadSource {
    pub fn filename(&self) -> String {
        match self {
            UploadSource::LocalFile(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            UploadSource::Workspace { filename, .. } => filename.clone(),
        }
    }

    pub(crate) fn as_source(&self) -> AttachmentSource {
        match self {
            UploadSource::LocalFile(path) => AttachmentSource::LocalFile { path: path.clone() },
            UploadSource::Workspace { file_id, .. } => AttachmentSource::Workspace {
                file_id: file_id.clone(),
            },
        }
    }
}
