//! Folder identities: the five system folders and user folders

use serde::{Deserialize, Serialize};

use super::message::FolderClass;
use crate::selection::Selectable;

/// The well-known folders every mailbox has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemFolderKind {
    Inbox,
    Outbox,
    Draft,
    Trash,
    Spams,
}

impl SystemFolderKind {
    pub const ALL: [SystemFolderKind; 5] = [
        SystemFolderKind::Inbox,
        SystemFolderKind::Outbox,
        SystemFolderKind::Draft,
        SystemFolderKind::Trash,
        SystemFolderKind::Spams,
    ];

    /// Server path of the folder
    pub fn path(self) -> &'static str {
        match self {
            SystemFolderKind::Inbox => "/Inbox",
            SystemFolderKind::Outbox => "/Sent",
            SystemFolderKind::Draft => "/Drafts",
            SystemFolderKind::Trash => "/Trash",
            SystemFolderKind::Spams => "/Junk",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.path() == path)
    }

    /// Lookup name used by `open_folder`
    pub fn name(self) -> &'static str {
        match self {
            SystemFolderKind::Inbox => "INBOX",
            SystemFolderKind::Outbox => "OUTBOX",
            SystemFolderKind::Draft => "DRAFT",
            SystemFolderKind::Trash => "TRASH",
            SystemFolderKind::Spams => "SPAMS",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Message class whose semantics apply inside this folder
    pub fn folder_class(self) -> Option<FolderClass> {
        match self {
            SystemFolderKind::Inbox => Some(FolderClass::Inbox),
            SystemFolderKind::Outbox => Some(FolderClass::Outbox),
            SystemFolderKind::Draft => Some(FolderClass::Draft),
            _ => None,
        }
    }

    pub fn sort_order(self) -> u32 {
        match self {
            SystemFolderKind::Inbox => 0,
            SystemFolderKind::Outbox => 1,
            SystemFolderKind::Draft => 2,
            SystemFolderKind::Spams => 3,
            SystemFolderKind::Trash => 4,
        }
    }
}

/// Closed variant identifying a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderKind {
    System(SystemFolderKind),
    User {
        id: String,
        name: String,
        /// Path of the parent user folder; `None` for top-level folders
        parent: Option<String>,
    },
}

impl FolderKind {
    pub fn is_system(&self) -> bool {
        matches!(self, FolderKind::System(_))
    }

    pub fn system_kind(&self) -> Option<SystemFolderKind> {
        match self {
            FolderKind::System(kind) => Some(*kind),
            FolderKind::User { .. } => None,
        }
    }
}

/// Parent path of a user folder path, `None` when it sits directly under
/// the inbox or at the root.
pub fn parent_path(path: &str) -> Option<String> {
    let (parent, _) = path.rsplit_once('/')?;
    if parent.is_empty() || parent == SystemFolderKind::Inbox.path() {
        None
    } else {
        Some(parent.to_string())
    }
}

/// A soft-deleted user folder listed in the trash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashedFolder {
    pub id: String,
    #[serde(alias = "folderName")]
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(skip)]
    pub selected: bool,
}

impl Selectable for TrashedFolder {
    fn selection_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_paths_round_trip() {
        for kind in SystemFolderKind::ALL {
            assert_eq!(SystemFolderKind::from_path(kind.path()), Some(kind));
            assert_eq!(SystemFolderKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SystemFolderKind::from_path("/Inbox/Work"), None);
        assert_eq!(SystemFolderKind::from_name("outbox"), Some(SystemFolderKind::Outbox));
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/Inbox/Work"), None);
        assert_eq!(parent_path("/Inbox/Work/2024"), Some("/Inbox/Work".to_string()));
        assert_eq!(parent_path("/Inbox"), None);
    }

    #[test]
    fn test_trashed_folder_accepts_folder_name() {
        let folder: TrashedFolder =
            serde_json::from_str(r#"{"id":"7","folderName":"Old","path":"/Inbox/Old"}"#).unwrap();
        assert_eq!(folder.name, "Old");
        assert!(!folder.selected);
    }
}
