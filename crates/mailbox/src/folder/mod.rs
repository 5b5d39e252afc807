//! Folders: a message list plus counters and child folder references
//!
//! A folder is either one of the five system folders or a user folder.
//! Folders never point at each other directly; parents and children are
//! paths resolved through the tree.

pub mod draft;
pub mod trash;
pub mod user;

pub use trash::{TrashBin, TrashOutcome};

use crate::error::Result;
use crate::list::{ListSource, MessageList, SyncOutcome};
use crate::models::{FolderKind, SystemFolderKind};
use crate::selection::{Selectable, SelectionSet};
use crate::transport::Transport;

/// Reference to a child user folder, by path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub path: String,
    pub selected: bool,
}

impl FolderRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            selected: false,
        }
    }
}

impl Selectable for FolderRef {
    fn selection_id(&self) -> Option<&str> {
        Some(&self.path)
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

/// A mail folder
#[derive(Debug, Clone)]
pub struct Folder {
    kind: FolderKind,
    path: String,
    /// Unread messages, never negative
    pub unread: u32,
    /// Total messages
    pub count: u32,
    list: MessageList,
    children: SelectionSet<FolderRef>,
}

impl Folder {
    pub fn system(kind: SystemFolderKind, unread: u32, count: u32) -> Self {
        let path = kind.path().to_string();
        Self {
            kind: FolderKind::System(kind),
            list: MessageList::new(ListSource::System { path: path.clone() }),
            path,
            unread,
            count,
            children: SelectionSet::new(),
        }
    }

    pub fn user(
        id: impl Into<String>,
        name: impl Into<String>,
        path: impl Into<String>,
        parent: Option<String>,
    ) -> Self {
        let path = path.into();
        Self {
            kind: FolderKind::User {
                id: id.into(),
                name: name.into(),
                parent,
            },
            list: MessageList::new(ListSource::User { path: path.clone() }),
            path,
            unread: 0,
            count: 0,
            children: SelectionSet::new(),
        }
    }

    pub fn with_counts(mut self, unread: u32, count: u32) -> Self {
        self.unread = unread;
        self.count = count;
        self
    }

    pub fn kind(&self) -> &FolderKind {
        &self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn system_kind(&self) -> Option<SystemFolderKind> {
        self.kind.system_kind()
    }

    pub fn is_system(&self) -> bool {
        self.kind.is_system()
    }

    pub fn is(&self, kind: SystemFolderKind) -> bool {
        self.system_kind() == Some(kind)
    }

    /// Lookup name: the system name for system folders, the id otherwise
    pub fn name(&self) -> &str {
        match &self.kind {
            FolderKind::System(kind) => kind.name(),
            FolderKind::User { id, .. } => id,
        }
    }

    /// Name shown to the user
    pub fn display_name(&self) -> &str {
        match &self.kind {
            FolderKind::System(kind) => kind.name(),
            FolderKind::User { name, .. } => name,
        }
    }

    /// Server id of a user folder
    pub fn user_id(&self) -> Option<&str> {
        match &self.kind {
            FolderKind::User { id, .. } => Some(id),
            FolderKind::System(_) => None,
        }
    }

    pub fn parent_path(&self) -> Option<&str> {
        match &self.kind {
            FolderKind::User { parent, .. } => parent.as_deref(),
            FolderKind::System(_) => None,
        }
    }

    pub(crate) fn kind_mut(&mut self) -> &mut FolderKind {
        &mut self.kind
    }

    /// Re-key a renamed user folder. Its list restarts empty under the new path.
    pub(crate) fn set_path(&mut self, path: String) {
        if !self.is_system() && self.path != path {
            self.list = MessageList::new(ListSource::User { path: path.clone() });
        }
        self.path = path;
    }

    pub fn list(&self) -> &MessageList {
        &self.list
    }

    pub fn list_mut(&mut self) -> &mut MessageList {
        &mut self.list
    }

    pub fn children(&self) -> &SelectionSet<FolderRef> {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut SelectionSet<FolderRef> {
        &mut self.children
    }

    pub(crate) fn set_children(&mut self, children: SelectionSet<FolderRef>) {
        self.children = children;
    }

    pub fn add_unread(&mut self, n: u32) {
        self.unread = self.unread.saturating_add(n);
    }

    pub fn remove_unread(&mut self, n: u32) {
        self.unread = self.unread.saturating_sub(n);
    }

    /// Reload page 0 with the current search and filter
    pub fn sync(&mut self, transport: &dyn Transport) -> Result<SyncOutcome> {
        self.list.refresh(transport)
    }

    /// Reload page 0 with search and filter dropped
    pub fn open(&mut self, transport: &dyn Transport) -> Result<SyncOutcome> {
        self.list.clear_query(transport)
    }

    pub fn next_page(&mut self, transport: &dyn Transport, select_all: bool) -> Result<SyncOutcome> {
        self.list.next_page(transport, select_all)
    }

    /// Search within the folder; composes with the unread filter
    pub fn search(&mut self, transport: &dyn Transport, text: Option<String>) -> Result<SyncOutcome> {
        self.list.search(transport, text)
    }

    /// Restrict to unread messages; composes with the search text
    pub fn filter_unread(&mut self, transport: &dyn Transport, on: bool) -> Result<SyncOutcome> {
        self.list.filter_unread(transport, on)
    }

    /// Set the read state of the selection and adjust the unread counter
    /// by the number of messages that actually changed.
    pub fn toggle_unread_selection(&mut self, transport: &dyn Transport, unread: bool) -> Result<u32> {
        let changed = self.list.toggle_unread(transport, unread)?;
        if unread {
            self.add_unread(changed);
        } else {
            self.remove_unread(changed);
        }
        self.list.messages_mut().deselect_all();
        Ok(changed)
    }

    pub fn select_all(&mut self) {
        self.list.messages_mut().select_all();
    }

    pub fn deselect_all(&mut self) {
        self.list.messages_mut().deselect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, RecordingTransport};
    use serde_json::json;

    fn loaded_inbox(transport: &RecordingTransport) -> Folder {
        transport.reply(
            Method::Get,
            "list",
            json!([
                { "id": "a", "date": 3, "unread": true, "systemFolder": "INBOX" },
                { "id": "b", "date": 2, "unread": true, "systemFolder": "INBOX" },
                { "id": "c", "date": 1, "unread": false, "systemFolder": "INBOX" }
            ]),
        );
        let mut inbox = Folder::system(SystemFolderKind::Inbox, 5, 40);
        inbox.sync(transport).unwrap();
        inbox
    }

    #[test]
    fn test_names_by_variant() {
        let inbox = Folder::system(SystemFolderKind::Inbox, 0, 0);
        assert_eq!(inbox.name(), "INBOX");
        assert_eq!(inbox.path(), "/Inbox");

        let work = Folder::user("257", "Work", "/Inbox/Work", None);
        assert_eq!(work.name(), "257");
        assert_eq!(work.display_name(), "Work");
        assert_eq!(work.list().source(), &ListSource::User { path: "/Inbox/Work".to_string() });
    }

    #[test]
    fn test_mark_read_adjusts_counter() {
        let transport = RecordingTransport::new();
        let mut inbox = loaded_inbox(&transport);
        inbox.select_all();

        let changed = inbox.toggle_unread_selection(&transport, false).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(inbox.unread, 3);
        assert_eq!(inbox.list().messages().selected_count(), 0);
    }

    #[test]
    fn test_counter_never_negative() {
        let transport = RecordingTransport::new();
        let mut inbox = loaded_inbox(&transport);
        inbox.unread = 1;
        inbox.select_all();

        inbox.toggle_unread_selection(&transport, false).unwrap();
        assert_eq!(inbox.unread, 0);
    }

    #[test]
    fn test_mark_unread_counts_only_read_ones() {
        let transport = RecordingTransport::new();
        let mut inbox = loaded_inbox(&transport);
        inbox.select_all();

        let changed = inbox.toggle_unread_selection(&transport, true).unwrap();
        assert_eq!(changed, 1);
        assert_eq!(inbox.unread, 6);
    }

    #[test]
    fn test_rename_rekeys_list() {
        let mut folder = Folder::user("9", "Old", "/Inbox/Old", None);
        folder.set_path("/Inbox/New".to_string());
        assert_eq!(folder.path(), "/Inbox/New");
        assert_eq!(folder.list().source().path(), "/Inbox/New");
    }
}
