//! Trash-only state: soft-deleted user folders next to the trashed messages

use super::{Folder, user};
use crate::error::{MailboxError, Result};
use crate::models::{SystemFolderKind, TrashedFolder};
use crate::selection::SelectionSet;
use crate::transport::{Request, Transport, decode};

/// What a trash-wide delete or restore did
#[derive(Debug, Default)]
pub struct TrashOutcome {
    /// Messages deleted or restored
    pub messages: u32,
    /// Folders the server confirmed
    pub folders: u32,
    /// Folder ids the server refused, with the reason
    pub failed: Vec<(String, MailboxError)>,
}

impl TrashOutcome {
    /// The message count, or the first folder failure
    pub fn into_result(self) -> Result<u32> {
        match self.failed.into_iter().next() {
            Some((_, e)) => Err(e),
            None => Ok(self.messages),
        }
    }
}

/// Soft-deleted user folders listed in the trash
#[derive(Debug, Clone, Default)]
pub struct TrashBin {
    folders: SelectionSet<TrashedFolder>,
}

impl TrashBin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn folders(&self) -> &SelectionSet<TrashedFolder> {
        &self.folders
    }

    pub fn folders_mut(&mut self) -> &mut SelectionSet<TrashedFolder> {
        &mut self.folders
    }

    /// Reload the trashed folder list
    pub fn sync(&mut self, transport: &dyn Transport) -> Result<()> {
        let body = transport.execute(&Request::get("folders/list").query("trash", ""))?;
        let folders: Vec<TrashedFolder> = if body.is_null() { Vec::new() } else { decode(body)? };
        self.folders = SelectionSet::from_items(folders);
        log::info!("{} trashed folder(s)", self.folders.len());
        Ok(())
    }

    /// Delete the selected messages forever, then each selected folder.
    ///
    /// A refused folder stays listed; the remaining folders are still sent.
    pub fn remove_selection(&mut self, trash: &mut Folder, transport: &dyn Transport) -> Result<TrashOutcome> {
        debug_assert!(trash.is(SystemFolderKind::Trash));
        let snapshot = trash.list_mut().delete_selection(transport)?;
        trash.remove_unread(snapshot.unread);
        trash.count = trash.count.saturating_sub(snapshot.ids.len() as u32);

        let mut outcome = TrashOutcome {
            messages: snapshot.ids.len() as u32,
            ..TrashOutcome::default()
        };
        self.for_each_selected(&mut outcome, |id| user::delete(transport, id));
        Ok(outcome)
    }

    /// Restore the selected messages, then each selected folder
    pub fn restore(&mut self, trash: &mut Folder, transport: &dyn Transport) -> Result<TrashOutcome> {
        let snapshot = trash.list_mut().restore_selection(transport)?;
        trash.remove_unread(snapshot.unread);
        trash.count = trash.count.saturating_sub(snapshot.ids.len() as u32);

        let mut outcome = TrashOutcome {
            messages: snapshot.ids.len() as u32,
            ..TrashOutcome::default()
        };
        self.for_each_selected(&mut outcome, |id| user::restore(transport, id));
        Ok(outcome)
    }

    fn for_each_selected<F>(&mut self, outcome: &mut TrashOutcome, mut request: F)
    where
        F: FnMut(&str) -> Result<serde_json::Value>,
    {
        for id in self.folders.selected_ids() {
            match request(&id) {
                Ok(_) => {
                    self.folders.remove_ids(std::slice::from_ref(&id));
                    outcome.folders += 1;
                }
                Err(e) => {
                    log::warn!("Trashed folder {} not processed: {}", id, e);
                    outcome.failed.push((id, e));
                }
            }
        }
    }

    /// Empty the whole trash in one request
    pub fn remove_all(&mut self, trash: &mut Folder, transport: &dyn Transport) -> Result<()> {
        transport.execute(&Request::delete("emptyTrash"))?;
        trash.list_mut().messages_mut().clear();
        trash.unread = 0;
        trash.count = 0;
        self.folders.clear();
        log::info!("Trash emptied");
        Ok(())
    }

    pub fn select_all(&mut self) {
        self.folders.select_all();
    }

    pub fn deselect_all(&mut self) {
        self.folders.deselect_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailboxError;
    use crate::transport::{Method, RecordingTransport};
    use serde_json::json;

    fn setup(transport: &RecordingTransport) -> (TrashBin, Folder) {
        transport.reply(
            Method::Get,
            "list",
            json!([
                { "id": "t1", "date": 2, "unread": true },
                { "id": "t2", "date": 1, "unread": false }
            ]),
        );
        transport.reply(
            Method::Get,
            "folders/list",
            json!([
                { "id": "f1", "folderName": "Old" },
                { "id": "f2", "folderName": "Older" }
            ]),
        );
        let mut trash = Folder::system(SystemFolderKind::Trash, 1, 2);
        trash.sync(transport).unwrap();
        let mut bin = TrashBin::new();
        bin.sync(transport).unwrap();
        (bin, trash)
    }

    #[test]
    fn test_sync_lists_trashed_folders() {
        let transport = RecordingTransport::new();
        let (bin, _) = setup(&transport);
        assert_eq!(bin.folders().len(), 2);
        let request = &transport.requests_to(Method::Get, "folders/list")[0];
        assert_eq!(request.query_value("trash"), Some(""));
    }

    #[test]
    fn test_remove_selection_deletes_messages_then_folders() {
        let transport = RecordingTransport::new();
        let (mut bin, mut trash) = setup(&transport);
        trash.list_mut().get_mut("t1").unwrap().selected = true;
        bin.folders_mut().get_mut("f2").unwrap().selected = true;
        transport.clear_log();

        bin.remove_selection(&mut trash, &transport).unwrap();

        let paths: Vec<String> = transport.requests().iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec!["delete", "folder/f2"]);
        assert_eq!(trash.list().len(), 1);
        assert_eq!(trash.unread, 0);
        assert_eq!(bin.folders().len(), 1);
        assert!(bin.folders().contains("f1"));
    }

    #[test]
    fn test_folders_only_selection_skips_message_delete() {
        let transport = RecordingTransport::new();
        let (mut bin, mut trash) = setup(&transport);
        bin.select_all();
        transport.clear_log();

        bin.restore(&mut trash, &transport).unwrap();
        assert_eq!(transport.count(Method::Put, "restore"), 0);
        assert_eq!(transport.count(Method::Put, "folder/restore/f1"), 1);
        assert_eq!(transport.count(Method::Put, "folder/restore/f2"), 1);
        assert!(bin.folders().is_empty());
    }

    #[test]
    fn test_refused_folder_does_not_stop_the_rest() {
        let transport = RecordingTransport::new();
        let (mut bin, mut trash) = setup(&transport);
        trash.list_mut().get_mut("t1").unwrap().selected = true;
        bin.select_all();
        transport.fail(Method::Delete, "folder/f1", MailboxError::transport("busy"));

        let outcome = bin.remove_selection(&mut trash, &transport).unwrap();
        assert_eq!(outcome.messages, 1);
        assert_eq!(outcome.folders, 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, "f1");
        assert_eq!(transport.count(Method::Delete, "folder/f2"), 1);
        assert_eq!(bin.folders().len(), 1);
        assert!(bin.folders().contains("f1"));
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn test_remove_all() {
        let transport = RecordingTransport::new();
        let (mut bin, mut trash) = setup(&transport);

        bin.remove_all(&mut trash, &transport).unwrap();
        assert!(trash.list().is_empty());
        assert_eq!(trash.count, 0);
        assert!(bin.folders().is_empty());
    }

    #[test]
    fn test_failed_empty_keeps_state() {
        let transport = RecordingTransport::new();
        let (mut bin, mut trash) = setup(&transport);
        transport.fail(Method::Delete, "emptyTrash", MailboxError::transport("down"));

        assert!(bin.remove_all(&mut trash, &transport).is_err());
        assert_eq!(trash.list().len(), 2);
        assert_eq!(bin.folders().len(), 2);
    }
}
