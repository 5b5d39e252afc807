//! Bulk operations on the selected messages of a list
//!
//! Each operation sends one request keyed by the selected ids and touches
//! local state only once the server confirmed it.

use super::MessageList;
use crate::error::Result;
use crate::models::Message;
use crate::transport::{Request, Transport, id_body};

/// The selection as it was before a bulk request went out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub ids: Vec<String>,
    /// How many of the selected messages were unread
    pub unread: u32,
}

impl SelectionSnapshot {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl MessageList {
    /// Capture ids and unread count of the current selection
    pub fn snapshot_selection(&self) -> SelectionSnapshot {
        let mut snapshot = SelectionSnapshot::default();
        for message in self.messages.selected() {
            if let Some(id) = &message.id {
                snapshot.ids.push(id.as_str().to_string());
                if message.unread {
                    snapshot.unread += 1;
                }
            }
        }
        snapshot
    }

    fn bulk(&mut self, transport: &dyn Transport, request: Request, remove: bool) -> Result<SelectionSnapshot> {
        let snapshot = self.snapshot_selection();
        if snapshot.is_empty() {
            return Ok(snapshot);
        }

        let path = request.path.clone();
        transport.execute(&request.json(id_body(&snapshot.ids)))?;

        if remove {
            self.messages.remove_ids(&snapshot.ids);
        } else {
            self.messages.deselect_all();
        }
        log::info!("{} applied to {} message(s) in {}", path, snapshot.ids.len(), self.source.path());
        Ok(snapshot)
    }

    /// Move the selection to a user folder
    pub fn move_selection(&mut self, transport: &dyn Transport, folder_id: &str) -> Result<SelectionSnapshot> {
        self.bulk(transport, Request::put(format!("move/userfolder/{}", folder_id)), false)
    }

    /// Move the selection out of its user folder, back to the inbox
    pub fn remove_from_folder(&mut self, transport: &dyn Transport) -> Result<SelectionSnapshot> {
        self.bulk(transport, Request::put("move/root"), true)
    }

    /// Move the selection to the trash
    pub fn to_trash(&mut self, transport: &dyn Transport) -> Result<SelectionSnapshot> {
        self.bulk(transport, Request::put("trash"), false)
    }

    /// Delete the selection forever (trash only)
    pub fn delete_selection(&mut self, transport: &dyn Transport) -> Result<SelectionSnapshot> {
        self.bulk(transport, Request::delete("delete"), true)
    }

    /// Take the selection out of the trash
    pub fn restore_selection(&mut self, transport: &dyn Transport) -> Result<SelectionSnapshot> {
        self.bulk(transport, Request::put("restore"), true)
    }

    /// Set the read state of the selected inbox and outbox messages.
    ///
    /// Only messages whose current state differs from `unread` are sent.
    /// Returns how many messages changed.
    pub fn toggle_unread(&mut self, transport: &dyn Transport, unread: bool) -> Result<u32> {
        let ids: Vec<String> = self
            .messages
            .selected()
            .filter(|m| participates_in_toggle(m, unread))
            .filter_map(|m| m.id.as_ref().map(|id| id.as_str().to_string()))
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut request = Request::post("toggleUnread");
        for id in &ids {
            request = request.query("id", id);
        }
        transport.execute(&request.query("unread", unread))?;

        for id in &ids {
            if let Some(message) = self.messages.get_mut(id) {
                message.unread = unread;
            }
        }
        log::info!("Marked {} message(s) unread={}", ids.len(), unread);
        Ok(ids.len() as u32)
    }
}

fn participates_in_toggle(message: &Message, unread: bool) -> bool {
    message.folder_class.is_some_and(|class| class.supports_unread_toggle()) && message.unread != unread
}

#[cfg(test)]
mod tests {
    use super::super::{ListSource, SyncParams};
    use super::*;
    use crate::error::MailboxError;
    use crate::transport::{Method, RecordingTransport};
    use serde_json::{Value, json};

    fn loaded(rows: Value) -> MessageList {
        let transport = RecordingTransport::new();
        transport.reply(Method::Get, "list", rows);
        let mut list = MessageList::new(ListSource::System { path: "/Inbox".to_string() });
        list.sync(&transport, SyncParams { reset_list: true, ..SyncParams::default() })
            .unwrap();
        list
    }

    fn select(list: &mut MessageList, ids: &[&str]) {
        for id in ids {
            list.get_mut(id).unwrap().selected = true;
        }
    }

    fn rows() -> Value {
        json!([
            { "id": "u1", "date": 5, "unread": true, "systemFolder": "INBOX" },
            { "id": "u2", "date": 4, "unread": true, "systemFolder": "INBOX" },
            { "id": "r1", "date": 3, "unread": false, "systemFolder": "INBOX" },
            { "id": "d1", "date": 2, "unread": true, "systemFolder": "DRAFT", "state": "DRAFT" },
            { "id": "o1", "date": 1, "unread": false, "systemFolder": "OUTBOX" }
        ])
    }

    #[test]
    fn test_toggle_sends_only_changing_messages() {
        let mut list = loaded(rows());
        select(&mut list, &["u1", "u2", "r1"]);
        let transport = RecordingTransport::new();

        let changed = list.toggle_unread(&transport, false).unwrap();
        assert_eq!(changed, 2);

        let sent = transport.requests_to(Method::Post, "toggleUnread");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].query_values("id"), vec!["u1", "u2"]);
        assert_eq!(sent[0].query_value("unread"), Some("false"));
        assert!(!list.get("u1").unwrap().unread);
        assert!(!list.get("r1").unwrap().unread);
    }

    #[test]
    fn test_toggle_skips_drafts_without_request() {
        let mut list = loaded(rows());
        select(&mut list, &["d1"]);
        let transport = RecordingTransport::new();

        assert_eq!(list.toggle_unread(&transport, false).unwrap(), 0);
        assert!(transport.requests().is_empty());
        assert!(list.get("d1").unwrap().unread);
    }

    #[test]
    fn test_toggle_failure_leaves_flags() {
        let mut list = loaded(rows());
        select(&mut list, &["o1"]);
        let transport = RecordingTransport::new();
        transport.fail(Method::Post, "toggleUnread", MailboxError::transport("down"));

        assert!(list.toggle_unread(&transport, true).is_err());
        assert!(!list.get("o1").unwrap().unread);
    }

    #[test]
    fn test_trash_keeps_rows_and_clears_selection() {
        let mut list = loaded(rows());
        select(&mut list, &["u1", "r1"]);
        let transport = RecordingTransport::new();

        let snapshot = list.to_trash(&transport).unwrap();
        assert_eq!(snapshot.ids, vec!["u1", "r1"]);
        assert_eq!(snapshot.unread, 1);
        assert_eq!(list.len(), 5);
        assert_eq!(list.messages().selected_count(), 0);
        assert_eq!(transport.requests_to(Method::Put, "trash")[0].body_ids(), vec!["u1", "r1"]);
    }

    #[test]
    fn test_delete_removes_rows() {
        let mut list = loaded(rows());
        select(&mut list, &["u2"]);
        let transport = RecordingTransport::new();

        list.delete_selection(&transport).unwrap();
        assert_eq!(list.len(), 4);
        assert!(list.get("u2").is_none());
        assert_eq!(transport.count(Method::Delete, "delete"), 1);
    }

    #[test]
    fn test_failed_delete_keeps_rows() {
        let mut list = loaded(rows());
        select(&mut list, &["u2"]);
        let transport = RecordingTransport::new();
        transport.fail(Method::Delete, "delete", MailboxError::transport("down"));

        assert!(list.delete_selection(&transport).is_err());
        assert_eq!(list.len(), 5);
        assert!(list.get("u2").unwrap().selected);
    }

    #[test]
    fn test_empty_selection_sends_nothing() {
        let mut list = loaded(rows());
        let transport = RecordingTransport::new();
        assert!(list.move_selection(&transport, "42").unwrap().is_empty());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_move_path() {
        let mut list = loaded(rows());
        select(&mut list, &["r1"]);
        let transport = RecordingTransport::new();
        list.move_selection(&transport, "42").unwrap();
        assert_eq!(transport.count(Method::Put, "move/userfolder/42"), 1);
    }
}
