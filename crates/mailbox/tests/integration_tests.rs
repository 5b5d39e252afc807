//! Integration tests for the mailbox crate
//!
//! These tests drive a complete session over a scripted transport, from the
//! folder snapshot to list paging, bulk operations and drafts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mailbox::{
    AutosaveOutcome, MailboxConfig, MailboxSession, Method, Recipient, RecordingTransport,
    SyncOutcome, SystemFolderKind,
};
use serde_json::{Value, json};

fn root_snapshot(inbox_unread: u32, user_folders: Value) -> Value {
    json!({
        "path": "/",
        "folderName": "",
        "folders": [
            { "path": "/Inbox", "folderName": "Inbox", "unread": inbox_unread, "count": 40, "folders": user_folders },
            { "path": "/Sent", "folderName": "Sent" },
            { "path": "/Drafts", "folderName": "Drafts" },
            { "path": "/Trash", "folderName": "Trash" },
            { "path": "/Junk", "folderName": "Junk" }
        ]
    })
}

fn rows(count: usize, offset: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| {
                let n = offset + i;
                json!({
                    "id": format!("m{}", n),
                    "date": 1_700_000_000_000_i64 - n as i64 * 1000,
                    "subject": format!("Message {}", n),
                    "unread": false,
                    "systemFolder": "INBOX"
                })
            })
            .collect(),
    )
}

/// Helper to bootstrap a session over a scripted transport
fn session_with(inbox_unread: u32, user_folders: Value) -> (Arc<RecordingTransport>, MailboxSession) {
    let transport = Arc::new(RecordingTransport::new());
    transport.reply(Method::Get, "root-folder", root_snapshot(inbox_unread, user_folders));
    let config = MailboxConfig {
        autosave_delay_ms: 5000,
        ..MailboxConfig::default()
    };
    let session = MailboxSession::bootstrap(config, transport.clone(), "me").unwrap();
    transport.clear_log();
    (transport, session)
}

#[test]
fn test_next_page_stops_once_full() {
    let (transport, mut session) = session_with(0, json!([]));
    transport
        .reply(Method::Get, "list", rows(20, 0))
        .reply(Method::Get, "list", json!([]));

    session.open_folder("INBOX").unwrap();
    assert_eq!(session.tree().current().list().len(), 20);
    assert!(!session.tree().current().list().is_full());

    let outcome = session.next_page(false).unwrap();
    assert_eq!(outcome, SyncOutcome::Applied { fetched: 0, full: true });
    let list_requests = transport.requests_to(Method::Get, "list");
    assert_eq!(list_requests[1].query_value("page"), Some("1"));

    assert_eq!(session.next_page(false).unwrap(), SyncOutcome::Skipped);
    assert_eq!(session.next_page(true).unwrap(), SyncOutcome::Skipped);
    assert_eq!(transport.count(Method::Get, "list"), 2);
    assert_eq!(session.tree().current().list().len(), 20);
}

#[test]
fn test_pages_stay_sorted_and_unique() {
    let (transport, mut session) = session_with(0, json!([]));
    transport
        .reply(Method::Get, "list", rows(5, 0))
        // The second page overlaps the first by two rows
        .reply(Method::Get, "list", rows(5, 3));

    session.open_folder("INBOX").unwrap();
    session.next_page(false).unwrap();

    let list = session.tree().current().list();
    assert_eq!(list.len(), 8);
    let dates: Vec<_> = list.messages().iter().map(|m| m.date).collect();
    let mut sorted = dates.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(dates, sorted);
}

#[test]
fn test_mark_read_sends_only_unread_ids() {
    let (transport, mut session) = session_with(5, json!([]));
    transport.reply(
        Method::Get,
        "list",
        json!([
            { "id": "u1", "date": 3, "unread": true, "systemFolder": "INBOX" },
            { "id": "u2", "date": 2, "unread": true, "systemFolder": "INBOX" },
            { "id": "r1", "date": 1, "unread": false, "systemFolder": "INBOX" }
        ]),
    );
    session.open_folder("INBOX").unwrap();
    session.tree_mut().select_all();

    let changed = session
        .tree_mut()
        .toggle_unread_selection(&*transport, false)
        .unwrap();

    assert_eq!(changed, 2);
    let toggle = &transport.requests_to(Method::Post, "toggleUnread")[0];
    assert_eq!(toggle.query_values("id"), vec!["u1", "u2"]);
    assert_eq!(toggle.query_value("unread"), Some("false"));
    assert_eq!(session.tree().inbox().unread, 3);
    assert_eq!(session.tree().inbox().list().messages().selected_count(), 0);
}

#[test]
fn test_deselect_all_is_idempotent() {
    let (transport, mut session) = session_with(0, json!([]));
    transport.reply(Method::Get, "list", rows(3, 0));
    session.open_folder("INBOX").unwrap();
    session.tree_mut().select_all();

    session.tree_mut().deselect_all();
    let once: Vec<bool> = session.tree().current().list().messages().iter().map(|m| m.selected).collect();
    session.tree_mut().deselect_all();
    let twice: Vec<bool> = session.tree().current().list().messages().iter().map(|m| m.selected).collect();

    assert_eq!(once, twice);
    assert!(once.iter().all(|selected| !selected));
}

#[test]
fn test_autosave_coalesces_to_latest_content() {
    let (transport, mut session) = session_with(0, json!([]));
    transport.always(Method::Post, "draft", json!({ "id": "d1" }));
    let t0 = Instant::now();

    session.compose();
    session.edit_draft(t0, |draft| draft.set_body("A")).unwrap();
    session
        .edit_draft(t0 + Duration::from_secs(2), |draft| draft.set_body("B"))
        .unwrap();

    assert!(matches!(
        session.autosave_tick(t0 + Duration::from_secs(4)),
        AutosaveOutcome::Waiting
    ));
    assert!(matches!(
        session.autosave_tick(t0 + Duration::from_secs(5)),
        AutosaveOutcome::Saved
    ));
    assert!(matches!(
        session.autosave_tick(t0 + Duration::from_secs(10)),
        AutosaveOutcome::Idle
    ));

    let saves = transport.requests_to(Method::Post, "draft");
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].json_body().unwrap()["body"], json!("B"));
}

#[test]
fn test_snapshot_purges_vanished_folder() {
    let (transport, mut session) = session_with(
        0,
        json!([
            { "path": "/Inbox/Work", "folderName": "Work", "id": "257", "folders": [
                { "path": "/Inbox/Work/Old", "folderName": "Old", "id": "301" }
            ]}
        ]),
    );
    assert!(session.tree().lookup("/Inbox/Work/Old").is_some());

    transport.reply(
        Method::Get,
        "root-folder",
        root_snapshot(0, json!([{ "path": "/Inbox/Work", "folderName": "Work", "id": "257" }])),
    );
    let diff = session.refresh_tree().unwrap();

    assert_eq!(diff.removed, vec!["/Inbox/Work/Old"]);
    assert!(session.tree().lookup("/Inbox/Work/Old").is_none());
    assert!(session.tree().children_of("/Inbox/Work").is_empty());
    assert!(!session.tree().paths().contains(&"/Inbox/Work/Old".to_string()));
}

#[test]
fn test_saved_draft_reopens_with_same_recipients() {
    let (transport, mut session) = session_with(0, json!([]));
    transport.reply(Method::Post, "draft", json!({ "id": "d1" }));

    session.compose();
    session
        .edit_draft(Instant::now(), |draft| {
            draft.set_subject("Minutes")?;
            draft.set_recipients(
                vec![Recipient::with_name("u1", "Ann Lee")],
                vec![Recipient::with_name("u2", "Bo Chen")],
                vec![],
            )
        })
        .unwrap();
    session.save_draft().unwrap();

    let saved = transport.requests_to(Method::Post, "draft")[0]
        .json_body()
        .cloned()
        .unwrap();
    assert_eq!(saved["to"], json!(["u1"]));
    assert_eq!(saved["cc"], json!(["u2"]));

    // The detail answers with ids plus the display-name table
    transport.reply(
        Method::Get,
        "message/d1",
        json!({
            "id": "d1",
            "date": 1,
            "state": "DRAFT",
            "subject": "Minutes",
            "to": saved["to"],
            "cc": saved["cc"],
            "displayNames": [["u1", "Ann Lee"], ["u2", "Bo Chen"]]
        }),
    );
    session.open_folder("DRAFT").unwrap();
    let reopened = session.open_message("d1", true).unwrap();

    assert_eq!(reopened.to(), session.draft().unwrap().to());
    assert_eq!(reopened.cc(), session.draft().unwrap().cc());
    assert_eq!(reopened.to()[0].display_name.as_deref(), Some("Ann Lee"));
}

#[test]
fn test_trash_moves_unread_counters() {
    let (transport, mut session) = session_with(2, json!([]));
    transport.reply(
        Method::Get,
        "list",
        json!([
            { "id": "a", "date": 2, "unread": true, "systemFolder": "INBOX" },
            { "id": "b", "date": 1, "unread": false, "systemFolder": "INBOX" }
        ]),
    );
    session.open_folder("INBOX").unwrap();
    session.tree_mut().select_all();

    session.tree_mut().remove_selection(&*transport).unwrap();

    let trash = &transport.requests_to(Method::Put, "trash")[0];
    assert_eq!(trash.body_ids(), vec!["a", "b"]);
    assert_eq!(session.tree().inbox().unread, 1);
    assert_eq!(session.tree().system(SystemFolderKind::Trash).unread, 1);
    // The list was reloaded from the server after the move
    assert_eq!(transport.count(Method::Get, "list"), 2);
}

#[test]
fn test_failed_list_sync_leaves_state() {
    let (transport, mut session) = session_with(0, json!([]));
    transport
        .reply(Method::Get, "list", rows(4, 0))
        .fail(Method::Get, "list", mailbox::MailboxError::transport("timeout"));

    session.open_folder("INBOX").unwrap();
    assert!(session.next_page(false).is_err());
    assert_eq!(session.tree().current().list().len(), 4);
    assert_eq!(session.tree().current().list().page(), 0);
    assert!(!session.tree().current().list().is_syncing());
}
