//! Mailbox session
//!
//! One session per signed-in user. It owns the folder tree, the action
//! handler, the draft being composed and its autosave.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::info;

use crate::actions::{ActionHandler, SendReport, UploadReport};
use crate::config::MailboxConfig;
use crate::error::{MailboxError, Result};
use crate::events::EventBus;
use crate::models::{Message, ReplyKind, UploadSource};
use crate::sync::{AutosaveOutcome, DraftAutosave};
use crate::transport::api::FolderNode;
use crate::transport::{HttpTransport, Transport};
use crate::tree::{FolderTree, SnapshotDiff};

pub struct MailboxSession {
    config: MailboxConfig,
    transport: Arc<dyn Transport>,
    tree: FolderTree,
    actions: ActionHandler,
    autosave: DraftAutosave,
    draft: Option<Message>,
    sending: bool,
}

impl MailboxSession {
    /// Build a session from an existing snapshot without touching the network
    pub fn start(
        config: MailboxConfig,
        transport: Arc<dyn Transport>,
        user_id: impl Into<String>,
        nodes: &[FolderNode],
    ) -> Self {
        let events = EventBus::new();
        let tree = FolderTree::compute(nodes, events.clone());
        let actions = ActionHandler::new(transport.clone(), events, user_id)
            .with_attachment_limit(config.attachment_limit());
        let autosave = DraftAutosave::from_config(&config);
        Self {
            config,
            transport,
            tree,
            actions,
            autosave,
            draft: None,
            sending: false,
        }
    }

    /// Load the folder snapshot and preferences over `transport`
    pub fn bootstrap(
        config: MailboxConfig,
        transport: Arc<dyn Transport>,
        user_id: impl Into<String>,
    ) -> anyhow::Result<Self> {
        let mut session = Self::start(config, transport, user_id, &[]);
        session
            .tree
            .compute_root_folder(&*session.transport)
            .context("Failed to load the folder tree")?;
        session
            .tree
            .sync(&*session.transport)
            .context("Failed to load mailbox preferences")?;
        info!(
            "Session ready for {} with {} user folder(s)",
            session.actions.user_id(),
            session.tree.user_folder_count()
        );
        Ok(session)
    }

    /// Connect to the service named in `config` over HTTP
    pub fn connect(config: MailboxConfig, user_id: impl Into<String>) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&config)
            .with_context(|| format!("Failed to set up transport for {}", config.base_url))?;
        Self::bootstrap(config, Arc::new(transport), user_id)
    }

    pub fn config(&self) -> &MailboxConfig {
        &self.config
    }

    pub fn transport(&self) -> &dyn Transport {
        &*self.transport
    }

    pub fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FolderTree {
        &mut self.tree
    }

    pub fn actions(&self) -> &ActionHandler {
        &self.actions
    }

    pub fn events(&self) -> &EventBus {
        self.tree.events()
    }

    pub fn user_id(&self) -> &str {
        self.actions.user_id()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    // === Folders ===

    pub fn open_folder(&mut self, name: &str) -> Result<()> {
        self.tree.open_folder(&*self.transport, name)
    }

    pub fn open_user_folder(&mut self, path: &str) -> Result<()> {
        self.tree.open_user_folder(&*self.transport, path)
    }

    pub fn next_page(&mut self, select_all: bool) -> Result<crate::list::SyncOutcome> {
        self.tree.current_mut().next_page(&*self.transport, select_all)
    }

    pub fn refresh_tree(&mut self) -> Result<SnapshotDiff> {
        self.tree.compute_root_folder(&*self.transport)
    }

    pub fn open_message(&mut self, id: &str, mark_read: bool) -> Result<Message> {
        self.actions.open(&mut self.tree, id, mark_read)
    }

    /// Trash the message, or delete it forever from the trash
    pub fn remove_message(&mut self, message: &Message) -> Result<()> {
        self.actions.remove(&mut self.tree, message)
    }

    pub fn trash_message(&mut self, message: &Message) -> Result<()> {
        self.actions.trash(&mut self.tree, message)
    }

    pub fn restore_message(&mut self, message: &Message) -> Result<()> {
        self.actions.restore(&mut self.tree, message)
    }

    pub fn move_message(&mut self, message: &Message, target_path: &str) -> Result<()> {
        self.actions.move_to(&mut self.tree, message, target_path)
    }

    pub fn remove_message_from_folder(&mut self, message: &Message) -> Result<()> {
        self.actions.remove_from_folder(&mut self.tree, message)
    }

    // === Drafts ===

    fn with_signature(&self, mut draft: Message) -> Message {
        if let Some(signature) = self.tree.signature().active()
            && draft.id.is_none()
            && draft.reply_kind.is_none()
            && draft.append_signature(signature).is_err()
        {
            log::warn!("Signature not added to draft");
        }
        draft
    }

    /// Start a new draft, replacing any draft in progress
    pub fn compose(&mut self) -> &mut Message {
        self.autosave.cancel();
        let draft = self.with_signature(Message::new_draft());
        self.draft.insert(draft)
    }

    /// Start a reply, reply-all or forward of `original`
    pub fn reply(&mut self, original: &Message, kind: ReplyKind) -> &mut Message {
        self.autosave.cancel();
        let signature = self.tree.signature().active().map(str::to_string);
        let draft = original.derive_draft(kind, self.actions.user_id(), signature.as_deref());
        self.draft.insert(draft)
    }

    /// Start a forward and have the server copy the original's attachments
    pub fn forward(&mut self, original: &Message) -> Result<&mut Message> {
        self.reply(original, ReplyKind::Forward);
        let draft = self.draft.as_mut().ok_or(MailboxError::MissingIdentity)?;
        self.actions.forward(&mut self.tree, original, draft)?;
        Ok(draft)
    }

    /// Continue editing a saved draft
    pub fn resume_draft(&mut self, draft: Message) -> &mut Message {
        self.autosave.cancel();
        self.draft.insert(draft)
    }

    pub fn draft(&self) -> Option<&Message> {
        self.draft.as_ref()
    }

    /// Drop the draft in progress and its pending autosave
    pub fn take_draft(&mut self) -> Option<Message> {
        self.autosave.cancel();
        self.draft.take()
    }

    /// Apply an edit to the draft and schedule an autosave
    pub fn edit_draft<F>(&mut self, now: Instant, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Message) -> Result<()>,
    {
        let draft = self.draft.as_mut().ok_or(MailboxError::MissingIdentity)?;
        edit(draft)?;
        self.autosave.request(now);
        Ok(())
    }

    /// Drive the autosave; call periodically from the host's event loop
    pub fn autosave_tick(&mut self, now: Instant) -> AutosaveOutcome {
        let allowed = !self.sending && self.draft.as_ref().is_some_and(|draft| !draft.is_sent());
        let actions = &self.actions;
        let tree = &mut self.tree;
        let draft = &mut self.draft;
        self.autosave.poll(now, || allowed, || match draft.as_mut() {
            Some(draft) => actions.save_draft(tree, draft),
            None => Ok(()),
        })
    }

    /// Save the draft now; an explicit save supersedes a pending autosave
    pub fn save_draft(&mut self) -> Result<()> {
        let draft = self.draft.as_mut().ok_or(MailboxError::MissingIdentity)?;
        self.autosave.cancel();
        self.actions.save_draft(&mut self.tree, draft)
    }

    pub fn upload_attachments(&mut self, sources: Vec<UploadSource>) -> Result<UploadReport> {
        let draft = self.draft.as_mut().ok_or(MailboxError::MissingIdentity)?;
        self.actions.upload_attachments(&mut self.tree, draft, sources)
    }

    /// Send the draft in progress
    pub fn send_draft(&mut self) -> SendReport {
        let Some(draft) = self.draft.as_mut() else {
            return SendReport::failed(MailboxError::MissingIdentity);
        };
        self.sending = true;
        let report = self.actions.send(&mut self.tree, draft);
        self.sending = false;
        report
    }

    /// End the session, saving a draft whose autosave is still pending
    pub fn logout(mut self) -> Result<()> {
        if self.autosave.is_pending()
            && let Some(draft) = self.draft.as_mut()
            && !draft.is_sent()
        {
            self.autosave.cancel();
            self.actions.save_draft(&mut self.tree, draft)?;
        }
        info!("Session for {} closed", self.actions.user_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Recipient;
    use crate::transport::{Method, RecordingTransport};
    use serde_json::json;
    use std::time::Duration;

    fn session() -> (Arc<RecordingTransport>, MailboxSession) {
        let transport = Arc::new(RecordingTransport::new());
        transport
            .reply(
                Method::Get,
                "root-folder",
                json!({ "path": "/", "folders": [
                    { "path": "/Inbox", "unread": 1, "folders": [
                        { "path": "/Inbox/Work", "folderName": "Work", "id": "257" }
                    ]},
                    { "path": "/Drafts" }
                ]}),
            )
            .reply(Method::Get, "signature", json!({ "useSignature": true, "signature": "Bye" }))
            .always(Method::Post, "draft", json!({ "id": "d1" }));
        let session = MailboxSession::bootstrap(MailboxConfig::default(), transport.clone(), "me").unwrap();
        (transport, session)
    }

    #[test]
    fn test_bootstrap_loads_tree_and_preferences() {
        let (_, session) = session();
        assert_eq!(session.tree().user_folder_count(), 1);
        assert_eq!(session.tree().inbox().unread, 1);
        assert_eq!(session.tree().signature().active(), Some("Bye"));
    }

    #[test]
    fn test_compose_appends_signature() {
        let (_, mut session) = session();
        let draft = session.compose();
        assert!(draft.body().contains("signature new-signature"));
        assert!(draft.body().contains("Bye"));
    }

    #[test]
    fn test_autosave_skips_sent_draft() {
        let (transport, mut session) = session();
        let t0 = Instant::now();
        session.compose();
        session
            .edit_draft(t0, |draft| draft.set_recipients(vec![Recipient::new("bob")], vec![], vec![]))
            .unwrap();
        transport.reply(Method::Post, "send", json!({ "sent": 1 }));
        assert!(session.send_draft().is_delivered());

        let outcome = session.autosave_tick(t0 + Duration::from_secs(6));
        assert!(matches!(outcome, AutosaveOutcome::Skipped));
        assert_eq!(transport.count(Method::Post, "draft"), 0);
    }

    #[test]
    fn test_logout_flushes_pending_autosave() {
        let (transport, mut session) = session();
        session.compose();
        session
            .edit_draft(Instant::now(), |draft| draft.set_subject("Later"))
            .unwrap();

        session.logout().unwrap();
        let saved = &transport.requests_to(Method::Post, "draft")[0];
        assert_eq!(saved.json_body().unwrap()["subject"], json!("Later"));
    }

    #[test]
    fn test_send_without_draft() {
        let (_, mut session) = session();
        let report = session.send_draft();
        assert!(report.undelivered);
        assert!(matches!(report.reason, Some(MailboxError::MissingIdentity)));
    }
}
