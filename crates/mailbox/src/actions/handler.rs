//! Action handler for message operations
//!
//! Opens, moves and trashes messages, saves and sends drafts, and manages
//! attachments. Every mutation is performed in two steps:
//! 1. Call the remote store
//! 2. Update the tree to reflect the confirmed change

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};

use crate::error::{ErrorCode, MailboxError, Result};
use crate::events::{EventBus, MailboxEvent};
use crate::folder::draft::{record_saved, record_sent};
use crate::list::SelectionSnapshot;
use crate::models::{
    Attachment, Message, MessageId, MessageState, Recipient, SystemFolderKind, UploadSource, UploadStatus,
};
use crate::transport::api::{AttachmentRow, AttachmentsResponse, DraftPayload, DraftResponse, MessageRow, SendResponse};
use crate::transport::{
    Request, Transport, decode, decode_or_default, id_body, normalize_attachment, normalize_message,
};
use crate::tree::FolderTree;

/// Outcome of a send. Sending never fails with an error; a rejected or
/// failed send leaves the draft intact and is reported here.
#[derive(Debug, Clone, Default)]
pub struct SendReport {
    pub undelivered: bool,
    /// Number of recipients the server accepted
    pub sent: u32,
    pub inactive: Vec<String>,
    pub rejected: Vec<String>,
    pub reason: Option<MailboxError>,
}

impl SendReport {
    pub(crate) fn failed(reason: MailboxError) -> Self {
        Self {
            undelivered: true,
            reason: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_delivered(&self) -> bool {
        !self.undelivered
    }
}

/// An outstanding send
#[derive(Debug, Clone)]
pub struct SendTicket {
    request: Request,
    draft_id: Option<MessageId>,
}

impl SendTicket {
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// An outstanding upload, bound to the placeholder record it created
#[derive(Debug, Clone)]
pub struct UploadTicket {
    attempt: u64,
    filename: String,
    request: Request,
}

impl UploadTicket {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Outcome of a batch of uploads
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: usize,
    /// `(filename, error)` of every upload that failed
    pub failed: Vec<(String, MailboxError)>,
}

/// Handler for message actions like open, save, send and attach
pub struct ActionHandler {
    transport: Arc<dyn Transport>,
    events: EventBus,
    user_id: String,
    attachment_limit: Option<u64>,
    next_attempt: AtomicU64,
}

impl ActionHandler {
    pub fn new(transport: Arc<dyn Transport>, events: EventBus, user_id: impl Into<String>) -> Self {
        Self {
            transport,
            events,
            user_id: user_id.into(),
            attachment_limit: None,
            next_attempt: AtomicU64::new(0),
        }
    }

    /// Reject local uploads larger than `limit` bytes
    pub fn with_attachment_limit(mut self, limit: Option<u64>) -> Self {
        self.attachment_limit = limit;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Fetch the detail of a message of the current folder.
    ///
    /// Opening an unread message that isn't a draft marks it read and
    /// decrements the current folder's unread counter, unless `mark_read`
    /// is false. A message missing from the current list leaves every
    /// counter alone.
    pub fn open(&self, tree: &mut FolderTree, id: &str, mark_read: bool) -> Result<Message> {
        let body = self.transport.execute(&Request::get(format!("message/{}", id)))?;
        let row: MessageRow = decode(body)?;
        let mut detail = normalize_message(row);

        let folder = tree.current_mut();
        let marks_read = folder
            .list()
            .get(id)
            .is_some_and(|known| mark_read && known.unread && known.state != MessageState::Draft);
        if marks_read {
            detail.unread = false;
            folder.remove_unread(1);
        }

        let opened = match folder.list_mut().get_mut(id) {
            Some(message) => {
                message.merge_detail(detail);
                message.clone()
            }
            None => detail,
        };

        if marks_read {
            let path = tree.current_path().to_string();
            self.events.emit(MailboxEvent::FolderChanged { path });
        }
        info!("Opened message {}", id);
        Ok(opened)
    }

    fn payload(draft: &Message, subject: &str) -> DraftPayload {
        let ids = |list: &[Recipient]| -> Vec<String> { list.iter().map(|r| r.id.clone()).collect() };
        DraftPayload {
            subject: subject.to_string(),
            body: draft.body().to_string(),
            to: ids(draft.to()),
            cc: ids(draft.cc()),
            bcc: ids(draft.bcc()),
            attachments: draft
                .attachments
                .iter()
                .filter(|a| a.is_loaded())
                .map(|a| AttachmentRow {
                    id: a.id.clone(),
                    filename: a.filename.clone(),
                    size: a.size,
                    content_type: a.content_type.clone(),
                })
                .collect(),
        }
    }

    /// Save a draft. A first save creates it (linked to the message it
    /// answers, if any) and adds it to the draft folder.
    pub fn save_draft(&self, tree: &mut FolderTree, draft: &mut Message) -> Result<()> {
        if draft.is_sent() {
            return Err(MailboxError::validation(ErrorCode::MessageAlreadySent));
        }
        let body = serde_json::to_value(Self::payload(draft, draft.subject()))?;
        let was_new = draft.id.is_none();

        let request = match &draft.id {
            Some(id) => Request::put(format!("draft/{}", id.as_str())),
            None => {
                let mut request = Request::post("draft");
                if let Some(parent) = &draft.parent_conversation {
                    request = request.query("In-Reply-To", parent.as_str());
                    if let Some(kind) = draft.reply_kind {
                        request = request.query("reply", kind.as_param());
                    }
                }
                request
            }
        };

        let response: DraftResponse = decode_or_default(self.transport.execute(&request.json(body))?)?;
        if was_new {
            let id = response.id.ok_or(MailboxError::MissingIdentity)?;
            draft.id = Some(MessageId::new(id));
        }
        draft.state = MessageState::Draft;

        record_saved(tree.system_mut(SystemFolderKind::Draft), draft, was_new);
        self.events.emit(MailboxEvent::FolderChanged {
            path: SystemFolderKind::Draft.path().to_string(),
        });
        info!("Saved draft {:?}", draft.id.as_ref().map(|id| id.as_str()));
        Ok(())
    }

    /// Save the draft if it has no server identity yet
    pub fn ensure_saved(&self, tree: &mut FolderTree, draft: &mut Message) -> Result<MessageId> {
        if draft.id.is_none() {
            self.save_draft(tree, draft)?;
        }
        draft.id.clone().ok_or(MailboxError::MissingIdentity)
    }

    /// Build the send request for a draft
    pub fn begin_send(&self, draft: &Message) -> Result<SendTicket> {
        if draft.is_sent() {
            return Err(MailboxError::validation(ErrorCode::MessageAlreadySent));
        }
        let pending = draft.pending_uploads();
        if pending > 0 {
            return Err(MailboxError::AttachmentsPending { pending });
        }

        let body = serde_json::to_value(Self::payload(draft, draft.subject_or_default()))?;
        let mut request = Request::post("send");
        if let Some(id) = &draft.id {
            request = request.query("id", id.as_str());
        }
        if let Some(parent) = &draft.parent_conversation {
            request = request.query("In-Reply-To", parent.as_str());
        }
        Ok(SendTicket {
            request: request.json(body),
            draft_id: draft.id.clone(),
        })
    }

    /// Apply the result of a send
    pub fn finish_send(
        &self,
        tree: &mut FolderTree,
        draft: &mut Message,
        ticket: SendTicket,
        response: Result<serde_json::Value>,
    ) -> SendReport {
        let result = response.and_then(decode_or_default::<SendResponse>);
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Send failed: {}", e);
                return SendReport::failed(e);
            }
        };

        if response.sent == 0 {
            warn!("Send accepted no recipient");
            return SendReport {
                undelivered: true,
                sent: 0,
                inactive: response.inactive,
                rejected: response.undelivered,
                reason: Some(MailboxError::transport("no recipient accepted the message")),
            };
        }

        draft.state = MessageState::Sent;
        let copies = draft.lists_addressing(&self.user_id) as u32;
        if copies > 0 {
            tree.system_mut(SystemFolderKind::Inbox).add_unread(copies);
            self.events.emit(MailboxEvent::FolderChanged {
                path: SystemFolderKind::Inbox.path().to_string(),
            });
        }
        if let Some(id) = &ticket.draft_id {
            record_sent(tree.system_mut(SystemFolderKind::Draft), id.as_str());
            self.events.emit(MailboxEvent::FolderChanged {
                path: SystemFolderKind::Draft.path().to_string(),
            });
        }
        tree.refresh_quota_quietly(&*self.transport);

        info!("Sent message to {} recipient(s)", response.sent);
        SendReport {
            undelivered: false,
            sent: response.sent,
            inactive: response.inactive,
            rejected: response.undelivered,
            reason: None,
        }
    }

    /// Send a draft and report the outcome
    pub fn send(&self, tree: &mut FolderTree, draft: &mut Message) -> SendReport {
        let ticket = match self.begin_send(draft) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Send refused: {}", e);
                return SendReport::failed(e);
            }
        };
        let response = self.transport.execute(ticket.request());
        self.finish_send(tree, draft, ticket, response)
    }

    /// Check the size limit, add a loading placeholder and build the request.
    /// The draft must have been saved.
    pub fn begin_upload(&self, draft: &mut Message, source: &UploadSource) -> Result<UploadTicket> {
        let id = draft.id.clone().ok_or(MailboxError::MissingIdentity)?;
        let filename = source.filename();

        let (size, request) = match source {
            UploadSource::LocalFile(path) => {
                let size = std::fs::metadata(path)?.len();
                if let Some(limit) = self.attachment_limit
                    && size > limit
                {
                    return Err(MailboxError::validation(ErrorCode::AttachmentTooLarge { size, limit }));
                }
                let bytes = std::fs::read(path)?;
                let request = Request::post(format!("message/{}/attachment", id.as_str())).file(
                    filename.clone(),
                    None,
                    bytes,
                );
                (size, request)
            }
            UploadSource::Workspace { file_id, size, .. } => (
                *size,
                Request::post(format!("message/{}/upload/{}", id.as_str(), file_id)),
            ),
        };

        let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed) + 1;
        draft
            .attachments
            .push(Attachment::pending(attempt, source.as_source(), filename.clone(), size));
        Ok(UploadTicket {
            attempt,
            filename,
            request,
        })
    }

    /// Apply the result of an upload. Success replaces the attachment list
    /// with the server's, keeping the other uploads still running; failure
    /// removes this attempt's record and notifies the host.
    pub fn finish_upload(
        &self,
        draft: &mut Message,
        ticket: UploadTicket,
        response: Result<serde_json::Value>,
    ) -> Result<()> {
        match response.and_then(decode_or_default::<AttachmentsResponse>) {
            Ok(response) => {
                let waiting: Vec<Attachment> = draft
                    .attachments
                    .drain(..)
                    .filter(|a| a.status == UploadStatus::Loading && a.attempt != Some(ticket.attempt))
                    .collect();
                draft.attachments = response.attachments.into_iter().map(normalize_attachment).collect();
                draft.attachments.extend(waiting);
                draft.has_attachment = !draft.attachments.is_empty();
                info!("Uploaded {}", ticket.filename);
                Ok(())
            }
            Err(e) => {
                draft.attachments.retain(|a| a.attempt != Some(ticket.attempt));
                self.upload_failed(&ticket.filename, &e);
                Err(e)
            }
        }
    }

    fn upload_failed(&self, filename: &str, error: &MailboxError) {
        warn!("Upload of {} failed: {}", filename, error);
        self.events.emit(MailboxEvent::AttachmentUploadFailed {
            filename: filename.to_string(),
            error: error.to_string(),
        });
    }

    /// Upload files to a draft, saving it first when needed. A failed
    /// upload doesn't stop the others.
    pub fn upload_attachments(
        &self,
        tree: &mut FolderTree,
        draft: &mut Message,
        sources: Vec<UploadSource>,
    ) -> Result<UploadReport> {
        self.ensure_saved(tree, draft)?;

        let mut report = UploadReport::default();
        for source in sources {
            let ticket = match self.begin_upload(draft, &source) {
                Ok(ticket) => ticket,
                Err(e) => {
                    let filename = source.filename();
                    self.upload_failed(&filename, &e);
                    report.failed.push((filename, e));
                    continue;
                }
            };
            let filename = ticket.filename.clone();
            let response = self.transport.execute(ticket.request());
            match self.finish_upload(draft, ticket, response) {
                Ok(()) => report.uploaded += 1,
                Err(e) => report.failed.push((filename, e)),
            }
        }
        Ok(report)
    }

    /// Remove an attachment from a saved draft
    pub fn delete_attachment(&self, draft: &mut Message, attachment_id: &str) -> Result<()> {
        let id = draft.id.clone().ok_or(MailboxError::MissingIdentity)?;
        let request = Request::delete(format!("message/{}/attachment/{}", id.as_str(), attachment_id));
        let response: AttachmentsResponse = decode_or_default(self.transport.execute(&request)?)?;

        let waiting: Vec<Attachment> = draft
            .attachments
            .drain(..)
            .filter(|a| a.status == UploadStatus::Loading)
            .collect();
        draft.attachments = response.attachments.into_iter().map(normalize_attachment).collect();
        draft.attachments.extend(waiting);
        draft.has_attachment = !draft.attachments.is_empty();
        Ok(())
    }

    /// Save a forward draft, then have the server copy the original's
    /// attachments onto it
    pub fn forward(&self, tree: &mut FolderTree, original: &Message, draft: &mut Message) -> Result<()> {
        let original_id = original.id.clone().ok_or(MailboxError::MissingIdentity)?;
        let id = self.ensure_saved(tree, draft)?;

        self.transport.execute(&Request::put(format!(
            "message/{}/forward/{}",
            id.as_str(),
            original_id.as_str()
        )))?;
        draft.attachments.extend(original.attachments.iter().cloned());
        draft.has_attachment = !draft.attachments.is_empty();
        tree.refresh_quota_quietly(&*self.transport);
        info!("Forwarded {} as {}", original_id.as_str(), id.as_str());
        Ok(())
    }

    // === Single-message actions of the reading view ===

    fn single(message: &Message) -> Result<SelectionSnapshot> {
        let id = message.id.as_ref().ok_or(MailboxError::MissingIdentity)?;
        Ok(SelectionSnapshot {
            ids: vec![id.as_str().to_string()],
            unread: u32::from(message.unread),
        })
    }

    /// Trash `message` from the current folder, or delete it forever when
    /// the trash is current
    pub fn remove(&self, tree: &mut FolderTree, message: &Message) -> Result<()> {
        if !tree.current().is(SystemFolderKind::Trash) {
            return self.trash(tree, message);
        }
        let snapshot = Self::single(message)?;
        self.transport
            .execute(&Request::delete("delete").json(id_body(&snapshot.ids)))?;

        let trash = tree.system_mut(SystemFolderKind::Trash);
        trash.list_mut().messages_mut().remove_ids(&snapshot.ids);
        trash.remove_unread(snapshot.unread);
        trash.count = trash.count.saturating_sub(1);
        let trash_path = SystemFolderKind::Trash.path();
        self.events.emit(MailboxEvent::FolderChanged {
            path: trash_path.to_string(),
        });
        tree.refresh_quietly(&*self.transport, trash_path);
        tree.refresh_quota_quietly(&*self.transport);
        info!("Deleted message {} forever", snapshot.ids[0]);
        Ok(())
    }

    /// Move `message` from the current folder to the trash
    pub fn trash(&self, tree: &mut FolderTree, message: &Message) -> Result<()> {
        let snapshot = Self::single(message)?;
        let source = tree.current_path().to_string();
        self.transport
            .execute(&Request::put("trash").json(id_body(&snapshot.ids)))?;

        let trash_path = SystemFolderKind::Trash.path();
        tree.shift_counts(&source, trash_path, &snapshot);
        tree.refresh_quietly(&*self.transport, &source);
        if source != trash_path {
            tree.refresh_quietly(&*self.transport, trash_path);
        }
        tree.refresh_quota_quietly(&*self.transport);
        info!("Trashed message {} from {}", snapshot.ids[0], source);
        Ok(())
    }

    /// Take `message` out of the trash
    pub fn restore(&self, tree: &mut FolderTree, message: &Message) -> Result<()> {
        let snapshot = Self::single(message)?;
        self.transport
            .execute(&Request::put("restore").json(id_body(&snapshot.ids)))?;

        let trash = tree.system_mut(SystemFolderKind::Trash);
        trash.list_mut().messages_mut().remove_ids(&snapshot.ids);
        trash.remove_unread(snapshot.unread);
        trash.count = trash.count.saturating_sub(1);
        let trash_path = SystemFolderKind::Trash.path();
        self.events.emit(MailboxEvent::FolderChanged {
            path: trash_path.to_string(),
        });
        tree.refresh_quietly(&*self.transport, trash_path);
        info!("Restored message {}", snapshot.ids[0]);
        Ok(())
    }

    /// Move `message` from the current folder into the user folder at `target_path`
    pub fn move_to(&self, tree: &mut FolderTree, message: &Message, target_path: &str) -> Result<()> {
        let target_id = tree
            .user_folder(target_path)?
            .user_id()
            .unwrap_or_default()
            .to_string();
        let snapshot = Self::single(message)?;
        let source = tree.current_path().to_string();
        self.transport.execute(
            &Request::put(format!("move/userfolder/{}", target_id)).json(id_body(&snapshot.ids)),
        )?;

        tree.shift_counts(&source, target_path, &snapshot);
        tree.refresh_quietly(&*self.transport, &source);
        info!("Moved message {} to {}", snapshot.ids[0], target_path);
        Ok(())
    }

    /// Move `message` out of the current user folder, back to the inbox
    pub fn remove_from_folder(&self, tree: &mut FolderTree, message: &Message) -> Result<()> {
        let source = tree.current_path().to_string();
        tree.user_folder(&source)?;
        let snapshot = Self::single(message)?;
        self.transport
            .execute(&Request::put("move/root").json(id_body(&snapshot.ids)))?;

        let inbox_path = SystemFolderKind::Inbox.path();
        tree.shift_counts(&source, inbox_path, &snapshot);
        tree.refresh_quietly(&*self.transport, &source);
        info!("Moved message {} back to the inbox", snapshot.ids[0]);
        Ok(())
    }

    /// Acknowledge a message that asked for a delivery report
    pub fn send_delivery_report(&self, message: &Message) -> Result<()> {
        let id = message.id.as_ref().ok_or(MailboxError::MissingIdentity)?;
        self.transport
            .execute(&Request::post(format!("message/{}/deliveryReport", id.as_str())))?;
        Ok(())
    }
}
