//! Message model: one mail item with read state, recipients and draft semantics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attachment::{Attachment, UploadStatus};
use crate::error::{ErrorCode, MailboxError, Result};
use crate::selection::Selectable;

/// Server identifier of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A recipient reference: user or group id plus the name shown for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub display_name: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }

    /// Name for display, falling back to the id
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Lifecycle of a message from the client's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageState {
    #[default]
    Draft,
    Sent,
}

impl MessageState {
    pub fn from_server(state: &str) -> Self {
        if state.eq_ignore_ascii_case("DRAFT") {
            MessageState::Draft
        } else {
            MessageState::Sent
        }
    }
}

/// Which system-folder semantics apply to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderClass {
    Inbox,
    Outbox,
    Draft,
}

impl FolderClass {
    pub fn from_server(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "INBOX" => Some(FolderClass::Inbox),
            "OUTBOX" => Some(FolderClass::Outbox),
            "DRAFT" => Some(FolderClass::Draft),
            _ => None,
        }
    }

    /// Messages of this class take part in read/unread toggling
    pub fn supports_unread_toggle(self) -> bool {
        matches!(self, FolderClass::Inbox | FolderClass::Outbox)
    }
}

/// How a derived draft relates to the message it was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Reply,
    ReplyAll,
    Forward,
}

impl ReplyKind {
    pub fn subject_prefix(self) -> &'static str {
        match self {
            ReplyKind::Reply | ReplyKind::ReplyAll => "Re:",
            ReplyKind::Forward => "Fwd:",
        }
    }

    /// Value of the `reply` query parameter on first save
    pub fn as_param(self) -> &'static str {
        match self {
            ReplyKind::Reply => "reply",
            ReplyKind::ReplyAll => "replyAll",
            ReplyKind::Forward => "forward",
        }
    }
}

/// Subject used when sending without one
pub const NO_SUBJECT: &str = "(no subject)";

/// A single mail entity
#[derive(Debug, Clone)]
pub struct Message {
    /// Server identity, absent until a draft is first saved
    pub id: Option<MessageId>,
    /// Timestamp used for list ordering
    pub date: DateTime<Utc>,
    /// Sender id
    pub from: Option<String>,
    /// `(id, display name)` pairs the server sent to resolve ids
    pub display_names: Vec<(String, String)>,
    pub unread: bool,
    pub state: MessageState,
    pub folder_class: Option<FolderClass>,
    pub has_attachment: bool,
    pub attachments: Vec<Attachment>,
    pub selected: bool,
    /// Message this draft replies to
    pub parent_conversation: Option<MessageId>,
    pub reply_kind: Option<ReplyKind>,
    /// Whether the sender asked for a delivery report
    pub report_required: bool,
    subject: String,
    body: String,
    to: Vec<Recipient>,
    cc: Vec<Recipient>,
    bcc: Vec<Recipient>,
}

impl Selectable for Message {
    fn selection_id(&self) -> Option<&str> {
        self.id.as_ref().map(|id| id.as_str())
    }

    fn is_selected(&self) -> bool {
        self.selected
    }

    fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }
}

impl Message {
    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// An empty client-side draft
    pub fn new_draft() -> Self {
        MessageBuilder::default().build()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Subject for display or sending, with a fallback when empty
    pub fn subject_or_default(&self) -> &str {
        if self.subject.trim().is_empty() {
            NO_SUBJECT
        } else {
            &self.subject
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn to(&self) -> &[Recipient] {
        &self.to
    }

    pub fn cc(&self) -> &[Recipient] {
        &self.cc
    }

    pub fn bcc(&self) -> &[Recipient] {
        &self.bcc
    }

    pub fn is_sent(&self) -> bool {
        self.state == MessageState::Sent
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.is_sent() {
            return Err(MailboxError::validation(ErrorCode::MessageAlreadySent));
        }
        Ok(())
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) -> Result<()> {
        self.ensure_editable()?;
        self.subject = subject.into();
        Ok(())
    }

    pub fn set_body(&mut self, body: impl Into<String>) -> Result<()> {
        self.ensure_editable()?;
        self.body = body.into();
        Ok(())
    }

    pub fn set_recipients(
        &mut self,
        to: Vec<Recipient>,
        cc: Vec<Recipient>,
        bcc: Vec<Recipient>,
    ) -> Result<()> {
        self.ensure_editable()?;
        self.to = to;
        self.cc = cc;
        self.bcc = bcc;
        Ok(())
    }

    /// Append a signature block to the body
    pub fn append_signature(&mut self, signature: &str) -> Result<()> {
        self.ensure_editable()?;
        self.body.push_str(&signature_block(signature));
        Ok(())
    }

    /// Resolve an id through the message's display-name table
    pub fn resolve(&self, id: &str) -> Recipient {
        match self.display_names.iter().find(|(known, _)| known == id) {
            Some((_, name)) => Recipient::with_name(id, name.clone()),
            None => Recipient::new(id),
        }
    }

    pub fn sender(&self) -> Option<Recipient> {
        self.from.as_deref().map(|id| self.resolve(id))
    }

    pub fn is_user_author(&self, user_id: &str) -> bool {
        self.from.as_deref() == Some(user_id)
    }

    /// Number of recipient lists (to, cc, bcc) naming `user_id`
    pub fn lists_addressing(&self, user_id: &str) -> usize {
        [&self.to, &self.cc, &self.bcc]
            .iter()
            .filter(|list| list.iter().any(|r| r.id == user_id))
            .count()
    }

    /// Unread as shown to the user: only inbox mail counts
    pub fn is_unread_in(&self, viewing_inbox: bool) -> bool {
        self.unread && (self.folder_class == Some(FolderClass::Inbox) || viewing_inbox)
    }

    pub fn pending_uploads(&self) -> usize {
        self.attachments
            .iter()
            .filter(|a| a.status == UploadStatus::Loading)
            .count()
    }

    /// Replace recipients, subject, body and attachments with the values
    /// from a server detail, keeping client-only flags.
    pub(crate) fn merge_detail(&mut self, detail: Message) {
        let selected = self.selected;
        let parent = self.parent_conversation.take();
        let reply_kind = self.reply_kind.take();
        *self = detail;
        self.selected = selected;
        self.parent_conversation = self.parent_conversation.take().or(parent);
        self.reply_kind = self.reply_kind.or(reply_kind);
    }

    /// Build a new draft answering or forwarding this message.
    ///
    /// The original is never modified; a sent message stays as it is and
    /// the edit happens on the returned draft.
    pub fn derive_draft(&self, kind: ReplyKind, me: &str, signature: Option<&str>) -> Message {
        let prefix = kind.subject_prefix();
        let subject = if self.subject.contains(prefix) {
            self.subject.clone()
        } else {
            format!("{} {}", prefix, self.subject)
        };

        let sender = self.sender();
        let (to, cc) = match kind {
            ReplyKind::Reply => (sender.into_iter().collect(), Vec::new()),
            ReplyKind::ReplyAll => {
                let mut to: Vec<Recipient> = sender.into_iter().collect();
                for recipient in &self.to {
                    if recipient.id != me && !to.iter().any(|r| r.id == recipient.id) {
                        to.push(recipient.clone());
                    }
                }
                let cc = self.cc.iter().filter(|r| r.id != me).cloned().collect();
                (to, cc)
            }
            ReplyKind::Forward => (Vec::new(), Vec::new()),
        };

        let mut body = String::new();
        if let Some(signature) = signature {
            body.push_str(&signature_block(signature));
        }
        body.push_str("<blockquote>");
        body.push_str(&self.body);
        body.push_str("</blockquote>");

        let mut draft = Message::builder()
            .subject(subject)
            .body(body)
            .to(to)
            .cc(cc)
            .build();
        draft.parent_conversation = self.id.clone();
        draft.reply_kind = Some(kind);
        draft
    }
}

fn signature_block(signature: &str) -> String {
    format!(
        "<div><br></div><div class=\"signature new-signature\">{}</div>",
        signature
    )
}

/// Builder for creating Message instances
#[derive(Default)]
pub struct MessageBuilder {
    id: Option<MessageId>,
    date: Option<DateTime<Utc>>,
    from: Option<String>,
    display_names: Vec<(String, String)>,
    to: Vec<Recipient>,
    cc: Vec<Recipient>,
    bcc: Vec<Recipient>,
    subject: String,
    body: String,
    unread: bool,
    state: MessageState,
    folder_class: Option<FolderClass>,
    has_attachment: bool,
    attachments: Vec<Attachment>,
    report_required: bool,
}

impl MessageBuilder {
    pub fn id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn date_millis(mut self, millis: i64) -> Self {
        self.date = DateTime::from_timestamp_millis(millis);
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn display_names(mut self, names: Vec<(String, String)>) -> Self {
        self.display_names = names;
        self
    }

    pub fn to(mut self, to: Vec<Recipient>) -> Self {
        self.to = to;
        self
    }

    pub fn cc(mut self, cc: Vec<Recipient>) -> Self {
        self.cc = cc;
        self
    }

    pub fn bcc(mut self, bcc: Vec<Recipient>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn unread(mut self, unread: bool) -> Self {
        self.unread = unread;
        self
    }

    pub fn state(mut self, state: MessageState) -> Self {
        self.state = state;
        self
    }

    pub fn folder_class(mut self, class: FolderClass) -> Self {
        self.folder_class = Some(class);
        self
    }

    pub fn has_attachment(mut self, has_attachment: bool) -> Self {
        self.has_attachment = has_attachment;
        self
    }

    pub fn attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn report_required(mut self, required: bool) -> Self {
        self.report_required = required;
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            date: self.date.unwrap_or_default(),
            from: self.from,
            display_names: self.display_names,
            unread: self.unread,
            state: self.state,
            folder_class: self.folder_class,
            has_attachment: self.has_attachment || !self.attachments.is_empty(),
            attachments: self.attachments,
            selected: false,
            parent_conversation: None,
            reply_kind: None,
            report_required: self.report_required,
            subject: self.subject,
            body: self.body,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
        }
    }
}
