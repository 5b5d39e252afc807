//! Response normalization
//!
//! Converts remote store rows to domain models.

use serde_json::Value;

use super::api::{AttachmentRow, MessageRow};
use super::decode;
use crate::error::Result;
use crate::models::{Attachment, FolderClass, Message, MessageState, Recipient};

/// Normalize a message row to a Message, resolving recipients through the
/// row's display-name table.
pub fn normalize_message(row: MessageRow) -> Message {
    let resolve = |id: String| -> Recipient {
        match row.display_names.iter().find(|(known, _)| *known == id) {
            Some((_, name)) => Recipient::with_name(id, name.clone()),
            None => Recipient::new(id),
        }
    };

    let to: Vec<Recipient> = row.to.iter().cloned().map(resolve).collect();
    let cc: Vec<Recipient> = row.cc.iter().cloned().map(resolve).collect();
    let bcc: Vec<Recipient> = row.bcc.iter().cloned().map(resolve).collect();

    let attachments: Vec<Attachment> = row.attachments.into_iter().map(normalize_attachment).collect();

    let mut builder = Message::builder()
        .date_millis(row.date.unwrap_or(0))
        .display_names(row.display_names)
        .to(to)
        .cc(cc)
        .bcc(bcc)
        .subject(row.subject.unwrap_or_default())
        .body(row.body.unwrap_or_default())
        .unread(row.unread)
        .state(
            row.state
                .as_deref()
                .map(MessageState::from_server)
                .unwrap_or(MessageState::Sent),
        )
        .has_attachment(row.has_attachment)
        .attachments(attachments)
        .report_required(row.is_report_required);

    if let Some(id) = row.id {
        builder = builder.id(id);
    }
    if let Some(from) = row.from {
        builder = builder.from(from);
    }
    if let Some(class) = row.system_folder.as_deref().and_then(FolderClass::from_server) {
        builder = builder.folder_class(class);
    }

    builder.build()
}

/// Normalize an attachment row; filenames arrive URI-encoded
pub fn normalize_attachment(row: AttachmentRow) -> Attachment {
    let filename = urlencoding::decode(&row.filename)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(row.filename);
    Attachment::remote(row.id.unwrap_or_default(), filename, row.size, row.content_type)
}

/// Decode a `list` response. A null body counts as an empty page.
pub fn normalize_rows(body: Value) -> Result<Vec<Message>> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    let rows: Vec<MessageRow> = decode(body)?;
    Ok(rows.into_iter().map(normalize_message).collect())
}
