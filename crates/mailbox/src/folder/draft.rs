//! Draft folder bookkeeping after saves and sends

use super::Folder;
use crate::models::Message;

/// Record a confirmed draft save: the draft shows up in the list, and a
/// first save grows the total.
pub fn record_saved(drafts: &mut Folder, draft: &Message, was_new: bool) {
    if draft.id.is_none() {
        return;
    }
    drafts.list_mut().insert(draft.clone());
    if was_new {
        drafts.count = drafts.count.saturating_add(1);
    }
}

/// Record that a saved draft was sent and left the draft folder
pub fn record_sent(drafts: &mut Folder, draft_id: &str) {
    drafts
        .list_mut()
        .messages_mut()
        .remove_ids(&[draft_id.to_string()]);
    drafts.count = drafts.count.saturating_sub(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SystemFolderKind;

    #[test]
    fn test_first_save_counts_once() {
        let mut drafts = Folder::system(SystemFolderKind::Draft, 0, 3);
        let draft = Message::builder().id("d1").subject("Plan").build();

        record_saved(&mut drafts, &draft, true);
        record_saved(&mut drafts, &draft, false);
        assert_eq!(drafts.count, 4);
        assert_eq!(drafts.list().len(), 1);
    }

    #[test]
    fn test_unsaved_draft_ignored() {
        let mut drafts = Folder::system(SystemFolderKind::Draft, 0, 0);
        record_saved(&mut drafts, &Message::new_draft(), true);
        assert_eq!(drafts.count, 0);
        assert!(drafts.list().is_empty());
    }

    #[test]
    fn test_sent_leaves_folder() {
        let mut drafts = Folder::system(SystemFolderKind::Draft, 0, 0);
        let draft = Message::builder().id("d1").build();
        record_saved(&mut drafts, &draft, true);

        record_sent(&mut drafts, "d1");
        assert_eq!(drafts.count, 0);
        assert!(drafts.list().is_empty());
        record_sent(&mut drafts, "d1");
        assert_eq!(drafts.count, 0);
    }
}
