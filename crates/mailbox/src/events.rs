//! Change notifications for the host
//!
//! The host subscribes to tree-wide changes or to the changes of one folder.
//! Callbacks run synchronously on the thread that raised the event.

use std::sync::{Arc, RwLock};

/// A change the host may want to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent {
    /// A folder was opened, re-synced or had its counters changed
    FolderChanged { path: String },
    /// The message list of a folder was reloaded
    MailListRefreshed { path: String },
    /// The folder tree, preferences or quota changed
    TreeChanged,
    /// One upload failed; its record was removed from the draft
    AttachmentUploadFailed { filename: String, error: String },
}

impl MailboxEvent {
    /// Folder the event is about, if any
    pub fn folder(&self) -> Option<&str> {
        match self {
            MailboxEvent::FolderChanged { path } | MailboxEvent::MailListRefreshed { path } => Some(path),
            _ => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&MailboxEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    folder: Option<String>,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// Cloneable publish/subscribe hub; clones share subscribers
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<RwLock<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, folder: Option<String>, listener: Listener) -> SubscriptionId {
        let Ok(mut registry) = self.registry.write() else {
            log::warn!("Event registry poisoned, subscription dropped");
            return SubscriptionId(u64::MAX);
        };
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.push(Subscriber { id, folder, listener });
        id
    }

    /// Receive every event
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&MailboxEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Receive only the events about one folder
    pub fn subscribe_folder<F>(&self, path: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&MailboxEvent) + Send + Sync + 'static,
    {
        self.register(Some(path.into()), Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.registry.write() {
            Ok(mut registry) => {
                let before = registry.subscribers.len();
                registry.subscribers.retain(|s| s.id != id);
                registry.subscribers.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().map(|r| r.subscribers.len()).unwrap_or(0)
    }

    /// Deliver an event to matching subscribers
    pub fn emit(&self, event: MailboxEvent) {
        // Listeners are cloned out so a callback may subscribe without deadlocking
        let listeners: Vec<Listener> = match self.registry.read() {
            Ok(registry) => registry
                .subscribers
                .iter()
                .filter(|s| match (&s.folder, event.folder()) {
                    (None, _) => true,
                    (Some(wanted), Some(path)) => wanted == path,
                    (Some(_), None) => false,
                })
                .map(|s| s.listener.clone())
                .collect(),
            Err(_) => return,
        };

        log::debug!("Emitting {:?} to {} listener(s)", event, listeners.len());
        for listener in listeners {
            listener(&event);
        }
    }
}
