//! Paginated, searchable message lists
//!
//! A list is backed by one folder query. Every fetch is split into a
//! `begin_sync` that hands out a ticket carrying the request, and a
//! `finish_sync` that applies the response. A ticket that was overtaken by
//! a newer reset is discarded when it completes. The blocking helpers
//! (`sync`, `next_page`, `search`, ...) run both halves over a transport.

mod bulk;

pub use bulk::SelectionSnapshot;

use serde_json::Value;

use crate::error::{MailboxError, Result};
use crate::models::Message;
use crate::selection::SelectionSet;
use crate::transport::{Request, Transport, normalize_rows};

/// The folder query a list is backed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    System { path: String },
    User { path: String },
}

impl ListSource {
    pub fn path(&self) -> &str {
        match self {
            ListSource::System { path } | ListSource::User { path } => path,
        }
    }

    fn request(&self, page: u32, search: Option<&str>, unread: bool) -> Request {
        let mut request = Request::get("list").query("folder", self.path());
        if let ListSource::User { .. } = self {
            request = request.query("restrain", "");
        }
        request = request.query("page", page).query("unread", unread);
        if let Some(text) = search.filter(|t| !t.is_empty()) {
            request = request.query("search", text);
        }
        request
    }
}

/// Parameters of one list fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncParams {
    pub page: u32,
    pub search: Option<String>,
    pub filter_unread: bool,
    /// Replace the current rows instead of appending
    pub reset_list: bool,
    /// Mark every fetched row selected
    pub mark_selected: bool,
}

/// An outstanding list fetch
#[derive(Debug, Clone)]
pub struct SyncTicket {
    id: u64,
    reset_generation: u64,
    page: u32,
    fresh: bool,
    reset_list: bool,
    mark_selected: bool,
    search: Option<String>,
    filter_unread: bool,
    request: Request,
}

impl SyncTicket {
    /// The request to execute for this ticket
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

/// Result of a list fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Rows were applied
    Applied { fetched: usize, full: bool },
    /// Nothing was requested (list exhausted or a fetch still running)
    Skipped,
    /// The completion was overtaken by a newer reset
    Discarded,
}

/// Messages of one folder
#[derive(Debug, Clone)]
pub struct MessageList {
    source: ListSource,
    page: u32,
    full: bool,
    search: Option<String>,
    unread_only: bool,
    messages: SelectionSet<Message>,
    next_ticket: u64,
    reset_generation: u64,
    outstanding: usize,
    loading_ticket: Option<u64>,
}

impl MessageList {
    pub fn new(source: ListSource) -> Self {
        Self {
            source,
            page: 0,
            full: false,
            search: None,
            unread_only: false,
            messages: SelectionSet::new(),
            next_ticket: 0,
            reset_generation: 0,
            outstanding: 0,
            loading_ticket: None,
        }
    }

    pub fn source(&self) -> &ListSource {
        &self.source
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// The last page fetch returned no rows
    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn search_text(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn unread_only(&self) -> bool {
        self.unread_only
    }

    /// A fresh (page 0) fetch is running
    pub fn is_loading(&self) -> bool {
        self.loading_ticket.is_some()
    }

    /// Whether any fetch for this list is outstanding
    pub fn is_syncing(&self) -> bool {
        self.outstanding > 0
    }

    pub fn messages(&self) -> &SelectionSet<Message> {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut SelectionSet<Message> {
        &mut self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.get_mut(id)
    }

    /// Params for a page-0 reload with the current search and filter
    fn reload_params(&self) -> SyncParams {
        SyncParams {
            page: 0,
            search: self.search.clone(),
            filter_unread: self.unread_only,
            reset_list: true,
            mark_selected: false,
        }
    }

    /// Start a fetch. A reset fetch supersedes every ticket handed out before it.
    pub fn begin_sync(&mut self, params: SyncParams) -> SyncTicket {
        self.next_ticket += 1;
        let id = self.next_ticket;
        if params.reset_list {
            self.reset_generation += 1;
        }
        let fresh = params.page == 0;
        if fresh {
            self.loading_ticket = Some(id);
        }
        self.outstanding += 1;

        log::debug!(
            "List {} sync #{} page {} (reset: {})",
            self.source.path(),
            id,
            params.page,
            params.reset_list
        );

        SyncTicket {
            id,
            reset_generation: self.reset_generation,
            page: params.page,
            fresh,
            reset_list: params.reset_list,
            mark_selected: params.mark_selected,
            request: self
                .source
                .request(params.page, params.search.as_deref(), params.filter_unread),
            search: params.search,
            filter_unread: params.filter_unread,
        }
    }

    /// Apply the response of a ticket.
    ///
    /// Returns [`MailboxError::Stale`] when a newer reset overtook the
    /// ticket; the list is left untouched in that case. A transport error
    /// also leaves the list untouched and is returned as is. The ticket's
    /// query (search, filter, page) becomes the list's query only here.
    pub fn finish_sync(&mut self, ticket: SyncTicket, response: Result<Value>) -> Result<SyncOutcome> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if ticket.fresh && self.loading_ticket == Some(ticket.id) {
            self.loading_ticket = None;
        }

        if ticket.reset_generation != self.reset_generation {
            log::warn!(
                "Discarding stale page {} of {} (sync #{})",
                ticket.page,
                self.source.path(),
                ticket.id
            );
            return Err(MailboxError::Stale);
        }

        let rows = normalize_rows(response?)?;
        let fetched = rows.len();

        if ticket.reset_list {
            self.messages.clear();
        }
        for mut message in rows {
            if ticket.mark_selected {
                message.selected = true;
            }
            let known = message
                .id
                .as_ref()
                .is_some_and(|id| self.messages.contains(id.as_str()));
            if known {
                self.messages.upsert(message);
            } else {
                self.messages.push_unique(message);
            }
        }
        self.sort();

        self.page = ticket.page;
        self.full = fetched == 0;
        self.search = ticket.search;
        self.unread_only = ticket.filter_unread;

        log::info!(
            "List {} page {}: {} row(s), {} total",
            self.source.path(),
            ticket.page,
            fetched,
            self.messages.len()
        );
        Ok(SyncOutcome::Applied {
            fetched,
            full: self.full,
        })
    }

    /// Fetch with `params` and apply the result
    pub fn sync(&mut self, transport: &dyn Transport, params: SyncParams) -> Result<SyncOutcome> {
        let ticket = self.begin_sync(params);
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Ticket for the page after the current one, unless the list is
    /// exhausted or another fetch is outstanding.
    pub fn begin_next_page(&mut self, select_new: bool) -> Option<SyncTicket> {
        if self.full || self.outstanding > 0 {
            return None;
        }
        Some(self.begin_sync(SyncParams {
            page: self.page + 1,
            search: self.search.clone(),
            filter_unread: self.unread_only,
            reset_list: false,
            mark_selected: select_new,
        }))
    }

    pub fn next_page(&mut self, transport: &dyn Transport, select_new: bool) -> Result<SyncOutcome> {
        let Some(ticket) = self.begin_next_page(select_new) else {
            return Ok(SyncOutcome::Skipped);
        };
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Ticket for a reload with new search text
    pub fn begin_search(&mut self, text: Option<String>) -> SyncTicket {
        let params = SyncParams {
            search: text.filter(|t| !t.trim().is_empty()),
            ..self.reload_params()
        };
        self.begin_sync(params)
    }

    pub fn search(&mut self, transport: &dyn Transport, text: Option<String>) -> Result<SyncOutcome> {
        let ticket = self.begin_search(text);
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Ticket for a reload with the unread filter switched
    pub fn begin_filter_unread(&mut self, on: bool) -> SyncTicket {
        let params = SyncParams {
            filter_unread: on,
            ..self.reload_params()
        };
        self.begin_sync(params)
    }

    pub fn filter_unread(&mut self, transport: &dyn Transport, on: bool) -> Result<SyncOutcome> {
        let ticket = self.begin_filter_unread(on);
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Ticket for a page-0 reload keeping search and filter
    pub fn begin_refresh(&mut self) -> SyncTicket {
        let params = self.reload_params();
        self.begin_sync(params)
    }

    pub fn refresh(&mut self, transport: &dyn Transport) -> Result<SyncOutcome> {
        let ticket = self.begin_refresh();
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Ticket for a page-0 reload without search or filter
    pub fn begin_clear_query(&mut self) -> SyncTicket {
        self.begin_sync(SyncParams {
            reset_list: true,
            ..SyncParams::default()
        })
    }

    /// Reload page 0 and drop search and filter once the server answers
    pub fn clear_query(&mut self, transport: &dyn Transport) -> Result<SyncOutcome> {
        let ticket = self.begin_clear_query();
        let response = transport.execute(ticket.request());
        discard_stale(self.finish_sync(ticket, response))
    }

    /// Add a message confirmed by the server (a saved draft), keeping order
    pub fn insert(&mut self, message: Message) {
        self.messages.upsert(message);
        self.sort();
    }

    /// Stable sort by date, newest first
    fn sort(&mut self) {
        self.messages.sort_by(|a, b| b.date.cmp(&a.date));
    }
}

/// Stale completions are dropped silently by the blocking helpers
fn discard_stale(result: Result<SyncOutcome>) -> Result<SyncOutcome> {
    match result {
        Err(MailboxError::Stale) => Ok(SyncOutcome::Discarded),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, RecordingTransport};
    use serde_json::json;

    fn row(id: &str, date: i64, unread: bool) -> Value {
        json!({ "id": id, "date": date.to_string(), "unread": unread, "systemFolder": "INBOX", "state": "SENT" })
    }

    fn page(ids: std::ops::Range<i64>) -> Value {
        Value::Array(ids.map(|i| row(&format!("m{}", i), 1_000 + i, false)).collect())
    }

    fn inbox() -> MessageList {
        MessageList::new(ListSource::System { path: "/Inbox".to_string() })
    }

    #[test]
    fn test_list_request_shape() {
        let system = ListSource::System { path: "/Inbox".to_string() }.request(2, Some("lunch"), true);
        assert_eq!(system.path, "list");
        assert_eq!(system.query_value("folder"), Some("/Inbox"));
        assert_eq!(system.query_value("restrain"), None);
        assert_eq!(system.query_value("page"), Some("2"));
        assert_eq!(system.query_value("unread"), Some("true"));
        assert_eq!(system.query_value("search"), Some("lunch"));

        let user = ListSource::User { path: "/Inbox/Work".to_string() }.request(0, None, false);
        assert_eq!(user.query_value("restrain"), Some(""));
        assert_eq!(user.query_value("search"), None);
    }

    #[test]
    fn test_sync_sorts_descending_and_dedups() {
        let transport = RecordingTransport::new();
        transport.reply(
            Method::Get,
            "list",
            json!([row("a", 10, false), row("b", 30, false), row("a", 10, false), row("c", 20, true)]),
        );

        let mut list = inbox();
        list.sync(&transport, SyncParams { reset_list: true, ..SyncParams::default() }).unwrap();

        let ids: Vec<&str> = list.messages().iter().map(|m| m.id.as_ref().unwrap().as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(!list.is_full());
        assert!(!list.is_loading());
    }

    #[test]
    fn test_next_page_stops_when_full() {
        let transport = RecordingTransport::new();
        transport.reply(Method::Get, "list", page(0..20));
        transport.reply(Method::Get, "list", json!([]));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        assert_eq!(list.len(), 20);

        let outcome = list.next_page(&transport, false).unwrap();
        assert_eq!(outcome, SyncOutcome::Applied { fetched: 0, full: true });
        assert!(list.is_full());
        assert_eq!(list.page(), 1);

        assert_eq!(list.next_page(&transport, false).unwrap(), SyncOutcome::Skipped);
        assert_eq!(transport.count(Method::Get, "list"), 2);
        assert_eq!(list.len(), 20);
    }

    #[test]
    fn test_next_page_refused_while_outstanding() {
        let mut list = inbox();
        let first = list.begin_refresh();
        assert!(list.begin_next_page(false).is_none());

        list.finish_sync(first, Ok(page(0..3))).unwrap();
        let next = list.begin_next_page(true).unwrap();
        assert_eq!(next.page(), 1);
        assert_eq!(next.request().query_value("page"), Some("1"));
    }

    #[test]
    fn test_stale_page_discarded_after_reset() {
        let mut list = inbox();
        let initial = list.begin_refresh();
        list.finish_sync(initial, Ok(page(0..5))).unwrap();

        let older = list.begin_next_page(false).unwrap();
        let newer = list.begin_search(Some("report".to_string()));
        assert!(list.is_loading());

        list.finish_sync(newer, Ok(json!([row("r1", 5, false)]))).unwrap();
        let stale = list.finish_sync(older, Ok(page(10..15)));
        assert!(matches!(stale, Err(MailboxError::Stale)));

        assert_eq!(list.len(), 1);
        assert_eq!(list.search_text(), Some("report"));
        assert!(!list.is_loading());
        assert!(!list.is_syncing());
    }

    #[test]
    fn test_stale_fresh_completion_keeps_loading_of_newer() {
        let mut list = inbox();
        let first = list.begin_refresh();
        let second = list.begin_filter_unread(true);

        assert!(matches!(list.finish_sync(first, Ok(page(0..2))), Err(MailboxError::Stale)));
        assert!(list.is_loading());
        list.finish_sync(second, Ok(page(0..1))).unwrap();
        assert!(!list.is_loading());
        assert!(list.unread_only());
    }

    #[test]
    fn test_transport_error_leaves_list_unchanged() {
        let transport = RecordingTransport::new();
        transport.reply(Method::Get, "list", page(0..3));
        transport.fail(Method::Get, "list", MailboxError::transport("offline"));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        let err = list.next_page(&transport, false).unwrap_err();
        assert!(matches!(err, MailboxError::Transport { .. }));
        assert_eq!(list.len(), 3);
        assert_eq!(list.page(), 0);
        assert!(!list.is_full());
        assert!(!list.is_syncing());
    }

    #[test]
    fn test_failed_search_keeps_previous_query() {
        let transport = RecordingTransport::new();
        transport
            .reply(Method::Get, "list", json!([row("a", 30, false), row("b", 20, false)]))
            .reply(Method::Get, "list", json!([row("c", 10, false)]))
            .fail(Method::Get, "list", MailboxError::transport("offline"))
            .reply(Method::Get, "list", json!([]));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        list.next_page(&transport, false).unwrap();

        assert!(list.search(&transport, Some("lunch".to_string())).is_err());
        assert_eq!(list.search_text(), None);
        assert_eq!(list.page(), 1);
        assert_eq!(list.len(), 3);

        list.next_page(&transport, false).unwrap();
        let last = transport.requests().pop().unwrap();
        assert_eq!(last.query_value("page"), Some("2"));
        assert_eq!(last.query_value("search"), None);
    }

    #[test]
    fn test_failed_filter_and_refresh_keep_state() {
        let transport = RecordingTransport::new();
        transport
            .reply(Method::Get, "list", page(0..2))
            .reply(Method::Get, "list", json!([]))
            .fail(Method::Get, "list", MailboxError::transport("offline"))
            .fail(Method::Get, "list", MailboxError::transport("offline"));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        list.next_page(&transport, false).unwrap();
        assert!(list.is_full());

        assert!(list.filter_unread(&transport, true).is_err());
        assert!(!list.unread_only());
        assert_eq!(list.page(), 1);
        assert!(list.is_full());

        assert!(list.refresh(&transport).is_err());
        assert_eq!(list.page(), 1);
        assert!(list.is_full());
        assert_eq!(list.len(), 2);
        assert!(!list.is_loading());
    }

    #[test]
    fn test_next_page_ticket_is_not_loading() {
        let mut list = inbox();
        let initial = list.begin_refresh();
        assert!(list.is_loading());
        list.finish_sync(initial, Ok(page(0..3))).unwrap();

        let next = list.begin_next_page(false).unwrap();
        assert!(list.is_syncing());
        assert!(!list.is_loading());
        list.finish_sync(next, Ok(page(3..5))).unwrap();
        assert!(!list.is_loading());
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn test_next_page_marks_new_rows_selected() {
        let transport = RecordingTransport::new();
        transport.reply(Method::Get, "list", page(0..2));
        transport.reply(Method::Get, "list", page(2..4));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        list.next_page(&transport, true).unwrap();

        assert_eq!(list.messages().selected_count(), 2);
        assert!(list.get("m3").unwrap().selected);
        assert!(!list.get("m0").unwrap().selected);
    }

    #[test]
    fn test_search_resets_pagination() {
        let transport = RecordingTransport::new();
        transport.always(Method::Get, "list", page(0..2));

        let mut list = inbox();
        list.refresh(&transport).unwrap();
        list.next_page(&transport, false).unwrap();
        assert_eq!(list.page(), 1);

        list.search(&transport, Some("minutes".to_string())).unwrap();
        assert_eq!(list.page(), 0);
        let last = transport.requests().pop().unwrap();
        assert_eq!(last.query_value("page"), Some("0"));
        assert_eq!(last.query_value("search"), Some("minutes"));

        list.filter_unread(&transport, true).unwrap();
        let last = transport.requests().pop().unwrap();
        assert_eq!(last.query_value("search"), Some("minutes"));
        assert_eq!(last.query_value("unread"), Some("true"));
    }
}
