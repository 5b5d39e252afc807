//! Folder tree: the five system folders plus the nested user folders
//!
//! The tree owns every folder. System folders exist for the whole session;
//! user folders live in a path-keyed arena that is diffed against each root
//! snapshot. Exactly one folder is current.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{ErrorCode, MailboxError, Result};
use crate::events::{EventBus, MailboxEvent};
use crate::folder::{Folder, FolderRef, TrashBin, user};
use crate::list::SelectionSnapshot;
use crate::models::{FolderKind, Quota, SignaturePreference, SystemFolderKind};
use crate::selection::SelectionSet;
use crate::transport::api::{FolderNode, MaxDepthResponse, QuotaResponse};
use crate::transport::{Request, Transport, decode, decode_or_default};

/// An outstanding root snapshot fetch
#[derive(Debug, Clone)]
pub struct RootTicket {
    generation: u64,
    request: Request,
}

impl RootTicket {
    pub fn request(&self) -> &Request {
        &self.request
    }
}

/// What a snapshot changed in the user folder arena
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// `(old path, new path)` of folders matched by id under a new path
    pub renamed: Vec<(String, String)>,
    /// Known folders whose counters were refreshed in place
    pub updated: usize,
    /// The snapshot was overtaken by a newer one and ignored
    pub discarded: bool,
}

fn system_index(kind: SystemFolderKind) -> usize {
    match kind {
        SystemFolderKind::Inbox => 0,
        SystemFolderKind::Outbox => 1,
        SystemFolderKind::Draft => 2,
        SystemFolderKind::Trash => 3,
        SystemFolderKind::Spams => 4,
    }
}

/// Depth-first search for a node by path
fn find_node<'a>(nodes: &'a [FolderNode], path: &str) -> Option<&'a FolderNode> {
    for node in nodes {
        if node.path == path {
            return Some(node);
        }
        if let Some(found) = find_node(&node.folders, path) {
            return Some(found);
        }
    }
    None
}

/// Flatten user folder nodes with their parent path, parents first
fn flatten<'a>(nodes: &'a [FolderNode], parent: Option<&str>, out: &mut Vec<(&'a FolderNode, Option<String>)>) {
    for node in nodes {
        out.push((node, parent.map(str::to_string)));
        flatten(&node.folders, Some(&node.path), out);
    }
}

fn node_name(node: &FolderNode) -> String {
    if !node.folder_name.is_empty() {
        return node.folder_name.clone();
    }
    node.path.rsplit('/').next().unwrap_or_default().to_string()
}

/// All folders of a mailbox
#[derive(Debug)]
pub struct FolderTree {
    system: [Folder; 5],
    users: HashMap<String, Folder>,
    current: String,
    trash_bin: TrashBin,
    signature: SignaturePreference,
    quota: Quota,
    max_depth: Option<u32>,
    root_generation: u64,
    events: EventBus,
}

impl FolderTree {
    /// Build the tree from a snapshot of the system folders; user folders
    /// are read from the inbox node's children.
    pub fn compute(nodes: &[FolderNode], events: EventBus) -> Self {
        let system = SystemFolderKind::ALL.map(|kind| Folder::system(kind, 0, 0));
        let mut tree = Self {
            system,
            users: HashMap::new(),
            current: SystemFolderKind::Inbox.path().to_string(),
            trash_bin: TrashBin::new(),
            signature: SignaturePreference::default(),
            quota: Quota::default(),
            max_depth: None,
            root_generation: 0,
            events,
        };
        let diff = tree.patch(nodes);
        log::info!("Folder tree built with {} user folder(s)", diff.added.len());
        tree
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn system(&self, kind: SystemFolderKind) -> &Folder {
        &self.system[system_index(kind)]
    }

    pub fn system_mut(&mut self, kind: SystemFolderKind) -> &mut Folder {
        &mut self.system[system_index(kind)]
    }

    pub fn inbox(&self) -> &Folder {
        self.system(SystemFolderKind::Inbox)
    }

    /// Find a folder by path
    pub fn lookup(&self, path: &str) -> Option<&Folder> {
        match SystemFolderKind::from_path(path) {
            Some(kind) => Some(self.system(kind)),
            None => self.users.get(path),
        }
    }

    pub fn lookup_mut(&mut self, path: &str) -> Option<&mut Folder> {
        match SystemFolderKind::from_path(path) {
            Some(kind) => Some(self.system_mut(kind)),
            None => self.users.get_mut(path),
        }
    }

    fn folder_mut(&mut self, path: &str) -> Result<&mut Folder> {
        self.lookup_mut(path).ok_or_else(|| MailboxError::UnknownFolder {
            path: path.to_string(),
        })
    }

    pub(crate) fn user_folder(&self, path: &str) -> Result<&Folder> {
        self.users.get(path).ok_or_else(|| MailboxError::UnknownFolder {
            path: path.to_string(),
        })
    }

    /// Every known path, system folders first
    pub fn paths(&self) -> Vec<String> {
        let mut user_paths: Vec<String> = self.users.keys().cloned().collect();
        user_paths.sort();
        SystemFolderKind::ALL
            .iter()
            .map(|kind| kind.path().to_string())
            .chain(user_paths)
            .collect()
    }

    pub fn user_folder_count(&self) -> usize {
        self.users.len()
    }

    /// User folders directly under the inbox, in snapshot order
    pub fn top_level_folders(&self) -> Vec<&Folder> {
        self.inbox()
            .children()
            .iter()
            .filter_map(|child| self.users.get(&child.path))
            .collect()
    }

    /// Child user folders of a folder, in snapshot order
    pub fn children_of(&self, path: &str) -> Vec<&Folder> {
        self.lookup(path)
            .map(|folder| {
                folder
                    .children()
                    .iter()
                    .filter_map(|child| self.users.get(&child.path))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn current_path(&self) -> &str {
        &self.current
    }

    pub fn current(&self) -> &Folder {
        self.lookup(&self.current).unwrap_or_else(|| self.inbox())
    }

    pub fn current_mut(&mut self) -> &mut Folder {
        if !self.users.contains_key(&self.current) && SystemFolderKind::from_path(&self.current).is_none() {
            self.current = SystemFolderKind::Inbox.path().to_string();
        }
        let current = self.current.clone();
        match SystemFolderKind::from_path(&current) {
            Some(kind) => self.system_mut(kind),
            None => match self.users.get_mut(&current) {
                Some(folder) => folder,
                None => &mut self.system[system_index(SystemFolderKind::Inbox)],
            },
        }
    }

    /// Lookup name of a folder (system name or user folder id)
    pub fn name(&self, path: &str) -> Option<&str> {
        self.lookup(path).map(Folder::name)
    }

    /// 0 for system folders, 1 for folders under the inbox, 1 + parent otherwise
    pub fn depth(&self, path: &str) -> Result<u32> {
        let folder = self.lookup(path).ok_or_else(|| MailboxError::UnknownFolder {
            path: path.to_string(),
        })?;
        if folder.is_system() {
            return Ok(0);
        }
        let mut depth = 1;
        let mut parent = folder.parent_path();
        while let Some(parent_path) = parent {
            match self.users.get(parent_path) {
                Some(ancestor) if depth as usize <= self.users.len() => {
                    depth += 1;
                    parent = ancestor.parent_path();
                }
                _ => break,
            }
        }
        Ok(depth)
    }

    pub fn trash_bin(&self) -> &TrashBin {
        &self.trash_bin
    }

    pub fn trash_bin_mut(&mut self) -> &mut TrashBin {
        &mut self.trash_bin
    }

    pub fn signature(&self) -> &SignaturePreference {
        &self.signature
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }

    fn emit_folder(&self, path: &str) {
        self.events.emit(MailboxEvent::FolderChanged {
            path: path.to_string(),
        });
    }

    // === Snapshots ===

    /// Apply a snapshot to the arena: known paths are updated in place,
    /// new paths are linked under their parent, vanished paths are purged.
    fn patch(&mut self, nodes: &[FolderNode]) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();

        for kind in SystemFolderKind::ALL {
            if let Some(node) = find_node(nodes, kind.path()) {
                let folder = self.system_mut(kind);
                folder.unread = node.unread;
                folder.count = node.count;
                diff.updated += 1;
            }
        }

        let top: &[FolderNode] = find_node(nodes, SystemFolderKind::Inbox.path())
            .map(|inbox| inbox.folders.as_slice())
            .unwrap_or(&[]);
        let mut flat = Vec::new();
        flatten(top, None, &mut flat);
        let seen: HashSet<&str> = flat.iter().map(|(node, _)| node.path.as_str()).collect();

        // Vanished folders are held back by id so a rename keeps its state
        let vanished: Vec<String> = self
            .users
            .keys()
            .filter(|path| !seen.contains(path.as_str()))
            .cloned()
            .collect();
        let mut detached: HashMap<String, Folder> = HashMap::new();
        for path in vanished {
            if let Some(folder) = self.users.remove(&path) {
                let id = folder.user_id().unwrap_or(folder.path()).to_string();
                detached.insert(id, folder);
            }
        }

        for (node, parent) in &flat {
            let id = node.id.clone().unwrap_or_else(|| node.path.clone());
            let kind = FolderKind::User {
                id: id.clone(),
                name: node_name(node),
                parent: parent.clone(),
            };
            match self.users.get_mut(&node.path) {
                Some(folder) => {
                    *folder.kind_mut() = kind;
                    folder.unread = node.unread;
                    folder.count = node.count;
                    diff.updated += 1;
                }
                None => {
                    let mut folder = match detached.remove(&id) {
                        Some(mut moved) => {
                            diff.renamed.push((moved.path().to_string(), node.path.clone()));
                            moved.set_path(node.path.clone());
                            moved
                        }
                        None => {
                            diff.added.push(node.path.clone());
                            Folder::user(id.clone(), node_name(node), node.path.clone(), parent.clone())
                        }
                    };
                    *folder.kind_mut() = kind;
                    folder.unread = node.unread;
                    folder.count = node.count;
                    self.users.insert(node.path.clone(), folder);
                }
            }
        }

        diff.removed = detached.into_values().map(|f| f.path().to_string()).collect();
        diff.removed.sort();

        self.relink(SystemFolderKind::Inbox.path(), top);
        for (node, _) in &flat {
            self.relink(&node.path, &node.folders);
        }

        if let Some((_, new_path)) = diff.renamed.iter().find(|(old, _)| *old == self.current) {
            self.current = new_path.clone();
        }
        if self.lookup(&self.current).is_none() {
            log::warn!("Current folder {} vanished, falling back to the inbox", self.current);
            self.current = SystemFolderKind::Inbox.path().to_string();
            self.emit_folder(SystemFolderKind::Inbox.path());
        }

        diff
    }

    /// Replace the children of `parent` with the snapshot's, keeping selection
    fn relink(&mut self, parent: &str, children: &[FolderNode]) {
        let Some(folder) = self.lookup_mut(parent) else {
            return;
        };
        let refs: Vec<FolderRef> = children
            .iter()
            .map(|child| FolderRef {
                path: child.path.clone(),
                selected: folder
                    .children()
                    .get(&child.path)
                    .is_some_and(|known| known.selected),
            })
            .collect();
        folder.set_children(SelectionSet::from_items(refs));
    }

    /// Start a root snapshot fetch; it supersedes any outstanding one
    pub fn begin_root_snapshot(&mut self) -> RootTicket {
        self.root_generation += 1;
        RootTicket {
            generation: self.root_generation,
            request: Request::get("root-folder"),
        }
    }

    /// Diff-and-patch the arena with a root snapshot.
    ///
    /// Returns [`MailboxError::Stale`] for a ticket overtaken by a newer one.
    pub fn finish_root_snapshot(&mut self, ticket: RootTicket, response: Result<Value>) -> Result<SnapshotDiff> {
        if ticket.generation != self.root_generation {
            log::warn!("Discarding stale root snapshot #{}", ticket.generation);
            return Err(MailboxError::Stale);
        }
        let root: FolderNode = decode(response?)?;
        let diff = self.patch(std::slice::from_ref(&root));
        log::info!(
            "Root snapshot: {} added, {} removed, {} renamed",
            diff.added.len(),
            diff.removed.len(),
            diff.renamed.len()
        );
        self.events.emit(MailboxEvent::TreeChanged);
        Ok(diff)
    }

    /// Fetch the nested snapshot and bring the arena in line with it
    pub fn compute_root_folder(&mut self, transport: &dyn Transport) -> Result<SnapshotDiff> {
        let ticket = self.begin_root_snapshot();
        let response = transport.execute(ticket.request());
        match self.finish_root_snapshot(ticket, response) {
            Err(MailboxError::Stale) => Ok(SnapshotDiff {
                discarded: true,
                ..SnapshotDiff::default()
            }),
            other => other,
        }
    }

    // === Preferences and quota ===

    /// Refresh signature, quota and depth limit, then notify the host
    pub fn sync(&mut self, transport: &dyn Transport) -> Result<()> {
        let depth: MaxDepthResponse = decode_or_default(transport.execute(&Request::get("max-depth"))?)?;
        self.max_depth = (depth.max_depth > 0).then_some(depth.max_depth);

        self.signature = decode_or_default(transport.execute(&Request::get("signature"))?)?;
        self.refresh_quota(transport)?;

        self.events.emit(MailboxEvent::TreeChanged);
        Ok(())
    }

    pub fn refresh_quota(&mut self, transport: &dyn Transport) -> Result<Quota> {
        let response: QuotaResponse = decode_or_default(transport.execute(&Request::get("quota"))?)?;
        self.quota = Quota::new(response.quota, response.storage);
        Ok(self.quota)
    }

    /// Quota refresh after a mutation; a failure only costs freshness
    pub(crate) fn refresh_quota_quietly(&mut self, transport: &dyn Transport) {
        if let Err(e) = self.refresh_quota(transport) {
            log::warn!("Quota refresh failed: {}", e);
        }
    }

    /// Store the signature preference on the server, then cache it
    pub fn set_signature(&mut self, transport: &dyn Transport, preference: SignaturePreference) -> Result<()> {
        let body = serde_json::to_value(&preference)?;
        transport.execute(&Request::put("signature").json(body))?;
        self.signature = preference;
        self.events.emit(MailboxEvent::TreeChanged);
        Ok(())
    }

    // === Navigation ===

    /// Open a system folder by name (`INBOX`, `OUTBOX`, `DRAFT`, `TRASH`, `SPAMS`)
    pub fn open_folder(&mut self, transport: &dyn Transport, name: &str) -> Result<()> {
        let kind = SystemFolderKind::from_name(name).ok_or_else(|| MailboxError::UnknownFolder {
            path: name.to_string(),
        })?;
        self.open_path(transport, kind.path())
    }

    /// Open a user folder by path
    pub fn open_user_folder(&mut self, transport: &dyn Transport, path: &str) -> Result<()> {
        self.user_folder(path)?;
        self.open_path(transport, path)
    }

    fn open_path(&mut self, transport: &dyn Transport, path: &str) -> Result<()> {
        let folder = self.folder_mut(path)?;
        folder.open(transport)?;
        let is_trash = folder.is(SystemFolderKind::Trash);
        self.current = path.to_string();
        if is_trash {
            self.trash_bin.sync(transport)?;
        }
        log::info!("Opened {}", path);
        self.emit_folder(path);
        self.events.emit(MailboxEvent::MailListRefreshed {
            path: path.to_string(),
        });
        Ok(())
    }

    /// Reload the current folder, keeping search and filter
    pub fn refresh_current(&mut self, transport: &dyn Transport) -> Result<()> {
        let path = self.current.clone();
        self.folder_mut(&path)?.sync(transport)?;
        self.events.emit(MailboxEvent::MailListRefreshed { path });
        Ok(())
    }

    pub(crate) fn refresh_quietly(&mut self, transport: &dyn Transport, path: &str) {
        let Some(folder) = self.lookup_mut(path) else {
            return;
        };
        match folder.sync(transport) {
            Ok(_) => self.events.emit(MailboxEvent::MailListRefreshed {
                path: path.to_string(),
            }),
            Err(e) => log::warn!("Refresh of {} failed after a confirmed change: {}", path, e),
        }
    }

    // === Selection operations on the current folder ===

    pub fn select_all(&mut self) {
        let is_trash = self.current().is(SystemFolderKind::Trash);
        self.current_mut().select_all();
        if is_trash {
            self.trash_bin.select_all();
        }
    }

    pub fn deselect_all(&mut self) {
        let is_trash = self.current().is(SystemFolderKind::Trash);
        self.current_mut().deselect_all();
        if is_trash {
            self.trash_bin.deselect_all();
        }
    }

    /// Mark the selection of the current folder read or unread
    pub fn toggle_unread_selection(&mut self, transport: &dyn Transport, unread: bool) -> Result<u32> {
        let changed = self.current_mut().toggle_unread_selection(transport, unread)?;
        if changed > 0 {
            let path = self.current.clone();
            self.emit_folder(&path);
        }
        Ok(changed)
    }

    /// Move the selection of the current folder into a user folder
    pub fn move_selection(&mut self, transport: &dyn Transport, target_path: &str) -> Result<SelectionSnapshot> {
        let target_id = self
            .user_folder(target_path)?
            .user_id()
            .unwrap_or_default()
            .to_string();
        let source_path = self.current.clone();

        let snapshot = self.current_mut().list_mut().move_selection(transport, &target_id)?;
        if snapshot.is_empty() {
            return Ok(snapshot);
        }
        self.shift_counts(&source_path, target_path, &snapshot);
        self.refresh_quietly(transport, &source_path);
        Ok(snapshot)
    }

    pub(crate) fn shift_counts(&mut self, from: &str, to: &str, snapshot: &SelectionSnapshot) {
        let moved = snapshot.ids.len() as u32;
        if let Some(source) = self.lookup_mut(from) {
            source.remove_unread(snapshot.unread);
            source.count = source.count.saturating_sub(moved);
        }
        if let Some(target) = self.lookup_mut(to) {
            target.add_unread(snapshot.unread);
            target.count = target.count.saturating_add(moved);
        }
        self.emit_folder(from);
        self.emit_folder(to);
    }

    /// Trash the selection, or delete it forever when the trash is current.
    /// In the trash, selected trashed folders are deleted as well.
    pub fn remove_selection(&mut self, transport: &dyn Transport) -> Result<()> {
        if self.current().is(SystemFolderKind::Trash) {
            let trash = &mut self.system[system_index(SystemFolderKind::Trash)];
            let outcome = self.trash_bin.remove_selection(trash, transport)?;
            self.emit_folder(SystemFolderKind::Trash.path());
            return outcome.into_result().map(|_| ());
        }

        let source_path = self.current.clone();
        let snapshot = self.current_mut().list_mut().to_trash(transport)?;
        if snapshot.is_empty() {
            return Ok(());
        }
        self.shift_counts(&source_path, SystemFolderKind::Trash.path(), &snapshot);
        self.refresh_quietly(transport, &source_path);
        self.refresh_quota_quietly(transport);
        Ok(())
    }

    /// Restore the selected messages and trashed folders of the trash
    pub fn restore(&mut self, transport: &dyn Transport) -> Result<()> {
        let trash = &mut self.system[system_index(SystemFolderKind::Trash)];
        let outcome = self.trash_bin.restore(trash, transport)?;
        self.emit_folder(SystemFolderKind::Trash.path());
        if outcome.folders > 0 {
            self.compute_root_folder(transport)?;
        }
        outcome.into_result().map(|_| ())
    }

    /// Empty the trash in one request
    pub fn empty_trash(&mut self, transport: &dyn Transport) -> Result<()> {
        let trash = &mut self.system[system_index(SystemFolderKind::Trash)];
        self.trash_bin.remove_all(trash, transport)?;
        self.emit_folder(SystemFolderKind::Trash.path());
        self.refresh_quota_quietly(transport);
        Ok(())
    }

    /// Move the selection of the current user folder back to the inbox
    pub fn remove_from_folder(&mut self, transport: &dyn Transport) -> Result<SelectionSnapshot> {
        let source_path = self.current.clone();
        self.user_folder(&source_path)?;
        let snapshot = self.current_mut().list_mut().remove_from_folder(transport)?;
        if !snapshot.is_empty() {
            self.shift_counts(&source_path, SystemFolderKind::Inbox.path(), &snapshot);
        }
        Ok(snapshot)
    }

    // === User folder management ===

    /// Create a user folder under `parent_path` (top-level when `None`).
    ///
    /// Rejected locally when the new folder would exceed the server's depth
    /// limit. The tree is untouched; resync with `compute_root_folder`.
    pub fn create_user_folder(&self, transport: &dyn Transport, name: &str, parent_path: Option<&str>) -> Result<Value> {
        let (parent_id, parent_depth) = match parent_path {
            Some(path) => {
                let parent = self.user_folder(path)?;
                (parent.user_id().map(str::to_string), self.depth(path)?)
            }
            None => (None, 0),
        };
        if let Some(max) = self.max_depth
            && parent_depth + 1 > max
        {
            return Err(MailboxError::validation(ErrorCode::FolderDepthExceeded { max }));
        }
        user::create(transport, name, parent_id.as_deref())
    }

    pub fn rename_user_folder(&self, transport: &dyn Transport, path: &str, name: &str) -> Result<Value> {
        let id = self.user_folder(path)?.user_id().unwrap_or_default();
        user::update(transport, id, name)
    }

    pub fn trash_user_folder(&self, transport: &dyn Transport, path: &str) -> Result<Value> {
        let id = self.user_folder(path)?.user_id().unwrap_or_default();
        user::trash(transport, id)
    }
}
