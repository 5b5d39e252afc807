//! Ordered collections with a per-item selection flag

/// An item that can live in a [`SelectionSet`]
pub trait Selectable {
    /// Identity used for de-duplication. `None` for items that have no
    /// server identity yet (unsaved drafts); those never collide.
    fn selection_id(&self) -> Option<&str>;
    fn is_selected(&self) -> bool;
    fn set_selected(&mut self, selected: bool);
}

/// Ordered sequence of selectable items.
///
/// Order is insertion order unless the owner re-sorts it. None of the
/// operations suspend.
#[derive(Debug, Clone)]
pub struct SelectionSet<T> {
    items: Vec<T>,
}

impl<T> Default for SelectionSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Selectable> SelectionSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from items, keeping the first occurrence of each id
    pub fn from_items(items: impl IntoIterator<Item = T>) -> Self {
        let mut set = Self::new();
        for item in items {
            set.push_unique(item);
        }
        set
    }

    pub fn all(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.position(id).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.position(id).map(move |i| &mut self.items[i])
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.selection_id() == Some(id))
    }

    /// Append an item unless one with the same id is already present.
    ///
    /// Returns `false` when the item was a duplicate and got dropped.
    pub fn push_unique(&mut self, item: T) -> bool {
        if let Some(id) = item.selection_id()
            && self.contains(id)
        {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Insert or replace the item with the same id, keeping its position
    /// and its selection flag.
    pub fn upsert(&mut self, mut item: T) {
        let existing = item.selection_id().and_then(|id| self.position(id));
        match existing {
            Some(i) => {
                item.set_selected(self.items[i].is_selected());
                self.items[i] = item;
            }
            None => self.items.push(item),
        }
    }

    pub fn select_all(&mut self) {
        for item in &mut self.items {
            item.set_selected(true);
        }
    }

    pub fn deselect_all(&mut self) {
        for item in &mut self.items {
            item.set_selected(false);
        }
    }

    /// Selected items, in sequence order
    pub fn selected(&self) -> impl Iterator<Item = &T> {
        self.items.iter().filter(|item| item.is_selected())
    }

    pub fn selected_count(&self) -> usize {
        self.selected().count()
    }

    /// Ids of the selected items that have one
    pub fn selected_ids(&self) -> Vec<String> {
        self.selected()
            .filter_map(|item| item.selection_id().map(str::to_string))
            .collect()
    }

    /// Remove every selected item in place and return them
    pub fn remove_selection(&mut self) -> Vec<T> {
        let (removed, kept): (Vec<T>, Vec<T>) =
            self.items.drain(..).partition(|item| item.is_selected());
        self.items = kept;
        removed
    }

    /// Remove the items whose id is in `ids`
    pub fn remove_ids(&mut self, ids: &[String]) -> Vec<T> {
        let (removed, kept): (Vec<T>, Vec<T>) = self.items.drain(..).partition(|item| {
            item.selection_id()
                .is_some_and(|id| ids.iter().any(|other| other == id))
        });
        self.items = kept;
        removed
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Stable sort of the underlying sequence
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&T, &T) -> std::cmp::Ordering,
    {
        self.items.sort_by(compare);
    }
}
