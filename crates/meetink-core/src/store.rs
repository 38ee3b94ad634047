//! The item store: the single mutation path for board content.
//!
//! Local interaction, remote events and undo/redo all go through [`ItemStore`], and every
//! mutation is reported to subscribers so the scene and spatial index can follow.

use std::collections::HashMap;
use std::fmt;

use crate::items::{Item, ItemId, ItemPatch};

/// A mutation reported to store observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    Added(ItemId),
    Updated(ItemId),
    /// The removed item followed by any cascaded children.
    Removed(Vec<ItemId>),
    Cleared,
    /// The whole collection was swapped (undo/redo, hydration).
    Replaced,
}

/// Handle returned by [`ItemStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

type Observer = Box<dyn FnMut(&StoreChange)>;

/// All items, keyed by id, plus insertion order.
#[derive(Default)]
pub struct ItemStore {
    items: HashMap<ItemId, Item>,
    order: Vec<ItemId>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: usize,
}

impl fmt::Debug for ItemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemStore")
            .field("items", &self.order.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked after every mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&StoreChange) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) {
        self.observers.retain(|(oid, _)| *oid != id);
    }

    fn notify(&mut self, change: StoreChange) {
        for (_, observer) in &mut self.observers {
            observer(&change);
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.order
    }

    /// Insert a new item or replace an existing one with the same id.
    pub fn upsert(&mut self, item: Item) {
        let id = item.id;
        let change = if self.items.insert(id, item).is_some() {
            StoreChange::Updated(id)
        } else {
            self.order.push(id);
            StoreChange::Added(id)
        };
        self.notify(change);
    }

    /// Insert only if absent. Returns `false` if the id already exists.
    pub fn insert(&mut self, item: Item) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.upsert(item);
        true
    }

    /// Apply a partial update. Unknown ids and no-op patches return `false`.
    pub fn patch(&mut self, id: &ItemId, patch: &ItemPatch) -> bool {
        let changed = match self.items.get_mut(id) {
            Some(item) => patch.apply_to(item),
            None => {
                log::debug!("Ignoring patch for unknown item {id}");
                return false;
            }
        };
        if changed {
            self.notify(StoreChange::Updated(*id));
        }
        changed
    }

    /// Mutate an item in place. Returns `false` for unknown ids or when nothing changed.
    pub fn update_with(&mut self, id: &ItemId, f: impl FnOnce(&mut Item)) -> bool {
        let Some(item) = self.items.get_mut(id) else {
            return false;
        };
        let before = item.clone();
        f(&mut *item);
        // Identity and type are immutable
        item.id = before.id;
        if item.kind() != before.kind() {
            item.data = before.data.clone();
        }
        let changed = *item != before;
        if changed {
            self.notify(StoreChange::Updated(*id));
        }
        changed
    }

    /// Remove an item and, for sticky-notes, all of its children.
    pub fn remove(&mut self, id: &ItemId) -> Vec<Item> {
        let Some(item) = self.items.remove(id) else {
            return Vec::new();
        };
        let mut removed = vec![item];
        let children: Vec<ItemId> = self
            .order
            .iter()
            .filter(|cid| self.items.get(*cid).is_some_and(|c| c.parent_id == Some(*id)))
            .copied()
            .collect();
        for cid in &children {
            if let Some(child) = self.items.remove(cid) {
                removed.push(child);
            }
        }
        self.order.retain(|oid| oid != id && !children.contains(oid));

        let ids = removed.iter().map(|i| i.id).collect();
        self.notify(StoreChange::Removed(ids));
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
        self.notify(StoreChange::Cleared);
    }

    /// Swap the whole collection, preserving the given order.
    pub fn replace_all(&mut self, items: Vec<Item>) {
        self.items.clear();
        self.order.clear();
        for item in items {
            let id = item.id;
            if self.items.insert(id, item).is_none() {
                self.order.push(id);
            }
        }
        self.notify(StoreChange::Replaced);
    }

    /// Deep copy of all items in insertion order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.iter().cloned().collect()
    }

    /// Root items in paint order: strokes first, then by zIndex, ties broken by id.
    pub fn render_order(&self) -> Vec<&Item> {
        let mut roots: Vec<&Item> = self.iter().filter(|i| i.is_root()).collect();
        sort_for_paint(&mut roots);
        roots
    }

    /// Parent id → children in paint order. Children whose parent is missing are skipped.
    pub fn children_index(&self) -> HashMap<ItemId, Vec<ItemId>> {
        let mut grouped: HashMap<ItemId, Vec<&Item>> = HashMap::new();
        for item in self.iter() {
            match item.parent_id {
                Some(parent) if self.items.contains_key(&parent) => {
                    grouped.entry(parent).or_default().push(item);
                }
                _ => {}
            }
        }
        grouped
            .into_iter()
            .map(|(parent, mut children)| {
                sort_for_paint(&mut children);
                (parent, children.into_iter().map(|c| c.id).collect())
            })
            .collect()
    }

    pub fn children_of(&self, id: &ItemId) -> Vec<&Item> {
        let mut children: Vec<&Item> = self
            .iter()
            .filter(|i| i.parent_id.as_ref() == Some(id))
            .collect();
        sort_for_paint(&mut children);
        children
    }

    /// Highest zIndex among items sharing `parent`.
    pub fn max_z(&self, parent: Option<ItemId>) -> Option<f64> {
        self.iter()
            .filter(|i| i.parent_id == parent)
            .map(|i| i.z_index)
            .reduce(f64::max)
    }

    /// Lowest zIndex among items sharing `parent`.
    pub fn min_z(&self, parent: Option<ItemId>) -> Option<f64> {
        self.iter()
            .filter(|i| i.parent_id == parent)
            .map(|i| i.z_index)
            .reduce(f64::min)
    }
}

/// Sort by paint tier, then zIndex, then id for a stable total order.
pub fn sort_for_paint(items: &mut [&Item]) {
    items.sort_by(|a, b| {
        a.paint_key()
            .0
            .cmp(&b.paint_key().0)
            .then(a.z_index.total_cmp(&b.z_index))
            .then(a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{
        ImageData, ItemData, PathData, SerializableColor, StickyNoteData, TextData, Transform,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn path(z: f64) -> Item {
        Item::new(
            ItemData::Path(PathData::new(vec![], SerializableColor::black(), 2.0)),
            Transform::IDENTITY,
            z,
        )
    }

    fn image(z: f64) -> Item {
        Item::new(ItemData::Image(ImageData::new("u", 10.0, 10.0)), Transform::IDENTITY, z)
    }

    #[test]
    fn test_observers_see_mutations() {
        let mut store = ItemStore::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        store.subscribe(move |c| sink.borrow_mut().push(c.clone()));

        let item = image(1.0);
        let id = item.id;
        store.upsert(item);
        store.patch(&id, &ItemPatch::z_index(5.0));
        store.remove(&id);
        store.clear();

        assert_eq!(
            *log.borrow(),
            vec![
                StoreChange::Added(id),
                StoreChange::Updated(id),
                StoreChange::Removed(vec![id]),
                StoreChange::Cleared,
            ]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let mut store = ItemStore::new();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        let handle = store.subscribe(move |_| *sink.borrow_mut() += 1);
        store.upsert(image(1.0));
        store.unsubscribe(handle);
        store.upsert(image(2.0));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_patch_unknown_is_noop() {
        let mut store = ItemStore::new();
        assert!(!store.patch(&uuid::Uuid::new_v4(), &ItemPatch::z_index(1.0)));
    }

    #[test]
    fn test_remove_cascades_children() {
        let mut store = ItemStore::new();
        let note = Item::new(
            ItemData::StickyNote(StickyNoteData::default()),
            Transform::IDENTITY,
            1.0,
        );
        let child = Item::new(ItemData::Text(TextData::new("a")), Transform::IDENTITY, 2.0)
            .with_parent(Some(note.id));
        let other = image(3.0);
        let (note_id, child_id, other_id) = (note.id, child.id, other.id);
        store.upsert(note);
        store.upsert(child);
        store.upsert(other);

        let removed = store.remove(&note_id);
        assert_eq!(removed.len(), 2);
        assert!(!store.contains(&child_id));
        assert_eq!(store.ids(), &[other_id]);
    }

    #[test]
    fn test_render_order_puts_paths_first() {
        let mut store = ItemStore::new();
        let top_path = path(100.0);
        let low_image = image(1.0);
        let (p, i) = (top_path.id, low_image.id);
        store.upsert(top_path);
        store.upsert(low_image);
        let order: Vec<ItemId> = store.render_order().iter().map(|i| i.id).collect();
        assert_eq!(order, vec![p, i]);
    }

    #[test]
    fn test_children_index_excludes_roots() {
        let mut store = ItemStore::new();
        let note = Item::new(
            ItemData::StickyNote(StickyNoteData::default()),
            Transform::IDENTITY,
            1.0,
        );
        let a = image(3.0).with_parent(Some(note.id));
        let b = path(9.0).with_parent(Some(note.id));
        let (n, a_id, b_id) = (note.id, a.id, b.id);
        store.upsert(note);
        store.upsert(a);
        store.upsert(b);

        let index = store.children_index();
        assert_eq!(index.get(&n), Some(&vec![b_id, a_id]));
        assert_eq!(store.render_order().len(), 1);
    }

    #[test]
    fn test_update_with_keeps_identity() {
        let mut store = ItemStore::new();
        let item = image(1.0);
        let id = item.id;
        store.upsert(item);
        let changed = store.update_with(&id, |i| {
            i.id = uuid::Uuid::new_v4();
            i.transform.x = 4.0;
        });
        assert!(changed);
        assert_eq!(store.get(&id).map(|i| i.transform.x), Some(4.0));
    }

    #[test]
    fn test_replace_all_preserves_order() {
        let mut store = ItemStore::new();
        let items = vec![image(1.0), path(2.0), image(3.0)];
        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        store.replace_all(items.clone());
        assert_eq!(store.ids(), ids.as_slice());
        assert_eq!(store.snapshot(), items);
    }
}
