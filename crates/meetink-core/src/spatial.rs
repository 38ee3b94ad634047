//! Quadtree spatial index over axis-aligned item bounds.
//!
//! The index is rebuilt from scratch on every full render. Objects that straddle quadrant
//! boundaries are stored in every quadrant they touch; retrieval deduplicates by key.

use std::collections::HashSet;
use std::hash::Hash;

use kurbo::{Point, Rect};

use crate::config::QuadtreeConfig;
use crate::geometry::{index_bounds, rects_touch};
use crate::items::{Item, ItemId};

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: Rect,
    level: usize,
    objects: Vec<(T, Rect)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy> Node<T> {
    fn new(bounds: Rect, level: usize) -> Self {
        Self {
            bounds,
            level,
            objects: Vec::new(),
            children: None,
        }
    }

    fn split(&mut self) {
        let b = self.bounds;
        let c = b.center();
        let level = self.level + 1;
        self.children = Some(Box::new([
            Node::new(Rect::new(b.x0, b.y0, c.x, c.y), level),
            Node::new(Rect::new(c.x, b.y0, b.x1, c.y), level),
            Node::new(Rect::new(b.x0, c.y, c.x, b.y1), level),
            Node::new(Rect::new(c.x, c.y, b.x1, b.y1), level),
        ]));
    }

    /// Push into every touching child; `false` if no child touches the rect.
    fn push_down(children: &mut [Node<T>; 4], entry: (T, Rect), limits: &QuadtreeConfig) -> bool {
        let mut placed = false;
        for child in children.iter_mut() {
            if rects_touch(&child.bounds, &entry.1) {
                child.insert(entry, limits);
                placed = true;
            }
        }
        placed
    }

    fn insert(&mut self, entry: (T, Rect), limits: &QuadtreeConfig) {
        if let Some(children) = self.children.as_mut() {
            if !Self::push_down(children, entry, limits) {
                self.objects.push(entry);
            }
            return;
        }

        self.objects.push(entry);
        if self.objects.len() > limits.max_objects && self.level < limits.max_levels {
            self.split();
            let objects = std::mem::take(&mut self.objects);
            if let Some(children) = self.children.as_mut() {
                for entry in objects {
                    if !Self::push_down(children, entry, limits) {
                        self.objects.push(entry);
                    }
                }
            }
        }
    }

    fn retrieve(&self, query: &Rect, out: &mut Vec<T>, seen: &mut HashSet<T>)
    where
        T: Eq + Hash,
    {
        for (key, rect) in &self.objects {
            if rects_touch(rect, query) && seen.insert(*key) {
                out.push(*key);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                if rects_touch(&child.bounds, query) {
                    child.retrieve(query, out, seen);
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match &self.children {
            Some(children) => children.iter().map(Node::depth).max().unwrap_or(0) + 1,
            None => 0,
        }
    }
}

/// A region quadtree keyed by `T`.
#[derive(Debug, Clone)]
pub struct Quadtree<T> {
    root: Node<T>,
    limits: QuadtreeConfig,
    len: usize,
}

impl<T: Copy + Eq + Hash> Quadtree<T> {
    pub fn new(bounds: Rect, limits: QuadtreeConfig) -> Self {
        Self {
            root: Node::new(bounds, 0),
            limits,
            len: 0,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.root.bounds
    }

    /// Insert a key with its bounds. Objects outside the root bounds stay at the root.
    pub fn insert(&mut self, key: T, bounds: Rect) {
        self.root.insert((key, bounds), &self.limits);
        self.len += 1;
    }

    /// Append to `out` every key whose bounds intersect `query` (inclusive), each at most once.
    pub fn retrieve<'a>(&self, out: &'a mut Vec<T>, query: Rect) -> &'a mut Vec<T> {
        let mut seen: HashSet<T> = out.iter().copied().collect();
        self.root.retrieve(&query, out, &mut seen);
        out
    }

    /// Keys whose bounds intersect `query`.
    pub fn query(&self, query: Rect) -> Vec<T> {
        let mut out = Vec::new();
        self.retrieve(&mut out, query);
        out
    }

    /// Remove everything, keeping the root bounds.
    pub fn clear(&mut self) {
        self.root = Node::new(self.root.bounds, 0);
        self.len = 0;
    }

    /// Remove everything and reset the root bounds.
    pub fn reset(&mut self, bounds: Rect) {
        self.root = Node::new(bounds, 0);
        self.len = 0;
    }

    /// Number of inserts since the last clear.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

/// Item-level index over root items, used for hit-testing, box-select and eraser queries.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: Quadtree<ItemId>,
}

impl SpatialIndex {
    pub fn new(limits: QuadtreeConfig) -> Self {
        Self {
            tree: Quadtree::new(Rect::ZERO, limits),
        }
    }

    /// Rebuild over `items`. The root covers the union of their bounds.
    pub fn rebuild<'a>(&mut self, items: impl IntoIterator<Item = &'a Item>) {
        let entries: Vec<(ItemId, Rect)> = items
            .into_iter()
            .map(|item| (item.id, index_bounds(item)))
            .collect();
        let root = entries
            .iter()
            .map(|(_, r)| *r)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
            .inflate(1.0, 1.0);
        self.tree.reset(root);
        for (id, rect) in entries {
            self.tree.insert(id, rect);
        }
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn insert(&mut self, item: &Item) {
        self.tree.insert(item.id, index_bounds(item));
    }

    pub fn query_rect(&self, rect: Rect) -> Vec<ItemId> {
        self.tree.query(rect)
    }

    /// Candidates near a point, within `radius` world units.
    pub fn query_point(&self, point: Point, radius: f64) -> Vec<ItemId> {
        self.tree
            .query(Rect::from_center_size(point, (radius * 2.0, radius * 2.0)))
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
