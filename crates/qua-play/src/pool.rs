//! Scroll-position driven object pool.
//!
//! Items live in one arena sorted by position. A cursor marks the first
//! upcoming item; everything before it is either active or retired, so
//! promotion and retirement never move items.

use serde::{Deserialize, Serialize};

/// Anything the pool can schedule.
pub trait PoolItem {
    /// Position at which the item enters the window.
    fn position(&self) -> f64;

    /// Position at which the item leaves the window.
    fn end_position(&self) -> f64 {
        self.position()
    }

    fn on_activate(&mut self) {}

    fn on_retire(&mut self) {}
}

/// Active window around the track position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolWindow {
    pub create_distance: f64,
    pub recycle_distance: f64,
}

impl Default for PoolWindow {
    fn default() -> Self {
        Self {
            create_distance: 1500.0,
            recycle_distance: 1500.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectPool<T> {
    items: Vec<T>,
    /// First upcoming item.
    next: usize,
    /// Active item indices, ascending.
    active: Vec<usize>,
    /// Retired while seeding; reported by the first sync.
    carried: Vec<usize>,
    retired: usize,
    window: PoolWindow,
}

impl<T: PoolItem> ObjectPool<T> {
    /// Build a pool and seed it at `track_position`.
    ///
    /// Seeds the larger of `initial_size` items or every item within the
    /// create distance. Items whose whole span is already behind the recycle
    /// boundary are retired straight away.
    pub fn new(
        mut items: Vec<T>,
        window: PoolWindow,
        initial_size: usize,
        track_position: f64,
    ) -> Self {
        items.sort_by(|a, b| a.position().total_cmp(&b.position()));
        let mut pool = Self {
            items,
            next: 0,
            active: Vec::new(),
            carried: Vec::new(),
            retired: 0,
            window,
        };

        let mut carried = Vec::new();
        while pool.next < pool.items.len()
            && (pool.next < initial_size
                || pool.items[pool.next].position() <= track_position + window.create_distance)
        {
            pool.promote_next(track_position, &mut carried);
        }
        pool.carried = carried;
        pool
    }

    /// Re-derive the active set for `track_position`.
    ///
    /// Returns the indices retired by this call, in index order.
    pub fn sync(&mut self, track_position: f64) -> Vec<usize> {
        let mut retired = std::mem::take(&mut self.carried);
        let recycle_at = track_position - self.window.recycle_distance;

        let items = &mut self.items;
        self.active.retain(|&i| {
            if items[i].end_position() < recycle_at {
                items[i].on_retire();
                retired.push(i);
                false
            } else {
                true
            }
        });

        while self.next < self.items.len()
            && self.items[self.next].position() <= track_position + self.window.create_distance
        {
            self.promote_next(track_position, &mut retired);
        }

        self.retired += retired.len();
        retired.sort_unstable();
        retired
    }

    fn promote_next(&mut self, track_position: f64, retired: &mut Vec<usize>) {
        let index = self.next;
        self.next += 1;
        let item = &mut self.items[index];
        item.on_activate();
        if item.end_position() < track_position - self.window.recycle_distance {
            // Skipped over entirely.
            item.on_retire();
            retired.push(index);
        } else {
            self.active.push(index);
        }
    }

    pub fn set_window(&mut self, window: PoolWindow) {
        self.window = window;
    }

    pub fn window(&self) -> PoolWindow {
        self.window
    }

    /// Indices of active items, ascending.
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    pub fn active_items(&self) -> impl Iterator<Item = &T> {
        self.active.iter().map(|&i| &self.items[i])
    }

    /// Index range of items not yet promoted.
    pub fn upcoming(&self) -> std::ops::Range<usize> {
        self.next..self.items.len()
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.binary_search(&index).is_ok()
    }

    /// Promoted and no longer active.
    pub fn is_retired(&self, index: usize) -> bool {
        index < self.next && !self.is_active(index)
    }

    pub fn retired_count(&self) -> usize {
        self.retired
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.active.clear();
        self.carried.clear();
        self.next = 0;
    }
}
