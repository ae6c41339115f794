//! The ordered list of tiles that mirrors a room's timeline.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use eyeball_im::VectorDiff;
use imbl::Vector;
use tracing::{debug, error};

use super::{
    entry::{TimelineEntry, TimelineEntryId},
    tile::Tile,
    tile_kind::TileOptions,
};

/// Whether to enable verbose logging of all timeline diff updates.
const LOG_TIMELINE_DIFFS: bool = cfg!(feature = "log_timeline_diffs");

/// A batch of changes to the timeline, in the order they must be applied.
pub type TimelineDiffs = Vec<VectorDiff<Arc<TimelineEntry>>>;

/// A live view of a room's timeline, as handed out by a [`RoomHandle`](crate::room::RoomHandle).
#[derive(Debug)]
pub struct TimelineHandle {
    /// The entries currently in the timeline window.
    pub entries: Vector<Arc<TimelineEntry>>,
    /// Receives every later change to `entries`.
    pub updates: Receiver<TimelineDiffs>,
}

/// Owns one tile per renderable timeline entry.
///
/// The list keeps a slot for every entry so that diff indices can be applied
/// directly; entries without a tile kind occupy an empty slot and are skipped
/// when computing a tile's predecessor.
#[derive(Debug)]
pub struct TileList {
    slots: Vec<Option<Tile>>,
    updates: Receiver<TimelineDiffs>,
    options: Arc<TileOptions>,
}

impl TileList {
    pub fn new(timeline: TimelineHandle, options: Arc<TileOptions>) -> Self {
        let TimelineHandle { entries, updates } = timeline;
        let slots = entries.into_iter()
            .map(|entry| Tile::for_entry(entry, &options))
            .collect();
        let mut list = Self { slots, updates, options };
        list.relink_range(0, list.slots.len());
        list
    }

    fn make_tile(&self, entry: Arc<TimelineEntry>) -> Option<Tile> {
        Tile::for_entry(entry, &self.options)
    }

    /// Applies all timeline changes received so far.
    ///
    /// Returns `true` if at least one batch was applied.
    pub fn process_updates(&mut self) -> bool {
        let mut applied = false;
        while let Ok(batch) = self.updates.try_recv() {
            for diff in batch {
                self.apply_diff(diff);
            }
            applied = true;
        }
        applied
    }

    pub fn apply_diff(&mut self, diff: VectorDiff<Arc<TimelineEntry>>) {
        match diff {
            VectorDiff::Append { values } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Append {}", values.len()); }
                let start = self.slots.len();
                for entry in values {
                    let tile = self.make_tile(entry);
                    self.slots.push(tile);
                }
                self.relink_range(start, self.slots.len());
            }
            VectorDiff::Clear => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Clear"); }
                self.dispose_all();
            }
            VectorDiff::PushFront { value } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff PushFront"); }
                self.insert(0, value);
            }
            VectorDiff::PushBack { value } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff PushBack"); }
                self.insert(self.slots.len(), value);
            }
            VectorDiff::PopFront => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff PopFront"); }
                if !self.slots.is_empty() {
                    self.remove(0);
                }
            }
            VectorDiff::PopBack => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff PopBack"); }
                if let Some(Some(mut tile)) = self.slots.pop() {
                    tile.dispose();
                }
            }
            VectorDiff::Insert { index, value } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Insert at {index}"); }
                if index <= self.slots.len() {
                    self.insert(index, value);
                } else {
                    error!("BUG: timeline diff: Insert index {index} out of bounds, len {}", self.slots.len());
                }
            }
            VectorDiff::Set { index, value } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Set at {index}"); }
                if index < self.slots.len() {
                    self.set(index, value);
                } else {
                    error!("BUG: timeline diff: Set index {index} out of bounds, len {}", self.slots.len());
                }
            }
            VectorDiff::Remove { index } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Remove at {index}"); }
                if index < self.slots.len() {
                    self.remove(index);
                } else {
                    error!("BUG: timeline diff: Remove index {index} out of bounds, len {}", self.slots.len());
                }
            }
            VectorDiff::Truncate { length } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Truncate to {length}"); }
                while self.slots.len() > length {
                    if let Some(Some(mut tile)) = self.slots.pop() {
                        tile.dispose();
                    }
                }
            }
            VectorDiff::Reset { values } => {
                if LOG_TIMELINE_DIFFS { debug!("timeline: diff Reset, old length {}, new length {}", self.slots.len(), values.len()); }
                self.dispose_all();
                for entry in values {
                    let tile = self.make_tile(entry);
                    self.slots.push(tile);
                }
                self.relink_range(0, self.slots.len());
            }
        }
    }

    fn insert(&mut self, index: usize, entry: Arc<TimelineEntry>) {
        let tile = self.make_tile(entry);
        self.slots.insert(index, tile);
        self.relink(index);
        self.relink_next_after(index);
    }

    fn remove(&mut self, index: usize) {
        if let Some(mut tile) = self.slots.remove(index) {
            tile.dispose();
        }
        // The removed tile's successor now has a new predecessor.
        if let Some(next) = self.next_tile_index(index) {
            self.relink(next);
        }
    }

    fn set(&mut self, index: usize, entry: Arc<TimelineEntry>) {
        let replacement = match &mut self.slots[index] {
            Some(tile) => {
                let action = tile.update_entry(Arc::clone(&entry), None);
                if action.should_update {
                    tile.emit_change(action.param);
                }
                action.should_replace
            }
            None => true,
        };
        if replacement {
            if let Some(mut old) = self.slots[index].take() {
                old.dispose();
            }
            self.slots[index] = self.make_tile(entry);
        }
        self.relink(index);
        self.relink_next_after(index);
    }

    fn next_tile_index(&self, from: usize) -> Option<usize> {
        (from..self.slots.len()).find(|&i| self.slots[i].is_some())
    }

    fn relink_next_after(&mut self, index: usize) {
        if let Some(next) = self.next_tile_index(index + 1) {
            self.relink(next);
        }
    }

    fn relink_range(&mut self, start: usize, end: usize) {
        for index in start..end {
            self.relink(index);
        }
    }

    /// Tells the tile at `index` (if any) which tile now precedes it.
    fn relink(&mut self, index: usize) {
        let (before, rest) = self.slots.split_at_mut(index);
        let Some(Some(tile)) = rest.first_mut() else { return };
        let prev = before.iter().rev().find_map(Option::as_ref);
        tile.update_previous_sibling(prev);
    }

    fn dispose_all(&mut self) {
        for mut tile in self.slots.drain(..).flatten() {
            tile.dispose();
        }
    }

    /// Disposes every tile; the list is empty afterwards and ignores no further updates.
    pub fn dispose(&mut self) {
        self.dispose_all();
    }

    pub fn options(&self) -> &Arc<TileOptions> {
        &self.options
    }

    /// The tiles in timeline order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.slots.iter().flatten()
    }

    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.slots.iter_mut().flatten()
    }

    pub fn tile(&self, id: &TimelineEntryId) -> Option<&Tile> {
        self.tiles().find(|tile| tile.id() == id)
    }

    pub fn tile_mut(&mut self, id: &TimelineEntryId) -> Option<&mut Tile> {
        self.tiles_mut().find(|tile| tile.id() == id)
    }

    /// The number of tiles, not counting entries that have no tile.
    pub fn len(&self) -> usize {
        self.tiles().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
