/// Navigation model: where "next" and "previous" come from
use crate::error::SessionError;
use rand::seq::SliceRandom;
use reel_core::Item;
use std::collections::HashSet;
use tracing::debug;

/// Direction of a relative transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Shuffle permutation over a sequential list.
///
/// Holds a permutation of item indices and a pointer into it. When the
/// pointer walks off the end the permutation is redrawn, with the first
/// slot nudged so the same item never plays twice in a row.
#[derive(Debug, Clone)]
struct ShuffleOrder {
    order: Vec<usize>,
    ptr: usize,
}

impl ShuffleOrder {
    fn new(len: usize, current: usize) -> Self {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut rand::thread_rng());
        // start the walk at the current item
        let ptr = order.iter().position(|&i| i == current).unwrap_or(0);
        Self { order, ptr }
    }

    fn peek_next(&self) -> Option<usize> {
        self.order.get(self.ptr + 1).copied()
    }

    fn peek_previous(&self) -> Option<usize> {
        self.ptr.checked_sub(1).map(|p| self.order[p])
    }

    /// Step forward, redrawing the permutation at the end of a pass.
    fn advance_next(&mut self) -> usize {
        if self.ptr + 1 < self.order.len() {
            self.ptr += 1;
        } else {
            let just_played = self.order[self.ptr];
            self.order.shuffle(&mut rand::thread_rng());
            if self.order.len() > 1 && self.order[0] == just_played {
                self.order.swap(0, 1);
            }
            self.ptr = 0;
            debug!("shuffle pass complete, redrew permutation");
        }
        self.order[self.ptr]
    }

    fn advance_previous(&mut self) -> Option<usize> {
        let prev = self.ptr.checked_sub(1)?;
        self.ptr = prev;
        Some(self.order[self.ptr])
    }

    fn jump_to(&mut self, index: usize) {
        if let Some(pos) = self.order.iter().position(|&i| i == index) {
            self.ptr = pos;
        }
    }
}

/// A fixed, ordered list of items with an index cursor.
///
/// Navigation never mutates the list; previous/next just move the
/// cursor (or the shuffle pointer). Reaching either end without repeat
/// is a terminal boundary, except that shuffle wraps around with a
/// fresh permutation.
#[derive(Debug)]
pub struct SequentialList {
    items: Vec<Item>,
    current: usize,
    shuffle: Option<ShuffleOrder>,
}

impl SequentialList {
    /// Create a list starting at `start`, optionally shuffled.
    ///
    /// # Errors
    /// Returns an error when `items` is empty or `start` is out of range.
    pub fn new(items: Vec<Item>, start: usize, shuffled: bool) -> Result<Self, SessionError> {
        if items.is_empty() {
            return Err(SessionError::EmptySource);
        }
        if start >= items.len() {
            return Err(SessionError::StartIndexOutOfRange {
                index: start,
                len: items.len(),
            });
        }
        let shuffle = shuffled.then(|| ShuffleOrder::new(items.len(), start));
        Ok(Self {
            items,
            current: start,
            shuffle,
        })
    }

    pub fn current(&self) -> &Item {
        &self.items[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle.is_some()
    }

    /// Look at the neighbor in `direction` without moving.
    ///
    /// In shuffle mode the item after the end of the current pass is
    /// unknown (the next permutation has not been drawn), so peeking
    /// there returns `None` even though advancing would succeed.
    pub fn peek(&self, direction: Direction) -> Option<&Item> {
        let index = match (&self.shuffle, direction) {
            (Some(order), Direction::Next) => order.peek_next(),
            (Some(order), Direction::Previous) => order.peek_previous(),
            (None, Direction::Next) => {
                if self.current + 1 < self.items.len() {
                    Some(self.current + 1)
                } else {
                    None
                }
            }
            (None, Direction::Previous) => self.current.checked_sub(1),
        };
        index.map(|i| &self.items[i])
    }

    /// Move the cursor in `direction` and return the new current item.
    pub fn advance(&mut self, direction: Direction) -> Option<Item> {
        match (&mut self.shuffle, direction) {
            (Some(order), Direction::Next) => {
                self.current = order.advance_next();
            }
            (Some(order), Direction::Previous) => {
                self.current = order.advance_previous()?;
            }
            (None, Direction::Next) => {
                if self.current + 1 >= self.items.len() {
                    return None;
                }
                self.current += 1;
            }
            (None, Direction::Previous) => {
                self.current = self.current.checked_sub(1)?;
            }
        }
        Some(self.items[self.current].clone())
    }

    /// Move the cursor to the item with the given identity, if present.
    pub fn jump_to(&mut self, identity: &str) -> bool {
        let Some(index) = self.items.iter().position(|i| i.identity == identity) else {
            return false;
        };
        self.current = index;
        if let Some(order) = &mut self.shuffle {
            order.jump_to(index);
        }
        true
    }

    /// Toggle shuffle, anchoring the permutation at the current item.
    pub fn set_shuffled(&mut self, shuffled: bool) {
        match (shuffled, self.shuffle.is_some()) {
            (true, false) => {
                self.shuffle = Some(ShuffleOrder::new(self.items.len(), self.current));
            }
            (false, true) => self.shuffle = None,
            _ => {}
        }
    }
}

/// Suggestion-driven navigation: a frontier of related items, a back
/// stack, and a grow-only seen set.
///
/// "Next" is the first frontier candidate that has never been current;
/// "previous" pops the back stack. The seen set is authoritative: an
/// item that has ever played is never offered as "next" again, even
/// after back-navigation.
#[derive(Debug)]
pub struct SmartFrontier {
    current: Item,
    frontier: Vec<Item>,
    cursor: usize,
    back_stack: Vec<Item>,
    seen: HashSet<String>,
}

impl SmartFrontier {
    pub fn new(start: Item) -> Self {
        let mut seen = HashSet::new();
        seen.insert(start.identity.clone());
        Self {
            current: start,
            frontier: Vec::new(),
            cursor: 0,
            back_stack: Vec::new(),
            seen,
        }
    }

    pub fn current(&self) -> &Item {
        &self.current
    }

    /// Replace the frontier with a fresh suggestion list.
    pub fn set_frontier(&mut self, items: Vec<Item>) {
        debug!(count = items.len(), "smart frontier refreshed");
        self.frontier = items;
        self.cursor = 0;
    }

    /// The current suggestion list (for pickers).
    pub fn frontier(&self) -> &[Item] {
        &self.frontier
    }

    pub fn back_len(&self) -> usize {
        self.back_stack.len()
    }

    fn eligible(&self, item: &Item) -> bool {
        item.identity != self.current.identity
            && !self.seen.contains(&item.identity)
            && !self.back_stack.iter().any(|b| b.identity == item.identity)
    }

    fn next_candidate(&self) -> Option<(usize, &Item)> {
        self.frontier
            .iter()
            .enumerate()
            .skip(self.cursor)
            .find(|(_, item)| self.eligible(item))
    }

    /// Look at what "next" would play without moving.
    pub fn peek_next(&self) -> Option<&Item> {
        self.next_candidate().map(|(_, item)| item)
    }

    /// Look at what "previous" would play without moving.
    pub fn peek_previous(&self) -> Option<&Item> {
        self.back_stack.last()
    }

    /// Whether the frontier has no unplayed candidates left.
    pub fn is_exhausted(&self) -> bool {
        self.next_candidate().is_none()
    }

    /// Advance to the next unplayed suggestion.
    pub fn advance_next(&mut self) -> Option<Item> {
        let (index, item) = self.next_candidate()?;
        let item = item.clone();
        self.cursor = index + 1;
        let previous = std::mem::replace(&mut self.current, item.clone());
        self.back_stack.push(previous);
        self.seen.insert(item.identity.clone());
        Some(item)
    }

    /// Go back to the most recently played item.
    ///
    /// The item navigated away from is already in the seen set, so it
    /// will not be re-offered by a later "next".
    pub fn advance_previous(&mut self) -> Option<Item> {
        let item = self.back_stack.pop()?;
        self.current = item.clone();
        Some(item)
    }

    /// Explicitly play an item (e.g. chosen from the suggestion picker).
    pub fn jump_to(&mut self, item: Item) {
        let previous = std::mem::replace(&mut self.current, item.clone());
        self.back_stack.push(previous);
        self.seen.insert(item.identity);
    }
}

/// The session's source of next/previous items.
///
/// Sequential for playlists and search results, smart for the
/// suggestion-following mode.
#[derive(Debug)]
pub enum NavigationSource {
    Sequential(SequentialList),
    Smart(SmartFrontier),
}

impl NavigationSource {
    pub fn current(&self) -> &Item {
        match self {
            Self::Sequential(list) => list.current(),
            Self::Smart(frontier) => frontier.current(),
        }
    }

    pub fn peek(&self, direction: Direction) -> Option<&Item> {
        match (self, direction) {
            (Self::Sequential(list), _) => list.peek(direction),
            (Self::Smart(frontier), Direction::Next) => frontier.peek_next(),
            (Self::Smart(frontier), Direction::Previous) => frontier.peek_previous(),
        }
    }

    pub fn advance(&mut self, direction: Direction) -> Option<Item> {
        match (self, direction) {
            (Self::Sequential(list), _) => list.advance(direction),
            (Self::Smart(frontier), Direction::Next) => frontier.advance_next(),
            (Self::Smart(frontier), Direction::Previous) => frontier.advance_previous(),
        }
    }

    /// Make `item` current. Sequential sources require it to be in the
    /// list; smart sources accept anything.
    pub fn jump_to(&mut self, item: &Item) -> bool {
        match self {
            Self::Sequential(list) => list.jump_to(&item.identity),
            Self::Smart(frontier) => {
                frontier.jump_to(item.clone());
                true
            }
        }
    }

    /// Toggle shuffle. No-op for smart sources, which have no fixed
    /// order to permute.
    pub fn set_shuffled(&mut self, shuffled: bool) {
        if let Self::Sequential(list) = self {
            list.set_shuffled(shuffled);
        }
    }

    pub fn is_smart(&self) -> bool {
        matches!(self, Self::Smart(_))
    }
}
