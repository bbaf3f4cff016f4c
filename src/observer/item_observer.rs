//! Active-item transition observer.

use log::{debug, warn};

use crate::track::TrackId;

/// What an item transition means for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEvent {
    /// A new item became active; count one play for it.
    Started(TrackId),
    /// Repeated report of the active item.
    Unchanged,
    /// The engine emptied while nothing was expected to play.
    Ended,
    /// The engine emptied while more content was expected; skip once.
    UnexpectedEmpty,
    /// The engine keeps emptying without ever starting an item.
    EmptyLoop,
}

pub struct ItemChangeObserver {
    max_consecutive_empty: usize,
    consecutive_empty: usize,
    last_item: Option<TrackId>,
    armed: bool,
}

impl ItemChangeObserver {
    pub fn new(max_consecutive_empty: usize) -> Self {
        Self {
            max_consecutive_empty: max_consecutive_empty.max(2),
            consecutive_empty: 0,
            last_item: None,
            armed: false,
        }
    }

    /// A fresh load was issued: its start counts even when it repeats the
    /// previous item.
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn reset(&mut self) {
        self.consecutive_empty = 0;
        self.last_item = None;
        self.armed = false;
    }

    pub fn observe(&mut self, item: Option<TrackId>, content_expected: bool) -> ItemEvent {
        match item {
            Some(track_id) => {
                self.consecutive_empty = 0;
                if !self.armed && self.last_item == Some(track_id) {
                    return ItemEvent::Unchanged;
                }
                self.armed = false;
                self.last_item = Some(track_id);
                ItemEvent::Started(track_id)
            }
            None => {
                self.last_item = None;
                if !content_expected {
                    return ItemEvent::Ended;
                }
                self.consecutive_empty += 1;
                if self.consecutive_empty >= self.max_consecutive_empty {
                    warn!(
                        "ItemChangeObserver: {} empty transitions in a row",
                        self.consecutive_empty
                    );
                    ItemEvent::EmptyLoop
                } else {
                    debug!("ItemChangeObserver: unexpected empty transition");
                    ItemEvent::UnexpectedEmpty
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_fires_once_per_transition() {
        let mut observer = ItemChangeObserver::new(2);
        let a = TrackId::new();
        observer.arm();
        assert_eq!(observer.observe(Some(a), true), ItemEvent::Started(a));
        assert_eq!(observer.observe(Some(a), true), ItemEvent::Unchanged);
    }

    #[test]
    fn test_rearming_counts_reload_of_same_item() {
        let mut observer = ItemChangeObserver::new(2);
        let a = TrackId::new();
        observer.arm();
        observer.observe(Some(a), true);
        observer.arm();
        assert_eq!(observer.observe(Some(a), true), ItemEvent::Started(a));
    }

    #[test]
    fn test_transition_to_other_item_fires_without_arming() {
        let mut observer = ItemChangeObserver::new(2);
        let (a, b) = (TrackId::new(), TrackId::new());
        observer.observe(Some(a), true);
        assert_eq!(observer.observe(Some(b), true), ItemEvent::Started(b));
    }

    #[test]
    fn test_repeated_empty_transitions_escalate() {
        let mut observer = ItemChangeObserver::new(2);
        assert_eq!(observer.observe(None, true), ItemEvent::UnexpectedEmpty);
        assert_eq!(observer.observe(None, true), ItemEvent::EmptyLoop);
    }

    #[test]
    fn test_start_between_empties_resets_escalation() {
        let mut observer = ItemChangeObserver::new(2);
        let a = TrackId::new();
        assert_eq!(observer.observe(None, true), ItemEvent::UnexpectedEmpty);
        observer.observe(Some(a), true);
        assert_eq!(observer.observe(None, true), ItemEvent::UnexpectedEmpty);
    }

    #[test]
    fn test_empty_when_idle_is_plain_end() {
        let mut observer = ItemChangeObserver::new(2);
        assert_eq!(observer.observe(None, false), ItemEvent::Ended);
        assert_eq!(observer.observe(None, false), ItemEvent::Ended);
    }
}
