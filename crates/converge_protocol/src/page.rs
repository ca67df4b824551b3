//! Resumable paging over the change ordering.

use converge_model::{EntityRecord, SyncId, Timestamp, Tombstone};
use serde::{Deserialize, Serialize};

/// Anything positioned in the `(timestamp, sync_id)` change ordering.
///
/// Entities order by `(modified_on, sync_id)`, tombstones by
/// `(created_on, sync_id)`. The sync-id tie-break makes the ordering total,
/// which is what makes a cursor over it resumable.
pub trait ChangeOrdered {
    /// The `(timestamp, sync_id)` position of this item.
    fn change_key(&self) -> (Timestamp, SyncId);
}

impl ChangeOrdered for EntityRecord {
    fn change_key(&self) -> (Timestamp, SyncId) {
        self.sort_key()
    }
}

impl ChangeOrdered for Tombstone {
    fn change_key(&self) -> (Timestamp, SyncId) {
        self.sort_key()
    }
}

/// A resumable position within the change ordering.
///
/// With `after = None` the lower bound on the timestamp is **inclusive**:
/// items dated exactly `since` are (re-)delivered, and idempotent apply
/// absorbs the duplicates. With `after = Some(id)`, items at exactly `since`
/// with a sync id at or below `id` are skipped; this is how paging makes
/// progress even when many items share one timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeCursor {
    /// Lower bound on the ordering timestamp.
    pub since: Timestamp,
    /// Tie-break position within `since`, set once a page has been consumed.
    pub after: Option<SyncId>,
}

impl ChangeCursor {
    /// Creates a cursor at a checkpoint watermark (inclusive lower bound).
    #[must_use]
    pub fn at(since: Timestamp) -> Self {
        Self { since, after: None }
    }

    /// Returns true if an item at `key` lies at or beyond this cursor.
    #[must_use]
    pub fn admits(&self, key: (Timestamp, SyncId)) -> bool {
        match self.after {
            None => key.0 >= self.since,
            Some(after) => key.0 > self.since || (key.0 == self.since && key.1 > after),
        }
    }

    /// Returns the cursor positioned strictly after `key`.
    #[must_use]
    pub fn advanced_past(&self, key: (Timestamp, SyncId)) -> Self {
        Self {
            since: key.0,
            after: Some(key.1),
        }
    }
}

/// A bounded page of items, the cursor for the next pull, and a "more
/// available" flag.
///
/// The page carries its own next cursor (computed by the producer over the
/// *unfiltered* page tail) so that consumers always make progress, even
/// when eligibility filtering removes items from the delivered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in change order.
    pub items: Vec<T>,
    /// Cursor to pull the next page from.
    pub next: ChangeCursor,
    /// Whether more items exist beyond this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Creates a page with an explicit next cursor.
    #[must_use]
    pub fn new(items: Vec<T>, next: ChangeCursor, has_more: bool) -> Self {
        Self {
            items,
            next,
            has_more,
        }
    }

    /// Creates an exhausted, empty page that leaves the cursor in place.
    #[must_use]
    pub fn empty(cursor: ChangeCursor) -> Self {
        Self {
            items: Vec::new(),
            next: cursor,
            has_more: false,
        }
    }

    /// Number of items in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the page carries no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: ChangeOrdered> Page<T> {
    /// Builds a page from items already in change order, deriving the next
    /// cursor from the page tail (or keeping `cursor` when empty).
    #[must_use]
    pub fn from_ordered(items: Vec<T>, cursor: ChangeCursor, has_more: bool) -> Self {
        let next = match items.last() {
            Some(last) => cursor.advanced_past(last.change_key()),
            None => cursor,
        };
        Self {
            items,
            next,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};

    fn at(secs: i64) -> Timestamp {
        DateTime::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    #[test]
    fn watermark_cursor_is_inclusive() {
        let cursor = ChangeCursor::at(at(10));
        assert!(cursor.admits((at(10), SyncId::from_bytes([0; 16]))));
        assert!(cursor.admits((at(11), SyncId::from_bytes([0; 16]))));
        assert!(!cursor.admits((at(9), SyncId::from_bytes([0xFF; 16]))));
    }

    #[test]
    fn advanced_cursor_is_strict() {
        let id = SyncId::from_bytes([5; 16]);
        let cursor = ChangeCursor::at(at(10)).advanced_past((at(10), id));

        // Same timestamp: only higher sync ids pass
        assert!(!cursor.admits((at(10), id)));
        assert!(!cursor.admits((at(10), SyncId::from_bytes([4; 16]))));
        assert!(cursor.admits((at(10), SyncId::from_bytes([6; 16]))));
        // Later timestamps always pass
        assert!(cursor.admits((at(11), SyncId::from_bytes([0; 16]))));
    }

    #[test]
    fn from_ordered_advances_past_page_tail() {
        let t = at(3);
        let a = EntityRecord::new(SyncId::from_bytes([1; 16]), t);
        let b = EntityRecord::new(SyncId::from_bytes([2; 16]), t);
        let last_key = b.sort_key();

        let page = Page::from_ordered(vec![a, b], ChangeCursor::at(at(0)), true);

        assert!(!page.next.admits(last_key));
        assert!(page.next.admits((t, SyncId::from_bytes([3; 16]))));
    }

    #[test]
    fn empty_page_keeps_the_cursor() {
        let cursor = ChangeCursor::at(at(7));
        let page: Page<EntityRecord> = Page::empty(cursor);
        assert_eq!(page.next, cursor);
        assert!(!page.has_more);
    }
}
