//! Wraps an iterator over internal keys (typically a `MergingIter` over a memtable and a set of
//! table iterators) and exposes a snapshot view over user keys: multiple internal versions of the
//! same user key collapse to at most one, tombstones (`ValueType::Deletion`) disappear instead of
//! being yielded, and nothing written at a sequence number above the snapshot is ever visible.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cmp::Cmp;
use crate::error::{Result, Status, StatusCode};
use crate::key_types::{self, LookupKey};
use crate::types::{LdbIterator, SequenceNumber, ValueType};

/// A 1 MiB saved-value buffer that has grown past this is shrunk back down rather than kept
/// around indefinitely, mirroring the source reader's own heuristic for `Prev()`.
const SAVED_VALUE_SHRINK_THRESHOLD: usize = 1 << 20;

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Reverse,
}

/// Snapshot-isolated, user-key-level iterator over an internal-key child iterator.
///
/// Only `sequence` and earlier entries are visible. Forward iteration reads the child's current
/// internal key directly; once direction flips to `Reverse`, the exposed key/value live in
/// `saved_key`/`saved_value` because the child may have stepped past several internal versions of
/// the same user key while collecting the one to expose.
pub struct DBIter<It: LdbIterator> {
    iter: It,
    cmp: Arc<Box<dyn Cmp>>,
    sequence: SequenceNumber,
    direction: Direction,
    valid: bool,
    /// Whether the iterator has been positioned at least once. A fresh `DBIter`'s first `next()`
    /// call means "seek to first"; every later call means "advance", even once exhausted.
    started: bool,
    /// Sticky: once set by a corrupted internal key, never cleared. `status()` reports this
    /// ahead of the child iterator's own status.
    status: Status,
    saved_key: Vec<u8>,
    saved_value: Vec<u8>,
}

impl<It: LdbIterator> DBIter<It> {
    pub fn new(iter: It, cmp: Arc<Box<dyn Cmp>>, sequence: SequenceNumber) -> DBIter<It> {
        DBIter {
            iter,
            cmp,
            sequence,
            direction: Direction::Forward,
            valid: false,
            started: false,
            status: Status::ok(),
            saved_key: Vec::new(),
            saved_value: Vec::new(),
        }
    }

    fn save_key(&mut self, k: &[u8]) {
        self.saved_key.clear();
        self.saved_key.extend_from_slice(k);
    }

    fn save_value(&mut self, v: &[u8]) {
        if self.saved_value.capacity() > v.len() + SAVED_VALUE_SHRINK_THRESHOLD {
            self.saved_value = Vec::new();
        }
        self.saved_value.clear();
        self.saved_value.extend_from_slice(v);
    }

    fn clear_saved_value(&mut self) {
        if self.saved_value.capacity() > SAVED_VALUE_SHRINK_THRESHOLD {
            self.saved_value = Vec::new();
        } else {
            self.saved_value.clear();
        }
    }

    /// Parses the child's current internal key. Marks `status` corrupt (once, stickily) and
    /// returns `None` if it doesn't even contain a valid tag -- the scan keeps going regardless,
    /// same as any other hidden/skipped entry.
    fn parse_current_key(&mut self) -> Option<(ValueType, SequenceNumber, Vec<u8>)> {
        let (ikey, _) = self.iter.current()?;
        match key_types::parse_internal_key(&ikey) {
            Some((t, seq, uk)) => Some((t, seq, uk.to_vec())),
            None => {
                self.status = Status::new(StatusCode::Corruption, "corrupted internal key in DBIter");
                None
            }
        }
    }

    /// Scans forward from the child's current position until it finds a live, visible value for
    /// some user key, collapsing everything hidden along the way. `skip`, when `skipping` is set,
    /// is the user key whose older versions and/or tombstone are still being skipped past.
    fn find_next_user_entry(&mut self, mut skipping: bool, mut skip: Vec<u8>) {
        debug_assert_eq!(self.direction, Direction::Forward);
        loop {
            if !self.iter.valid() {
                break;
            }
            if let Some((t, seq, uk)) = self.parse_current_key() {
                if seq <= self.sequence {
                    match t {
                        ValueType::Deletion => {
                            skip = uk;
                            skipping = true;
                        }
                        ValueType::Value => {
                            if skipping && self.cmp.cmp(&uk, &skip) != Ordering::Greater {
                                // Hidden behind a deletion or an earlier version at this
                                // snapshot; keep scanning.
                            } else {
                                self.valid = true;
                                self.saved_key.clear();
                                return;
                            }
                        }
                    }
                }
            }
            self.iter.next();
        }
        self.saved_key.clear();
        self.valid = false;
    }

    /// Scans backward, retaining the last (i.e. most recent in forward order, first encountered
    /// going backward... no: the *earliest-encountered-going-backward* is the most recent
    /// version) live value for the user key the scan is currently collecting, until it either
    /// runs off the front or crosses into an older user key.
    fn find_prev_user_entry(&mut self) {
        debug_assert_eq!(self.direction, Direction::Reverse);
        let mut value_type = ValueType::Deletion;

        if self.iter.valid() {
            loop {
                if !self.iter.valid() {
                    break;
                }
                if let Some((t, seq, uk)) = self.parse_current_key() {
                    if seq <= self.sequence {
                        if value_type != ValueType::Deletion
                            && self.cmp.cmp(&uk, &self.saved_key) == Ordering::Less
                        {
                            // The entries for `saved_key` are exhausted and a live value was
                            // already collected: stop before crossing into the older user key.
                            break;
                        }
                        value_type = t;
                        match t {
                            ValueType::Deletion => {
                                self.saved_key.clear();
                                self.clear_saved_value();
                            }
                            ValueType::Value => {
                                let (_, val) = self.iter.current().unwrap();
                                let key = uk;
                                self.save_value(&val);
                                self.save_key(&key);
                            }
                        }
                    }
                }
                self.iter.prev();
            }
        }

        if value_type == ValueType::Deletion {
            self.valid = false;
            self.saved_key.clear();
            self.clear_saved_value();
            self.direction = Direction::Forward;
        } else {
            self.valid = true;
        }
    }
}

impl<It: LdbIterator> Iterator for DBIter<It> {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            self.seek_to_first_entry();
            return self.current();
        }
        if !self.valid {
            return None;
        }

        if self.direction == Direction::Reverse {
            self.direction = Direction::Forward;
            // `iter` is positioned just before the entries for this key; step into them so the
            // skip logic below can walk past the remaining versions for `saved_key`.
            if !self.iter.valid() {
                self.iter.reset();
                self.iter.next();
            } else {
                self.iter.next();
            }
            if !self.iter.valid() {
                self.valid = false;
                self.saved_key.clear();
                return None;
            }
        } else {
            let key = self.iter.current().map(|(k, _)| key_types::extract_user_key(&k).to_vec());
            if let Some(k) = key {
                self.save_key(&k);
            }
        }

        let skip = std::mem::take(&mut self.saved_key);
        self.find_next_user_entry(true, skip);
        self.current()
    }
}

impl<It: LdbIterator> DBIter<It> {
    fn seek_to_first_entry(&mut self) {
        self.started = true;
        self.direction = Direction::Forward;
        self.iter.reset();
        self.iter.next();
        if self.iter.valid() {
            self.find_next_user_entry(false, Vec::new());
        } else {
            self.valid = false;
        }
    }
}

impl<It: LdbIterator> LdbIterator for DBIter<It> {
    fn valid(&self) -> bool {
        self.valid
    }

    fn current(&self) -> Option<Self::Item> {
        if !self.valid {
            return None;
        }
        match self.direction {
            Direction::Forward => {
                let (ikey, val) = self.iter.current()?;
                Some((key_types::extract_user_key(&ikey).to_vec(), val))
            }
            Direction::Reverse => Some((self.saved_key.clone(), self.saved_value.clone())),
        }
    }

    fn seek(&mut self, key: &[u8]) {
        self.started = true;
        self.direction = Direction::Forward;
        self.saved_value.clear();
        self.saved_key.clear();
        let target = LookupKey::new_for_seek(key, self.sequence);
        self.iter.seek(target.internal_key());
        if self.iter.valid() {
            self.find_next_user_entry(false, Vec::new());
        } else {
            self.valid = false;
        }
    }

    fn reset(&mut self) {
        self.iter.reset();
        self.direction = Direction::Forward;
        self.valid = false;
        self.started = false;
        self.saved_key.clear();
        self.clear_saved_value();
    }

    fn prev(&mut self) -> Option<Self::Item> {
        if !self.valid {
            return None;
        }

        if self.direction == Direction::Forward {
            let key = self
                .iter
                .current()
                .map(|(k, _)| key_types::extract_user_key(&k).to_vec())?;
            self.save_key(&key);
            loop {
                self.iter.prev();
                if !self.iter.valid() {
                    self.valid = false;
                    self.saved_key.clear();
                    self.clear_saved_value();
                    return None;
                }
                if let Some((ikey, _)) = self.iter.current() {
                    if self.cmp.cmp(key_types::extract_user_key(&ikey), &self.saved_key) == Ordering::Less {
                        break;
                    }
                }
            }
            self.direction = Direction::Reverse;
        }

        self.find_prev_user_entry();
        self.current()
    }

    fn status(&self) -> Result<()> {
        if !self.status.is_ok() {
            return Err(self.status.clone());
        }
        self.iter.status()
    }

    fn seek_to_last(&mut self) -> Option<Self::Item> {
        self.started = true;
        self.direction = Direction::Reverse;
        self.clear_saved_value();
        self.iter.seek_to_last();
        self.find_prev_user_entry();
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmp::{DefaultCmp, InternalKeyCmp};
    use crate::key_types::append_internal_key;
    use crate::test_util::TestLdbIter;

    /// The comparator `DBIter` itself uses: plain user-key order.
    fn cmp() -> Arc<Box<dyn Cmp>> {
        Arc::new(Box::new(DefaultCmp))
    }

    /// The comparator the child (internal-key) iterator orders and seeks by.
    fn internal_cmp() -> Arc<Box<dyn Cmp>> {
        Arc::new(Box::new(InternalKeyCmp(Arc::new(Box::new(DefaultCmp)))))
    }

    fn ik(user_key: &str, seq: SequenceNumber, t: ValueType) -> Vec<u8> {
        let mut buf = Vec::new();
        append_internal_key(&mut buf, user_key.as_bytes(), seq, t);
        buf
    }

    fn b(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn child(entries: Vec<(Vec<u8>, Vec<u8>)>) -> TestLdbIter {
        TestLdbIter::new_with_cmp(entries, internal_cmp())
    }

    #[test]
    fn test_dbiter_basic_forward() {
        let entries = vec![
            (ik("a", 3, ValueType::Value), b("a3")),
            (ik("b", 2, ValueType::Value), b("b2")),
            (ik("c", 1, ValueType::Value), b("c1")),
        ];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        assert_eq!(it.next(), Some((b("a"), b("a3"))));
        assert_eq!(it.next(), Some((b("b"), b("b2"))));
        assert_eq!(it.next(), Some((b("c"), b("c1"))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_dbiter_hides_newer_versions_and_collapses_duplicates() {
        let entries = vec![
            (ik("a", 5, ValueType::Value), b("a5")),
            (ik("a", 3, ValueType::Value), b("a3")),
            (ik("b", 2, ValueType::Value), b("b2")),
        ];
        // Snapshot at seq 3: a's newest visible version is a3, not a5.
        let mut it = DBIter::new(child(entries), cmp(), 3);
        assert_eq!(it.next(), Some((b("a"), b("a3"))));
        assert_eq!(it.next(), Some((b("b"), b("b2"))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_dbiter_tombstone_hides_older_version() {
        let entries = vec![
            (ik("a", 4, ValueType::Deletion), b("")),
            (ik("a", 2, ValueType::Value), b("a2")),
            (ik("b", 1, ValueType::Value), b("b1")),
        ];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        assert_eq!(it.next(), Some((b("b"), b("b1"))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_dbiter_seek() {
        let entries = vec![
            (ik("a", 1, ValueType::Value), b("a1")),
            (ik("b", 1, ValueType::Value), b("b1")),
            (ik("c", 1, ValueType::Value), b("c1")),
        ];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        it.seek(b"b");
        assert_eq!(it.current(), Some((b("b"), b("b1"))));
    }

    #[test]
    fn test_dbiter_forward_then_backward() {
        let entries = vec![
            (ik("a", 1, ValueType::Value), b("a1")),
            (ik("b", 1, ValueType::Value), b("b1")),
            (ik("c", 1, ValueType::Value), b("c1")),
        ];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        assert_eq!(it.next(), Some((b("a"), b("a1"))));
        assert_eq!(it.next(), Some((b("b"), b("b1"))));
        assert_eq!(it.next(), Some((b("c"), b("c1"))));
        assert_eq!(it.prev(), Some((b("b"), b("b1"))));
        assert_eq!(it.prev(), Some((b("a"), b("a1"))));
        assert_eq!(it.prev(), None);
        assert!(!it.valid());
    }

    #[test]
    fn test_dbiter_seek_to_last() {
        let entries = vec![
            (ik("a", 1, ValueType::Value), b("a1")),
            (ik("b", 1, ValueType::Value), b("b1")),
        ];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        it.seek_to_last();
        assert_eq!(it.current(), Some((b("b"), b("b1"))));
    }

    #[test]
    fn test_dbiter_corrupt_internal_key_sticky_status() {
        let entries = vec![(b("short"), b("v"))];
        let mut it = DBIter::new(child(entries), cmp(), 10);
        it.next();
        assert!(it.status().is_err());
    }
}
