#![allow(dead_code)]

//! Fixture iterator used by tests in `merging_iter` and `db_iter`: a fixed, pre-sorted vector of
//! entries walked back and forth exactly like a real `LdbIterator` would.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::cmp::{Cmp, DefaultCmp};
use crate::error::Result;
use crate::types::LdbIterator;

pub struct TestLdbIter {
    v: Vec<(Vec<u8>, Vec<u8>)>,
    ix: usize,
    init: bool,
    cmp: Arc<Box<dyn Cmp>>,
}

impl TestLdbIter {
    pub fn new(v: Vec<(Vec<u8>, Vec<u8>)>) -> TestLdbIter {
        TestLdbIter::new_with_cmp(v, Arc::new(Box::new(DefaultCmp)))
    }

    /// Like `new`, but seeks compare keys with `cmp` instead of plain bytewise order -- needed
    /// when the fixture's entries are internal keys rather than plain user keys.
    pub fn new_with_cmp(v: Vec<(Vec<u8>, Vec<u8>)>, cmp: Arc<Box<dyn Cmp>>) -> TestLdbIter {
        TestLdbIter {
            v,
            ix: 0,
            init: false,
            cmp,
        }
    }
}

impl Iterator for TestLdbIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.init {
            self.init = true;
            self.ix = 0;
        } else if self.ix < self.v.len() {
            self.ix += 1;
        }
        self.current()
    }
}

impl LdbIterator for TestLdbIter {
    fn valid(&self) -> bool {
        self.init && self.ix < self.v.len()
    }

    fn current(&self) -> Option<Self::Item> {
        if self.valid() {
            Some(self.v[self.ix].clone())
        } else {
            None
        }
    }

    fn seek(&mut self, key: &[u8]) {
        self.init = true;
        self.ix = 0;
        while self.ix < self.v.len() && self.cmp.cmp(&self.v[self.ix].0, key) == Ordering::Less {
            self.ix += 1;
        }
    }

    fn reset(&mut self) {
        self.init = false;
        self.ix = 0;
    }

    fn prev(&mut self) -> Option<Self::Item> {
        if !self.init || self.ix == 0 {
            self.init = true;
            self.ix = self.v.len();
            return None;
        }
        self.ix -= 1;
        self.current()
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }

    fn seek_to_last(&mut self) -> Option<Self::Item> {
        self.init = true;
        self.ix = self.v.len().saturating_sub(1);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &'static str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    fn fixture() -> TestLdbIter {
        TestLdbIter::new(vec![
            (b("a"), b("1")),
            (b("b"), b("2")),
            (b("c"), b("3")),
        ])
    }

    #[test]
    fn test_test_ldb_iter_fwd() {
        let mut it = fixture();
        assert!(!it.valid());
        assert_eq!(it.next(), Some((b("a"), b("1"))));
        assert_eq!(it.next(), Some((b("b"), b("2"))));
        assert_eq!(it.next(), Some((b("c"), b("3"))));
        assert_eq!(it.next(), None);
    }

    #[test]
    fn test_test_ldb_iter_seek() {
        let mut it = fixture();
        it.seek(b"b");
        assert_eq!(it.current(), Some((b("b"), b("2"))));
        it.seek(b"z");
        assert_eq!(it.current(), None);
    }

    #[test]
    fn test_test_ldb_iter_prev() {
        let mut it = fixture();
        it.next();
        it.next();
        assert_eq!(it.current(), Some((b("b"), b("2"))));
        assert_eq!(it.prev(), Some((b("a"), b("1"))));
    }
}
