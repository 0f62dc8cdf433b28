use std::cmp::Ordering;
use std::sync::Arc;

use crate::cmp::Cmp;
use crate::error::Result;
use crate::types::LdbIterator;

#[derive(PartialEq)]
enum SmallestOrLargest {
    Smallest,
    Largest,
}

#[derive(PartialEq, Clone, Copy)]
enum Direction {
    Forward,
    Reverse,
}

/// Forms a k-way merge of child iterators over internal-key streams (one memtable, one per
/// SSTable level, ...). At any valid position it exposes the minimum current key across all
/// valid children (forward), or the maximum for `prev` (reverse); re-heaping after every move is
/// this iterator's job, not its callers'.
pub struct MergingIter {
    iters: Vec<Box<dyn LdbIterator<Item = (Vec<u8>, Vec<u8>)>>>,
    current: Option<usize>,
    cmp: Arc<Box<dyn Cmp>>,
    direction: Direction,
}

impl MergingIter {
    pub fn new(
        iters: Vec<Box<dyn LdbIterator<Item = (Vec<u8>, Vec<u8>)>>>,
        cmp: Arc<Box<dyn Cmp>>,
    ) -> MergingIter {
        MergingIter {
            iters,
            current: None,
            direction: Direction::Forward,
            cmp,
        }
    }

    /// Re-synchronizes every other child iterator to sit just after (Forward) or just before
    /// (Reverse) the currently exposed key, when the scan direction flips. Required because a
    /// child not currently selected as `current` may be sitting anywhere relative to the key we
    /// just yielded.
    fn update_direction(&mut self, d: Direction) {
        let current = match self.current {
            Some(ix) => ix,
            None => return,
        };
        let key = match self.iters[current].current() {
            Some((k, _)) => k,
            None => return,
        };

        match (d, self.direction) {
            (Direction::Forward, Direction::Reverse) => {
                self.direction = Direction::Forward;
                for i in 0..self.iters.len() {
                    if i == current {
                        continue;
                    }
                    self.iters[i].seek(&key);
                    if let Some((k, _)) = self.iters[i].current() {
                        if self.cmp.cmp(&k, &key) == Ordering::Equal {
                            self.iters[i].next();
                        }
                    }
                }
            }
            (Direction::Reverse, Direction::Forward) => {
                self.direction = Direction::Reverse;
                for i in 0..self.iters.len() {
                    if i == current {
                        continue;
                    }
                    self.iters[i].seek(&key);
                    self.iters[i].prev();
                }
            }
            _ => {}
        }
    }

    fn find_smallest(&mut self) {
        self.find(SmallestOrLargest::Smallest);
    }

    fn find_largest(&mut self) {
        self.find(SmallestOrLargest::Largest);
    }

    fn find(&mut self, which: SmallestOrLargest) {
        let ord = if which == SmallestOrLargest::Smallest {
            Ordering::Less
        } else {
            Ordering::Greater
        };

        let mut best: Option<usize> = None;
        for i in 0..self.iters.len() {
            if let Some((key, _)) = self.iters[i].current() {
                best = match best {
                    None => Some(i),
                    Some(b) => {
                        let bkey = self.iters[b].current().unwrap().0;
                        if self.cmp.cmp(&key, &bkey) == ord {
                            Some(i)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
        }
        self.current = best;
    }
}

impl Iterator for MergingIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(current) = self.current {
            self.update_direction(Direction::Forward);
            self.iters[current].next();
            self.find_smallest();
        } else {
            for it in self.iters.iter_mut() {
                it.next();
            }
            self.find_smallest();
        }

        self.current.and_then(|ix| self.iters[ix].current())
    }
}

impl LdbIterator for MergingIter {
    fn valid(&self) -> bool {
        self.current.is_some() && self.iters.iter().any(|it| it.valid())
    }

    fn seek(&mut self, key: &[u8]) {
        for it in self.iters.iter_mut() {
            it.seek(key);
        }
        self.direction = Direction::Forward;
        self.find_smallest();
    }

    fn reset(&mut self) {
        for it in self.iters.iter_mut() {
            it.reset();
        }
        self.current = None;
        self.direction = Direction::Forward;
    }

    fn current(&self) -> Option<Self::Item> {
        self.current.and_then(|ix| self.iters[ix].current())
    }

    fn prev(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        if self.current().is_none() {
            return None;
        }
        self.update_direction(Direction::Reverse);
        self.iters[current].prev();
        self.find_largest();
        self.current()
    }

    fn status(&self) -> Result<()> {
        for it in &self.iters {
            it.status()?;
        }
        Ok(())
    }

    fn seek_to_last(&mut self) -> Option<Self::Item> {
        for it in self.iters.iter_mut() {
            it.seek_to_last();
        }
        self.direction = Direction::Reverse;
        self.find_largest();
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmp::DefaultCmp;
    use crate::test_util::TestLdbIter;

    fn cmp() -> Arc<Box<dyn Cmp>> {
        Arc::new(Box::new(DefaultCmp))
    }

    fn b(s: &'static str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn test_merging_real() {
        let val = b("def");
        let it1 = TestLdbIter::new(vec![
            (b("aba"), val.clone()),
            (b("abc"), val.clone()),
            (b("abe"), val.clone()),
        ]);
        let it2 = TestLdbIter::new(vec![(b("abb"), val.clone()), (b("abd"), val.clone())]);
        let expected = vec![b("aba"), b("abb"), b("abc"), b("abd"), b("abe")];

        let iter = MergingIter::new(vec![Box::new(it1), Box::new(it2)], cmp());

        for (i, (k, _)) in iter.enumerate() {
            assert_eq!(k, expected[i]);
        }
    }

    #[test]
    fn test_merging_seek_reset() {
        let val = b("def");
        let it1 = TestLdbIter::new(vec![
            (b("aba"), val.clone()),
            (b("abc"), val.clone()),
            (b("abe"), val.clone()),
        ]);
        let it2 = TestLdbIter::new(vec![(b("abb"), val.clone()), (b("abd"), val.clone())]);

        let mut iter = MergingIter::new(vec![Box::new(it1), Box::new(it2)], cmp());

        assert!(!iter.valid());
        iter.next();
        assert!(iter.valid());
        assert!(iter.current().is_some());

        iter.seek(b"abc");
        assert_eq!(iter.current(), Some((b("abc"), val.clone())));
        iter.seek(b"ab0");
        assert_eq!(iter.current(), Some((b("aba"), val.clone())));
        iter.seek(b"abx");
        assert_eq!(iter.current(), None);

        iter.reset();
        assert!(!iter.valid());
        iter.next();
        assert_eq!(iter.current(), Some((b("aba"), val)));
    }

    #[test]
    fn test_merging_fwd_bwd() {
        let val = b("def");
        let it1 = TestLdbIter::new(vec![
            (b("aba"), val.clone()),
            (b("abc"), val.clone()),
            (b("abe"), val.clone()),
        ]);
        let it2 = TestLdbIter::new(vec![(b("abb"), val.clone()), (b("abd"), val)]);

        let mut iter = MergingIter::new(vec![Box::new(it1), Box::new(it2)], cmp());

        let first = iter.next();
        iter.next();
        let third = iter.next();
        assert_ne!(first, third);

        let second = iter.prev();
        assert_eq!(first, second);
    }
}
