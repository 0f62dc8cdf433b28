use std::cmp::Ordering;
use std::sync::Arc;

use integer_encoding::{FixedInt, VarInt};

use crate::cmp::Cmp;
use crate::error::Result;
use crate::options::Options;
use crate::types::LdbIterator;

pub type BlockContents = Vec<u8>;

const FOOTER_SIZE: usize = 4;

/// A block is a list of ENTRIES followed by a list of RESTARTS, terminated by a fixed u32
/// N_RESTARTS.
///
/// An ENTRY consists of three varints, SHARED, NON_SHARED, VALSIZE, a KEY and a VALUE.
///
/// SHARED denotes how many bytes the entry's key shares with the previous one.
///
/// NON_SHARED is the size of the key minus SHARED.
///
/// VALSIZE is the size of the value.
///
/// KEY and VALUE are byte strings; the length of KEY is NON_SHARED.
///
/// A RESTART is a fixed u32 pointing to the beginning of an ENTRY. Every
/// `block_restart_interval`-th entry resets the SHARED prefix to 0 and gets a restart point, so a
/// seek can binary-search the restarts before falling back to a linear scan.
#[derive(Clone)]
pub struct Block {
    data: Arc<Vec<u8>>,
    restarts_off: usize,
    cmp: Arc<Box<dyn Cmp>>,
}

impl Block {
    pub fn new(opt: Options, contents: BlockContents) -> Block {
        assert!(contents.len() > FOOTER_SIZE);
        let restarts = u32::decode_fixed(&contents[contents.len() - FOOTER_SIZE..])
            .expect("corrupt block: truncated restart count") as usize;
        let restarts_off = contents.len() - FOOTER_SIZE - 4 * restarts;

        Block {
            data: Arc::new(contents),
            restarts_off,
            cmp: opt.cmp,
        }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    pub fn iter(&self) -> BlockIter {
        let num_restarts =
            (self.data.len() - FOOTER_SIZE - self.restarts_off) / 4;
        BlockIter {
            data: self.data.clone(),
            cmp: self.cmp.clone(),
            restarts_off: self.restarts_off,
            num_restarts,
            current_restart_ix: 0,
            offset: 0,
            next_offset: 0,
            key: Vec::new(),
            val_offset: 0,
            val_len: 0,
            valid: false,
        }
    }
}

/// Reads a restart-compressed block. Unlike a plain `std::iter::Iterator`, callers can `seek` and
/// walk `prev`; the underlying buffer is reference-counted so the iterator owns a cheap handle to
/// it rather than borrowing from the `Block` that created it.
pub struct BlockIter {
    data: Arc<Vec<u8>>,
    cmp: Arc<Box<dyn Cmp>>,
    restarts_off: usize,
    num_restarts: usize,

    current_restart_ix: usize,
    /// Offset of the current entry's SHARED varint.
    offset: usize,
    /// Offset just past the current entry (start of the next one, or `restarts_off`).
    next_offset: usize,
    key: Vec<u8>,
    val_offset: usize,
    val_len: usize,
    valid: bool,
}

impl BlockIter {
    fn restart_point(&self, ix: usize) -> usize {
        let off = self.restarts_off + 4 * ix;
        u32::decode_fixed(&self.data[off..off + 4]).unwrap() as usize
    }

    /// Decodes the entry at `offset`, given the key accumulated so far (`self.key`, used to apply
    /// the SHARED prefix). Returns `(next_offset, key, val_offset, val_len)`, or `None` if
    /// `offset` is at or past the restart trailer.
    fn parse_entry(&self, offset: usize, prev_key: &[u8]) -> Option<(usize, Vec<u8>, usize, usize)> {
        if offset >= self.restarts_off {
            return None;
        }
        let buf = &self.data[offset..self.restarts_off];
        let (shared, n1) = usize::decode_var(buf)?;
        let (non_shared, n2) = usize::decode_var(&buf[n1..])?;
        let (val_len, n3) = usize::decode_var(&buf[n1 + n2..])?;

        let header_len = n1 + n2 + n3;
        let mut key = Vec::with_capacity(shared + non_shared);
        key.extend_from_slice(&prev_key[..shared]);
        key.extend_from_slice(&buf[header_len..header_len + non_shared]);

        let val_offset = offset + header_len + non_shared;
        let next_offset = val_offset + val_len;
        Some((next_offset, key, val_offset, val_len))
    }

    fn seek_to_restart_point(&mut self, ix: usize) {
        let off = self.restart_point(ix);
        self.current_restart_ix = ix;
        self.key.clear();
        self.offset = off;
        self.next_offset = off;
        self.valid = false;
    }

    fn parse_next(&mut self) -> bool {
        let prev_key = std::mem::take(&mut self.key);
        match self.parse_entry(self.next_offset, &prev_key) {
            Some((next_offset, key, val_offset, val_len)) => {
                self.offset = self.next_offset;
                self.next_offset = next_offset;
                self.key = key;
                self.val_offset = val_offset;
                self.val_len = val_len;
                self.valid = true;
                true
            }
            None => {
                self.key = prev_key;
                self.valid = false;
                false
            }
        }
    }

    fn current_value(&self) -> Vec<u8> {
        self.data[self.val_offset..self.val_offset + self.val_len].to_vec()
    }

    pub fn seek_to_first(&mut self) {
        self.seek_to_restart_point(0);
        self.parse_next();
    }

    /// The "status" of a `BlockIter` is always `Ok`: the only way a block can fail to decode is at
    /// construction (truncated/corrupt restart count), which is surfaced by `Block::new` instead.
    pub fn status(&self) -> Result<()> {
        Ok(())
    }
}

impl Iterator for BlockIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.parse_next() {
            return None;
        }
        while self.current_restart_ix + 1 < self.num_restarts
            && self.restart_point(self.current_restart_ix + 1) <= self.offset
        {
            self.current_restart_ix += 1;
        }
        self.current()
    }
}

impl LdbIterator for BlockIter {
    fn seek(&mut self, target: &[u8]) {
        // Binary search the restart points for the last one whose key is <= target.
        let (mut lo, mut hi) = (0usize, self.num_restarts - 1);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            let off = self.restart_point(mid);
            let (_, key, _, _) = self.parse_entry(off, &[]).expect("corrupt block: bad restart");
            if self.cmp.cmp(&key, target) == Ordering::Less {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        self.seek_to_restart_point(lo);
        loop {
            if !self.parse_next() {
                break;
            }
            if self.cmp.cmp(&self.key, target) != Ordering::Less {
                break;
            }
            if self.next_offset >= self.restarts_off {
                self.valid = false;
                break;
            }
        }
        while self.current_restart_ix + 1 < self.num_restarts
            && self.restart_point(self.current_restart_ix + 1) <= self.offset
        {
            self.current_restart_ix += 1;
        }
    }

    fn reset(&mut self) {
        self.current_restart_ix = 0;
        self.offset = 0;
        self.next_offset = 0;
        self.key.clear();
        self.val_offset = 0;
        self.val_len = 0;
        self.valid = false;
    }

    fn valid(&self) -> bool {
        self.valid
    }

    fn current(&self) -> Option<Self::Item> {
        if self.valid {
            Some((self.key.clone(), self.current_value()))
        } else {
            None
        }
    }

    fn prev(&mut self) -> Option<Self::Item> {
        let original = self.offset;
        if !self.valid && self.next_offset == 0 {
            return None;
        }

        while self.restart_point(self.current_restart_ix) >= original {
            if self.current_restart_ix == 0 {
                self.valid = false;
                return None;
            }
            self.current_restart_ix -= 1;
        }

        self.seek_to_restart_point(self.current_restart_ix);
        loop {
            if !self.parse_next() {
                break;
            }
            if self.next_offset >= original {
                break;
            }
        }
        self.current()
    }

    fn seek_to_last(&mut self) -> Option<Self::Item> {
        self.seek_to_restart_point(self.num_restarts - 1);
        while self.parse_next() && self.next_offset < self.restarts_off {}
        self.current()
    }
}

/// Builds a `Block`'s byte representation incrementally: entries must be added in ascending key
/// order, and every `block_restart_interval`-th entry is stored without prefix compression so
/// seeks can binary-search restarts before scanning.
pub struct BlockBuilder {
    opt: Options,
    buffer: Vec<u8>,
    restarts: Vec<u32>,
    counter: usize,
    last_key: Vec<u8>,
    num_entries: usize,
}

impl BlockBuilder {
    pub fn new(opt: Options) -> BlockBuilder {
        BlockBuilder {
            opt,
            buffer: Vec::new(),
            restarts: vec![0],
            counter: 0,
            last_key: Vec::new(),
            num_entries: 0,
        }
    }

    pub fn entries(&self) -> usize {
        self.num_entries
    }

    pub fn last_key(&self) -> &[u8] {
        &self.last_key
    }

    pub fn size_estimate(&self) -> usize {
        self.buffer.len() + 4 * self.restarts.len() + 4
    }

    pub fn add(&mut self, key: &[u8], value: &[u8]) {
        assert!(self.counter <= self.opt.block_restart_interval);
        assert!(
            self.buffer.is_empty()
                || self.opt.cmp.cmp(&self.last_key, key) == Ordering::Less
        );

        let shared = if self.counter >= self.opt.block_restart_interval {
            self.restarts.push(self.buffer.len() as u32);
            self.counter = 0;
            0
        } else {
            let min = self.last_key.len().min(key.len());
            let mut n = 0;
            while n < min && self.last_key[n] == key[n] {
                n += 1;
            }
            n
        };

        let non_shared = key.len() - shared;

        let mut header = [0u8; 3 * 10];
        let mut i = 0;
        i += shared.encode_var(&mut header[i..]);
        i += non_shared.encode_var(&mut header[i..]);
        i += value.len().encode_var(&mut header[i..]);

        self.buffer.extend_from_slice(&header[..i]);
        self.buffer.extend_from_slice(&key[shared..]);
        self.buffer.extend_from_slice(value);

        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        self.counter += 1;
        self.num_entries += 1;
    }

    pub fn finish(mut self) -> BlockContents {
        for r in &self.restarts {
            self.buffer.extend_from_slice(&r.encode_fixed_vec());
        }
        self.buffer
            .extend_from_slice(&(self.restarts.len() as u32).encode_fixed_vec());
        self.buffer
    }
}

trait EncodeFixedVec {
    fn encode_fixed_vec(&self) -> Vec<u8>;
}

impl EncodeFixedVec for u32 {
    fn encode_fixed_vec(&self) -> Vec<u8> {
        let mut buf = [0u8; 4];
        self.encode_fixed(&mut buf);
        buf.to_vec()
    }
}
