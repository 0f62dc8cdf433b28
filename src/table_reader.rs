use std::cmp::Ordering;
use std::sync::Arc;

use crate::{
    block::{Block, BlockIter},
    blockhandle::BlockHandle,
    cmp::InternalKeyCmp,
    env::RandomAccess,
    error::{err, Result, Status, StatusCode},
    key_types::InternalKey,
    options::{Options, ReadOptions},
    table_block::read_table_block,
    table_builder::{self, Footer},
    types::LdbIterator,
};

fn read_footer(f: &dyn RandomAccess, size: usize) -> Result<Footer> {
    let mut buf = [0u8; table_builder::FULL_FOOTER_LENGTH];
    let off = size - table_builder::FULL_FOOTER_LENGTH;
    let n = f.read_at(off, &mut buf)?;
    if n != buf.len() {
        return err(StatusCode::IOError, "short read of sstable footer");
    }
    Footer::decode(&buf)
}

/// The `ReadOptions` a `Table` reads its own index block and data blocks under absent an
/// explicit caller-supplied one: `verify_checksums` mirrors `Options::paranoid_checks`, per the
/// documented open contract.
fn default_read_options(opt: &Options) -> ReadOptions {
    ReadOptions {
        verify_checksums: opt.paranoid_checks,
        ..Default::default()
    }
}

/// A random-access reader over a single SSTable file: footer, index block (kept resident), and
/// the data blocks it addresses. Immutable after `open`; cheap to `clone` (the backing file and
/// comparator are reference-counted), and safe to share across threads -- each `TableIterator`
/// keeps its own cursor rather than mutating shared state.
#[derive(Clone)]
pub struct Table {
    file: Arc<dyn RandomAccess + Send + Sync>,
    file_size: usize,
    opt: Options,
    footer: Footer,
    index_block: Block,
}

impl Table {
    /// Opens a table over plain user keys (the comparator in `opt` is used as-is).
    pub fn new_raw(
        opt: Options,
        file: Arc<dyn RandomAccess + Send + Sync>,
        size: usize,
    ) -> Result<Table> {
        if size < table_builder::FULL_FOOTER_LENGTH {
            return err(StatusCode::Corruption, "file is too short to be an sstable");
        }

        let footer = read_footer(file.as_ref(), size)?;
        let ro = default_read_options(&opt);
        let index_block = read_table_block(opt.clone(), &ro, file.as_ref(), &footer.index)?;

        Ok(Table {
            file,
            file_size: size,
            opt,
            footer,
            index_block,
        })
    }

    /// Opens a table whose keys are internal keys: wraps `opt.cmp` in an `InternalKeyCmp` so the
    /// index block and point lookups order the same way the writer did.
    pub fn new(
        mut opt: Options,
        file: Arc<dyn RandomAccess + Send + Sync>,
        size: usize,
    ) -> Result<Table> {
        opt.cmp = Arc::new(Box::new(InternalKeyCmp(opt.cmp.clone())));
        Table::new_raw(opt, file, size)
    }

    pub fn file_size(&self) -> usize {
        self.file_size
    }

    fn open_data_block(&self, ro: &ReadOptions, handle_enc: &[u8]) -> Result<BlockIter> {
        let (handle, _) = BlockHandle::decode(handle_enc);
        read_table_block(self.opt.clone(), ro, self.file.as_ref(), &handle).map(|b| b.iter())
    }

    /// Point lookup. Seeks the index block to `k`, opens the data block the index entry points
    /// to, and invokes `cb` with the first entry `>= k` in that block -- *without* verifying that
    /// its user key actually matches `k`. That check is the caller's responsibility (the caller
    /// typically re-parses the internal key and compares); this mirrors the on-disk reader's
    /// original contract rather than adding a convenience filter here.
    pub fn internal_get<F: FnMut(&[u8], &[u8])>(
        &self,
        ro: &ReadOptions,
        k: InternalKey,
        mut cb: F,
    ) -> Result<()> {
        let mut index_iter = self.index_block.iter();
        index_iter.seek(k);

        if !index_iter.valid() {
            return index_iter.status();
        }
        let (_, handle_enc) = index_iter.current().unwrap();

        let mut data_iter = match self.open_data_block(ro, &handle_enc) {
            Ok(it) => it,
            Err(e) => return Err(e),
        };
        data_iter.seek(k);
        if data_iter.valid() {
            let (dk, dv) = data_iter.current().unwrap();
            cb(&dk, &dv);
        }

        data_iter.status()?;
        index_iter.status()
    }

    /// Returns the file offset that approximately bounds `key`: the offset of the data block
    /// that would contain it, or the metaindex handle's offset (near end-of-file) if `key` is
    /// past the last block.
    pub fn approx_offset_of(&self, key: &[u8]) -> usize {
        let mut iter = self.index_block.iter();
        iter.seek(key);

        if let Some((_, handle_enc)) = iter.current() {
            let (handle, _) = BlockHandle::decode(&handle_enc);
            return handle.offset();
        }

        self.footer.meta_index.offset()
    }

    pub fn iter(&self) -> TableIterator {
        TableIterator {
            read_options: default_read_options(&self.opt),
            table: self.clone(),
            index_iter: self.index_block.iter(),
            data_iter: None,
            init: false,
            err: None,
        }
    }
}

/// Either a live data-block cursor, or a stand-in for one that failed to open: permanently
/// invalid, carrying the error in `status()`.
enum DataIter {
    Block(BlockIter),
    Broken(Status),
}

impl DataIter {
    fn valid(&self) -> bool {
        matches!(self, DataIter::Block(b) if b.valid())
    }

    fn current(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            DataIter::Block(b) => b.current(),
            DataIter::Broken(_) => None,
        }
    }

    fn next(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            DataIter::Block(b) => b.next(),
            DataIter::Broken(_) => None,
        }
    }

    fn prev(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            DataIter::Block(b) => b.prev(),
            DataIter::Broken(_) => None,
        }
    }

    fn seek(&mut self, target: &[u8]) {
        if let DataIter::Block(b) = self {
            b.seek(target);
        }
    }

    fn seek_to_last(&mut self) -> Option<(Vec<u8>, Vec<u8>)> {
        match self {
            DataIter::Block(b) => b.seek_to_last(),
            DataIter::Broken(_) => None,
        }
    }

    fn status(&self) -> Result<()> {
        match self {
            DataIter::Block(b) => b.status(),
            DataIter::Broken(s) => Err(s.clone()),
        }
    }
}

/// A two-level iterator: the index block hints which data block holds a key, the data block
/// supplies the actual entries. This is the only iterator `Table` exposes for range scans.
pub struct TableIterator {
    table: Table,
    index_iter: BlockIter,
    data_iter: Option<DataIter>,
    /// Whether `data_iter` currently refers to a real (attempted) data block. Mirrors the
    /// upstream reader's own "pre-first-move" state: a fresh `TableIterator` is constructed
    /// `valid() == false` without having touched the index block yet.
    init: bool,
    err: Option<Status>,
    read_options: ReadOptions,
}

impl TableIterator {
    fn load_block(&mut self, handle_enc: &[u8]) -> bool {
        match self.table.open_data_block(&self.read_options, handle_enc) {
            Ok(it) => {
                self.data_iter = Some(DataIter::Block(it));
                true
            }
            Err(e) => {
                self.err.get_or_insert_with(|| e.clone());
                self.data_iter = Some(DataIter::Broken(e));
                false
            }
        }
    }

    fn skip_to_next_entry(&mut self) -> bool {
        if let Some((_, handle_enc)) = self.index_iter.next() {
            self.load_block(&handle_enc);
            true
        } else {
            false
        }
    }
}

impl Iterator for TableIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.init {
            let has_entry = self
                .data_iter
                .as_mut()
                .map(|d| d.next())
                .unwrap_or(None);
            if let Some(entry) = has_entry {
                Some(entry)
            } else if self.skip_to_next_entry() {
                self.next()
            } else {
                None
            }
        } else if self.skip_to_next_entry() {
            self.init = true;
            self.next()
        } else {
            None
        }
    }
}

impl LdbIterator for TableIterator {
    fn seek(&mut self, to: &[u8]) {
        self.index_iter.seek(to);

        if let Some((sep, handle_enc)) = self.index_iter.current() {
            if self.table.opt.cmp.cmp(to, &sep) != Ordering::Greater {
                self.load_block(&handle_enc);
                if let Some(d) = self.data_iter.as_mut() {
                    d.seek(to);
                }
                self.init = true;
                return;
            }
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.index_iter.reset();
        self.data_iter = None;
        self.init = false;
    }

    fn valid(&self) -> bool {
        self.init && self.data_iter.as_ref().is_some_and(DataIter::valid)
    }

    fn current(&self) -> Option<Self::Item> {
        if self.init {
            self.data_iter.as_ref().and_then(DataIter::current)
        } else {
            None
        }
    }

    fn prev(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.data_iter.as_mut().and_then(DataIter::prev) {
            return Some(entry);
        }

        if let Some((_, handle_enc)) = self.index_iter.prev() {
            if self.load_block(&handle_enc) {
                return self.data_iter.as_mut().and_then(DataIter::seek_to_last);
            }
            None
        } else {
            None
        }
    }

    fn status(&self) -> Result<()> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        if let Some(d) = &self.data_iter {
            d.status()?;
        }
        Ok(())
    }

    fn seek_to_last(&mut self) -> Option<Self::Item> {
        self.index_iter.reset();
        let last = self.index_iter.seek_to_last();
        self.init = true;
        match last {
            Some((_, handle_enc)) if self.load_block(&handle_enc) => {
                self.data_iter.as_mut().and_then(DataIter::seek_to_last)
            }
            _ => None,
        }
    }
}
