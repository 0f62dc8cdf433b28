use crc::{crc32, Hasher32};
use integer_encoding::FixedInt;
use std::{cmp::Ordering, io::Write, sync::Arc};

use crate::{
    block::{BlockBuilder, BlockContents},
    blockhandle::BlockHandle,
    cmp::InternalKeyCmp,
    key_types::InternalKey,
    options::{CompressionType, Options},
};

pub const FOOTER_LENGTH: usize = 40;
pub const FULL_FOOTER_LENGTH: usize = FOOTER_LENGTH + 8;
pub const MAGIC_FOOTER_NUMBER: u64 = 0xdb4775248b80fb57;
pub const MAGIC_FOOTER_ENCODED: [u8; 8] = [0x57, 0xfb, 0x80, 0x8b, 0x24, 0x75, 0x47, 0xdb];

pub const TABLE_BLOCK_COMPRESS_LEN: usize = 1;
pub const TABLE_BLOCK_CKSUM_LEN: usize = 4;

/// Footer is a helper for encoding/decoding a table footer.
#[derive(Debug, Clone)]
pub struct Footer {
    pub meta_index: BlockHandle,
    pub index: BlockHandle,
}

/// A table footer contains a pointer to the metaindex block, another pointer to the index block,
/// padding to `FOOTER_LENGTH` bytes and a trailing magic number:
/// `[ metaindex handle, index handle, padding ] = 40 bytes, MAGIC_FOOTER_ENCODED`.
impl Footer {
    pub fn new(metaix: BlockHandle, index: BlockHandle) -> Footer {
        Footer {
            meta_index: metaix,
            index,
        }
    }

    pub fn decode(from: &[u8]) -> Result<Footer, crate::error::Status> {
        use crate::error::{err, StatusCode};
        if from.len() < FULL_FOOTER_LENGTH {
            return err(StatusCode::Corruption, "footer too short");
        }
        if from[FOOTER_LENGTH..FULL_FOOTER_LENGTH] != MAGIC_FOOTER_ENCODED {
            return err(StatusCode::Corruption, "not an sstable (bad magic number)");
        }
        let (meta, metalen) = BlockHandle::decode(&from[0..FOOTER_LENGTH]);
        let (ix, _) = BlockHandle::decode(&from[metalen..FOOTER_LENGTH]);

        Ok(Footer {
            meta_index: meta,
            index: ix,
        })
    }

    pub fn encode(&self, to: &mut [u8]) {
        assert!(to.len() >= FULL_FOOTER_LENGTH);

        let s1 = self.meta_index.encode_to(to);
        let s2 = self.index.encode_to(&mut to[s1..]);

        for item in to.iter_mut().take(FOOTER_LENGTH).skip(s1 + s2) {
            *item = 0;
        }
        to[FOOTER_LENGTH..FULL_FOOTER_LENGTH].copy_from_slice(&MAGIC_FOOTER_ENCODED);
    }
}

/// A table consists of DATA BLOCKS, a METAINDEX BLOCK, an INDEX BLOCK and a FOOTER, in that order.
/// Data and index blocks are built using `block::BlockBuilder`.
pub struct TableBuilder<Dst: Write> {
    opt: Options,
    dst: Dst,

    offset: usize,
    num_entries: usize,
    prev_block_last_key: Vec<u8>,

    data_block: Option<BlockBuilder>,
    index_block: Option<BlockBuilder>,
}

impl<Dst: Write> TableBuilder<Dst> {
    /// Creates a builder using the comparator in `opt` directly (no InternalKeyCmp wrapping) --
    /// used for tables over plain user keys.
    pub fn new_raw(opt: Options, dst: Dst) -> TableBuilder<Dst> {
        TableBuilder {
            opt: opt.clone(),
            dst,
            offset: 0,
            prev_block_last_key: vec![],
            num_entries: 0,
            data_block: Some(BlockBuilder::new(opt.clone())),
            index_block: Some(BlockBuilder::new(opt)),
        }
    }

    /// Creates a builder for a table of internal keys: wraps `opt.cmp` in an `InternalKeyCmp` so
    /// separator keys compare the way the reader will compare them.
    pub fn new(mut opt: Options, dst: Dst) -> TableBuilder<Dst> {
        opt.cmp = Arc::new(Box::new(InternalKeyCmp(opt.cmp.clone())));
        TableBuilder::new_raw(opt, dst)
    }

    pub fn entries(&self) -> usize {
        self.num_entries
    }

    /// Adds a key to the table. The key must be lexically greater than the last one added.
    pub fn add(&mut self, key: InternalKey, val: &[u8]) {
        assert!(self.data_block.is_some());

        if !self.prev_block_last_key.is_empty() {
            assert!(self.opt.cmp.cmp(&self.prev_block_last_key, key) == Ordering::Less);
        }

        if self.data_block.as_ref().unwrap().size_estimate() > self.opt.block_size {
            self.write_data_block(key);
        }

        let dblock = self.data_block.as_mut().unwrap();
        self.num_entries += 1;
        dblock.add(key, val);
    }

    fn write_data_block(&mut self, next_key: InternalKey) {
        assert!(self.data_block.is_some());

        let block = self.data_block.take().unwrap();
        let sep = self.opt.cmp.find_shortest_sep(block.last_key(), next_key);
        self.prev_block_last_key = Vec::from(block.last_key());
        let contents = block.finish();

        let handle = BlockHandle::new(self.offset, contents.len());
        let mut handle_enc = [0u8; 16];
        let enc_len = handle.encode_to(&mut handle_enc);

        self.index_block
            .as_mut()
            .unwrap()
            .add(&sep, &handle_enc[0..enc_len]);
        self.data_block = Some(BlockBuilder::new(self.opt.clone()));

        let ctype = self.opt.compression_type;
        self.write_block(contents, ctype);
    }

    fn write_block(&mut self, block: BlockContents, t: CompressionType) -> BlockHandle {
        assert_eq!(t, CompressionType::None, "compression not yet supported on write path");

        let mut buf = [0u8; 4];
        let mut digest = crc32::Digest::new(crc32::CASTAGNOLI);

        digest.write(&block);
        digest.write(&[t as u8]);
        crate::log::mask_crc(digest.sum32()).encode_fixed(&mut buf);

        let _ = self.dst.write(&block);
        let _ = self.dst.write(&[t as u8]);
        let _ = self.dst.write(&buf);

        let handle = BlockHandle::new(self.offset, block.len());
        self.offset += block.len() + TABLE_BLOCK_COMPRESS_LEN + TABLE_BLOCK_CKSUM_LEN;

        handle
    }

    /// Finishes the table: flushes any pending data block, writes an (empty) metaindex block,
    /// the index block, and the footer.
    pub fn finish(mut self) {
        assert!(self.data_block.is_some());
        let ctype = self.opt.compression_type;

        if self.data_block.as_ref().unwrap().entries() > 0 {
            let key_past_last = self
                .opt
                .cmp
                .find_short_succ(self.data_block.as_ref().unwrap().last_key());
            self.write_data_block(&key_past_last);
        }

        let meta_ix_block = BlockBuilder::new(self.opt.clone());
        let meta_ix = meta_ix_block.finish();
        let meta_ix_handle = self.write_block(meta_ix, ctype);

        let index_cont = self.index_block.take().unwrap().finish();
        let ix_handle = self.write_block(index_cont, ctype);

        let footer = Footer::new(meta_ix_handle, ix_handle);
        let mut buf = [0; FULL_FOOTER_LENGTH];
        footer.encode(&mut buf);

        self.offset += self.dst.write(&buf[..]).unwrap();
    }
}
