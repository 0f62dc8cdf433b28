use crc::{crc32, Hasher32};
use integer_encoding::FixedInt;
use snap::raw::Decoder;

use crate::{
    block::Block,
    blockhandle::BlockHandle,
    env::RandomAccess,
    error::{err, StatusCode},
    error::Result,
    options::{CompressionType, Options, ReadOptions},
    table_builder,
};

/// Reads the raw bytes for `location` from a random-access source.
fn read_bytes(f: &dyn RandomAccess, location: &BlockHandle) -> Result<Vec<u8>> {
    let mut buf = vec![0; location.size()];
    let n = f.read_at(location.offset(), &mut buf)?;
    if n != buf.len() {
        return err(StatusCode::IOError, "short read while fetching block");
    }
    Ok(buf)
}

/// Reads a table block from a random-access source.
///
/// A table block consists of `[bytes..., compress(1B), checksum(4B)]`; the handle only refers to
/// the location and length of `bytes...`. The checksum covers the compressed payload plus the
/// compression-type byte, masked per the on-disk CRC convention. Verification only runs when
/// `options.verify_checksums` is set -- callers that don't need it (or that already trust the
/// source) skip the cost, matching `Options::paranoid_checks`/`ReadOptions::verify_checksums`.
pub fn read_table_block(
    opt: Options,
    ro: &ReadOptions,
    f: &dyn RandomAccess,
    location: &BlockHandle,
) -> Result<Block> {
    let buf = read_bytes(f, location)?;
    let trailer = read_bytes(
        f,
        &BlockHandle::new(
            location.offset() + location.size(),
            table_builder::TABLE_BLOCK_COMPRESS_LEN + table_builder::TABLE_BLOCK_CKSUM_LEN,
        ),
    )?;
    let compress = trailer[0];

    if ro.verify_checksums {
        let want = crate::log::unmask_crc(u32::decode_fixed(&trailer[1..5]));
        if !verify_table_block(&buf, compress, want) {
            return err(
                StatusCode::Corruption,
                &format!(
                    "checksum verification failed for block at {}",
                    location.offset()
                ),
            );
        }
    }

    match CompressionType::from_u8(compress) {
        Some(CompressionType::None) => Ok(Block::new(opt, buf)),
        Some(CompressionType::Snappy) => {
            let decoded = Decoder::new()
                .decompress_vec(&buf)
                .map_err(|e| crate::error::Status::new(StatusCode::CompressionError, &e.to_string()))?;
            Ok(Block::new(opt, decoded))
        }
        None => err(StatusCode::InvalidData, "invalid compression type"),
    }
}

fn verify_table_block(data: &[u8], compression: u8, want: u32) -> bool {
    let mut digest = crc32::Digest::new(crc32::CASTAGNOLI);
    digest.write(data);
    digest.write(&[compression]);
    digest.sum32() == want
}
