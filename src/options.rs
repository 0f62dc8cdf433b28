use std::sync::Arc;

use crate::cmp::{Cmp, DefaultCmp};
use crate::env::Env;
use crate::types::SequenceNumber;

/// Compression applied to a data block before it is written to a table, recorded per-block in
/// its trailer so the reader knows how to invert it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Snappy = 1,
}

impl CompressionType {
    pub fn from_u8(b: u8) -> Option<CompressionType> {
        match b {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Snappy),
            _ => None,
        }
    }
}

/// Options shared by readers (`Table`) and the ambient collaborators built on top of them. Not
/// generic over the comparator: `Cmp` is a trait object so that a `Table` opened with one
/// comparator can be passed around, boxed, without infecting every call site with a type
/// parameter.
#[derive(Clone)]
pub struct Options {
    pub cmp: Arc<Box<dyn Cmp>>,
    pub env: Arc<Box<dyn Env>>,
    pub create_if_missing: bool,
    pub error_if_exists: bool,
    pub paranoid_checks: bool,
    pub write_buffer_size: usize,
    pub max_open_files: usize,
    pub block_size: usize,
    pub block_restart_interval: usize,
    pub compression_type: CompressionType,
    pub reuse_logs: bool,
}

impl Options {
    pub fn with_env(env: Arc<Box<dyn Env>>) -> Options {
        Options {
            env,
            ..Options::default()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cmp: Arc::new(Box::new(DefaultCmp)),
            env: Arc::new(Box::new(crate::disk_env::PosixDiskEnv::new())),
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: 4 << 20,
            max_open_files: 1 << 10,
            block_size: 4 << 10,
            block_restart_interval: 16,
            compression_type: CompressionType::None,
            reuse_logs: false,
        }
    }
}

/// Supplied to read operations (`Table::internal_get`, block reads, iterator construction).
#[derive(Clone)]
pub struct ReadOptions {
    pub verify_checksums: bool,
    pub fill_cache: bool,
    pub snapshot: Option<SequenceNumber>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

/// Supplied to write operations.
#[derive(Clone, Copy, Default)]
pub struct WriteOptions {
    pub sync: bool,
}
