#![allow(dead_code)]

mod block;
mod blockhandle;
mod cmp;
mod db_iter;
mod disk_env;
mod env;
mod error;
#[macro_use]
mod infolog;
mod key_types;
mod log;
mod merging_iter;
mod options;
mod table_block;
mod table_builder;
mod table_reader;
mod types;

#[cfg(test)]
mod test_util;

pub use block::{Block, BlockBuilder, BlockIter};
pub use blockhandle::BlockHandle;
pub use cmp::{Cmp, DefaultCmp, InternalKeyCmp};
pub use db_iter::DBIter;
pub use env::{Env, RandomAccess};
pub use error::{Result, Status, StatusCode};
pub use key_types::{LookupKey, UserKey};
pub use merging_iter::MergingIter;
pub use options::{CompressionType, Options, ReadOptions, WriteOptions};
pub use table_builder::TableBuilder;
pub use table_reader::{Table, TableIterator};
pub use types::{LdbIterator, SequenceNumber, ValueType};
