//! Table tuning options.
//!
//! Options are accepted at open time and by [`Table::optimize`], persisted in
//! the table's metadata keyspace and restored on reopen.
//!
//! | Option | Effect on the sled backend |
//! |--------|----------------------------|
//! | `compression` | any value other than `None` enables zstd page compression; fixed once the table exists |
//! | `mmap_size`, `leaf_cache`, `node_cache` | summed into the page cache capacity |
//! | `large` | switches sled to high-throughput mode |
//! | `record_cache` | capacity of the decoded-row LRU cache (0 disables it) |
//! | `bucket_count`, `record_alignment`, `free_block_pool` | recorded verbatim |
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{Compression, TableOptions};
//!
//! let options = TableOptions::default()
//!     .with_compression(Compression::Deflate)
//!     .with_record_cache(1024);
//! assert!(options.compression.is_compressed());
//! ```
//!
//! [`Table::optimize`]: crate::Table::optimize

use serde::{Deserialize, Serialize};

/// Page compression requested for the table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Compression {
    #[default]
    None,
    Deflate,
    Bzip,
    /// Compact binary-safe encoding.
    Tcbs,
    /// Externally supplied codec.
    ExCodec,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Deflate => write!(f, "deflate"),
            Self::Bzip => write!(f, "bzip"),
            Self::Tcbs => write!(f, "tcbs"),
            Self::ExCodec => write!(f, "excodec"),
        }
    }
}

impl Compression {
    pub const ALL: &'static [Compression] = &[
        Compression::None,
        Compression::Deflate,
        Compression::Bzip,
        Compression::Tcbs,
        Compression::ExCodec,
    ];

    pub fn is_compressed(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// How a table handle is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Existing table only; every mutation fails with `ReadOnly`.
    Read,
    /// Creates the table when missing.
    #[default]
    Write,
}

/// 기본 페이지 캐시 (sled 기본값과 동일)
const DEFAULT_PAGE_CACHE: u64 = 1024 * 1024 * 1024;

/// Tuning knobs for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Allow the table to grow past 2 GiB.
    pub large: bool,
    pub compression: Compression,
    /// Expected number of rows (hash bucket count).
    pub bucket_count: Option<u64>,
    /// Record alignment as a power of two.
    pub record_alignment: Option<u8>,
    /// Free block pool size as a power of two.
    pub free_block_pool: Option<u8>,
    /// Memory-mapped region size in bytes.
    pub mmap_size: Option<u64>,
    /// Number of decoded rows kept in memory.
    pub record_cache: usize,
    pub leaf_cache: Option<usize>,
    pub node_cache: Option<usize>,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            large: false,
            compression: Compression::None,
            bucket_count: None,
            record_alignment: None,
            free_block_pool: None,
            mmap_size: None,
            record_cache: 0,
            leaf_cache: None,
            node_cache: None,
        }
    }
}

impl TableOptions {
    pub fn with_large(mut self, large: bool) -> Self {
        self.large = large;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_bucket_count(mut self, bnum: u64) -> Self {
        self.bucket_count = Some(bnum);
        self
    }

    pub fn with_record_alignment(mut self, apow: u8) -> Self {
        self.record_alignment = Some(apow);
        self
    }

    pub fn with_free_block_pool(mut self, fpow: u8) -> Self {
        self.free_block_pool = Some(fpow);
        self
    }

    pub fn with_mmap_size(mut self, bytes: u64) -> Self {
        self.mmap_size = Some(bytes);
        self
    }

    pub fn with_record_cache(mut self, rows: usize) -> Self {
        self.record_cache = rows;
        self
    }

    pub fn with_leaf_cache(mut self, pages: usize) -> Self {
        self.leaf_cache = Some(pages);
        self
    }

    pub fn with_node_cache(mut self, pages: usize) -> Self {
        self.node_cache = Some(pages);
        self
    }

    /// Page cache capacity handed to the Store, in bytes.
    pub fn page_cache_capacity(&self) -> u64 {
        const PAGE: u64 = 4096;
        let mut bytes = self.mmap_size.unwrap_or(0);
        bytes += self.leaf_cache.unwrap_or(0) as u64 * PAGE;
        bytes += self.node_cache.unwrap_or(0) as u64 * PAGE;
        if bytes == 0 { DEFAULT_PAGE_CACHE } else { bytes }
    }
}
