//! Huffman coding of byte streams into a self-describing file.
//!
//! ```
//! let packed = huffpack::compress_bytes(b"abracadabra")?;
//! assert!(packed.starts_with(b"(a.0)"));
//! assert_eq!(huffpack::decompress_bytes(&packed)?, b"abracadabra");
//! # Ok::<(), huffpack::HuffError>(())
//! ```

pub mod bitio;
pub mod codec;
pub mod encoding;
pub mod error;
pub mod frequency;
pub mod header;
pub mod report;
pub mod tree;

pub use codec::{
    CompressStats, DecompressStats, Inspection, compress, compress_bytes, decompress,
    decompress_bytes, inspect,
};
pub use encoding::EncodingMap;
pub use error::{HuffError, Result};
pub use frequency::FrequencyTable;
pub use tree::{Node, build_tree};
