use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use tracing::{debug, warn};

use crate::bitio::{BitSink, BitSource, HuffReader, HuffWriter};
use crate::encoding::EncodingMap;
use crate::error::{HuffError, Result};
use crate::frequency::FrequencyTable;
use crate::header;
use crate::tree::{Node, build_tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressStats {
    pub input_bytes: u64,
    pub distinct_symbols: usize,
    pub header_len: usize,
    pub payload_bits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressStats {
    pub output_bytes: u64,
    pub distinct_symbols: usize,
    pub payload_bits: u64,
}

/// Writes `header`, then the code of every input byte, one bit at a time.
///
/// Input is consumed line by line; each line keeps its terminator exactly as read.
/// Returns the number of input bytes encoded.
pub fn encode_stream<R: BufRead, S: BitSink>(
    mut input: R,
    map: &EncodingMap,
    header: &str,
    out: &mut S,
) -> Result<u64> {
    out.write_header(header)?;

    let mut encoded = 0u64;
    let mut line = Vec::new();
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        for &byte in &line {
            let Some(code) = map.get(byte) else {
                warn!(byte, offset = encoded, "byte missing from encoding map");
                return Err(HuffError::UnencodableSymbol(byte));
            };
            for bit in code.bytes() {
                out.write_bit(bit == b'1')?;
            }
            encoded += 1;
        }
    }
    Ok(encoded)
}

/// Memoized reverse lookups over one encoding map, for the lifetime of one decode.
pub struct DecodeCache<'a> {
    map: &'a EncodingMap,
    valid: HashMap<String, bool>,
    symbols: HashMap<String, u8>,
}

impl<'a> DecodeCache<'a> {
    pub fn new(map: &'a EncodingMap) -> Self {
        Self {
            map,
            valid: HashMap::new(),
            symbols: HashMap::new(),
        }
    }

    /// Whether `bits` is exactly some symbol's complete code.
    pub fn is_valid(&mut self, bits: &str) -> bool {
        if let Some(&known) = self.valid.get(bits) {
            return known;
        }
        let valid = self.map.symbol_for(bits).is_some();
        self.valid.insert(bits.to_string(), valid);
        valid
    }

    pub fn symbol(&mut self, bits: &str) -> Option<u8> {
        if let Some(&symbol) = self.symbols.get(bits) {
            return Some(symbol);
        }
        let symbol = self.map.symbol_for(bits)?;
        self.symbols.insert(bits.to_string(), symbol);
        Some(symbol)
    }
}

/// Reads bits until the source is exhausted, emitting a byte each time the
/// accumulated bits form a complete code. Returns the number of bytes written.
pub fn decode_stream<S: BitSource, W: Write>(
    input: &mut S,
    map: &EncodingMap,
    output: W,
) -> Result<u64> {
    let longest = map.iter().map(|(_, code)| code.len()).max().unwrap_or(0);
    let mut cache = DecodeCache::new(map);
    let mut writer = BufWriter::new(output);
    let mut pending = String::with_capacity(longest);
    let mut written = 0u64;

    while let Some(bit) = input.read_bit()? {
        pending.push(if bit { '1' } else { '0' });
        if cache.is_valid(&pending) {
            if let Some(symbol) = cache.symbol(&pending) {
                writer.write_all(&[symbol])?;
                written += 1;
                pending.clear();
            }
        } else if pending.len() >= longest {
            return Err(HuffError::MalformedPayload(format!(
                "bits {pending} match no code"
            )));
        }
    }

    if !pending.is_empty() {
        return Err(HuffError::PrematureEndOfBits { pending });
    }
    writer.flush()?;
    Ok(written)
}

/// Compresses everything from the current position of `input` to its end.
///
/// The input is read twice, once to count and once to encode, so it is rewound
/// to where it started in between. Empty input is refused with `EmptyInput`
/// and nothing is written.
pub fn compress<R: Read + Seek, W: Write>(input: &mut R, output: W) -> Result<CompressStats> {
    let start = input.stream_position()?;
    let table = FrequencyTable::from_reader(&mut *input)?;
    if table.is_empty() {
        return Err(HuffError::EmptyInput);
    }

    let tree = build_tree(&table)?;
    let map = EncodingMap::from_tree(&tree);
    let header = header::flatten(&map);
    debug!(
        symbols = table.len(),
        bytes = table.total(),
        header_len = header.len(),
        "built code"
    );

    input.seek(SeekFrom::Start(start))?;
    let mut sink = HuffWriter::new(output);
    let input_bytes = encode_stream(BufReader::new(&mut *input), &map, &header, &mut sink)?;
    if input_bytes != table.total() {
        warn!(
            counted = table.total(),
            encoded = input_bytes,
            "input changed between passes"
        );
    }
    let payload_bits = sink.payload_bits();
    sink.finish()?;
    debug!(payload_bits, "compressed");

    Ok(CompressStats {
        input_bytes,
        distinct_symbols: table.len(),
        header_len: header.len(),
        payload_bits,
    })
}

pub fn decompress<R: Read, W: Write>(input: R, output: W) -> Result<DecompressStats> {
    let mut source = HuffReader::new(input);
    let header = source.read_header()?;
    let tree = header::reconstruct(&header)?;
    let map = EncodingMap::from_tree(&tree);
    debug!(symbols = map.len(), "read header");

    let output_bytes = decode_stream(&mut source, &map, output)?;
    let payload_bits = source.bits_read();
    debug!(output_bytes, payload_bits, "decompressed");
    Ok(DecompressStats {
        output_bytes,
        distinct_symbols: map.len(),
        payload_bits,
    })
}

pub fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    compress(&mut Cursor::new(data), &mut out)?;
    Ok(out)
}

pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decompress(data, &mut out)?;
    Ok(out)
}

/// Header and code table of a compressed file, without decoding the payload.
#[derive(Debug)]
pub struct Inspection {
    pub header: String,
    pub tree: Node,
    pub map: EncodingMap,
    pub payload_bits: u64,
}

impl Inspection {
    /// True when re-flattening the rebuilt code reproduces the stored header.
    pub fn header_is_canonical(&self) -> bool {
        header::flatten(&self.map) == self.header
    }
}

pub fn inspect<R: Read>(input: R) -> Result<Inspection> {
    let mut source = HuffReader::new(input);
    let header = source.read_header()?;
    let tree = header::reconstruct(&header)?;
    let map = EncodingMap::from_tree(&tree);
    // Counted, not decoded.
    while source.read_bit()?.is_some() {}
    let payload_bits = source.bits_read();
    Ok(Inspection {
        header,
        tree,
        map,
        payload_bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let packed = compress_bytes(data).unwrap();
        decompress_bytes(&packed).unwrap()
    }

    #[test]
    fn aaab_file_layout() {
        let packed = compress_bytes(b"aaab").unwrap();
        // a -> 1, b -> 0: payload 1110, padded, then trailer 4
        assert_eq!(packed, b"(a.1)(b.0)\n\xe0\x04".to_vec());
        assert_eq!(decompress_bytes(&packed).unwrap(), b"aaab");
    }

    #[test]
    fn three_way_tie_round_trips() {
        let packed = compress_bytes(b"abcabcabc").unwrap();
        assert!(packed.starts_with(b"(a.10)(b.11)(c.0)\n"));
        assert_eq!(decompress_bytes(&packed).unwrap(), b"abcabcabc");
    }

    #[test]
    fn single_symbol_round_trips() {
        let packed = compress_bytes(b"zzzzzzzzzz").unwrap();
        assert!(packed.starts_with(b"(z.0)\n"));
        assert_eq!(decompress_bytes(&packed).unwrap(), b"zzzzzzzzzz");
        assert_eq!(round_trip(b"\n"), b"\n");
    }

    #[test]
    fn empty_input_writes_nothing() {
        let mut out = Vec::new();
        let err = compress(&mut Cursor::new(Vec::<u8>::new()), &mut out).unwrap_err();
        assert!(matches!(err, HuffError::EmptyInput));
        assert!(out.is_empty());
    }

    #[test]
    fn lines_keep_their_terminators() {
        for text in [
            &b"no newline at all"[..],
            b"one\ntwo\nthree\n",
            b"one\ntwo\nthree",
            b"\n\n\n",
            b"crlf\r\nlines\r\n",
        ] {
            assert_eq!(round_trip(text), text);
        }
    }

    #[test]
    fn binary_data_round_trips() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn stats_are_reported() {
        let mut out = Vec::new();
        let stats = compress(&mut Cursor::new(b"aaab".to_vec()), &mut out).unwrap();
        assert_eq!(
            stats,
            CompressStats {
                input_bytes: 4,
                distinct_symbols: 2,
                header_len: 10,
                payload_bits: 4,
            }
        );

        let mut restored = Vec::new();
        let stats = decompress(out.as_slice(), &mut restored).unwrap();
        assert_eq!(
            stats,
            DecompressStats {
                output_bytes: 4,
                distinct_symbols: 2,
                payload_bits: 4,
            }
        );
    }

    #[test]
    fn compresses_from_current_position() {
        let mut input = Cursor::new(b"skip:hello".to_vec());
        input.set_position(5);
        let mut out = Vec::new();
        compress(&mut input, &mut out).unwrap();
        assert_eq!(decompress_bytes(&out).unwrap(), b"hello");
    }

    #[test]
    fn truncated_code_is_premature_end() {
        // "1" alone is only half of b's or c's code
        let file = b"(a.0)(b.10)(c.11)\n\x80\x01";
        match decompress_bytes(file) {
            Err(HuffError::PrematureEndOfBits { pending }) => assert_eq!(pending, "1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bits_past_a_lone_leaf_match_no_code() {
        // payload "01": the 0 decodes z, the 1 is not a code at all
        let file = b"(z.0)\n\x40\x02";
        match decompress_bytes(file) {
            Err(HuffError::MalformedPayload(reason)) => assert_eq!(reason, "bits 1 match no code"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_header_is_reported() {
        let file = b"(a.0)(b.0)\n\x00\x08";
        assert!(matches!(
            decompress_bytes(file),
            Err(HuffError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn unknown_byte_is_unencodable() {
        let map = EncodingMap::from_tree(&Node::internal(Node::Leaf(b'a'), Node::Leaf(b'b')));
        let mut sink = HuffWriter::new(Vec::new());
        let err = encode_stream(&b"abc"[..], &map, "(a.0)(b.1)", &mut sink).unwrap_err();
        assert!(matches!(err, HuffError::UnencodableSymbol(b'c')));
    }

    #[test]
    fn cache_agrees_with_direct_lookup() {
        let map = EncodingMap::from_tree(&Node::internal(
            Node::Leaf(b'a'),
            Node::internal(Node::Leaf(b'b'), Node::Leaf(b'c')),
        ));
        let mut cache = DecodeCache::new(&map);
        for bits in ["0", "1", "10", "11", "111", "10", "0", "1"] {
            let first = (cache.is_valid(bits), cache.symbol(bits));
            let again = (cache.is_valid(bits), cache.symbol(bits));
            assert_eq!(first, again);
            assert_eq!(first.1, map.symbol_for(bits));
            assert_eq!(first.0, map.symbol_for(bits).is_some());
        }
    }

    #[test]
    fn inspection_counts_payload_without_decoding() {
        let packed = compress_bytes(b"mississippi").unwrap();
        let seen = inspect(packed.as_slice()).unwrap();
        assert!(seen.header_is_canonical());
        assert_eq!(seen.map.len(), 4);
        assert_eq!(seen.tree.leaf_count(), 4);
        assert_eq!(
            Some(seen.payload_bits),
            seen.map.encoded_bits(&FrequencyTable::from_bytes(b"mississippi"))
        );
    }
}
