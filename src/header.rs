//! Text header that carries the code table ahead of the payload.
//!
//! The header is one line of printable ASCII made of `(symbol.path)` records,
//! for example `(a.0)(b.10)(c.11)`. Printable bytes other than `\` are written
//! as themselves; `\` is written `\\` and every other byte as `\xHH`
//! with lowercase hex digits.

use std::fmt::Write as _;

use crate::encoding::{EncodingMap, LONE_LEAF_CODE};
use crate::error::{HuffError, Result};
use crate::tree::Node;

/// No complete tree over 256 distinct symbols is deeper than this.
const MAX_PATH_LEN: usize = 255;

/// One `(symbol.path)` entry of a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub symbol: u8,
    pub path: String,
    /// Byte offset of the record's `(` within the header.
    pub offset: usize,
}

/// Serializes `map` into header records, in the map's iteration order.
pub fn flatten(map: &EncodingMap) -> String {
    let mut header = String::new();
    for (symbol, path) in map.iter() {
        header.push('(');
        push_symbol(&mut header, symbol);
        header.push('.');
        header.push_str(path);
        header.push(')');
    }
    header
}

fn push_symbol(out: &mut String, symbol: u8) {
    match symbol {
        b'\\' => out.push_str("\\\\"),
        0x20..=0x7e => out.push(symbol as char),
        _ => {
            let _ = write!(out, "\\x{symbol:02x}");
        }
    }
}

/// Splits a header into its records.
pub fn parse(header: &str) -> Result<Vec<Record>> {
    let bytes = header.as_bytes();
    let mut records = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let offset = pos;
        expect(bytes, pos, b'(')?;
        pos += 1;

        let (symbol, used) = parse_symbol(bytes, pos)?;
        pos += used;

        expect(bytes, pos, b'.')?;
        pos += 1;

        let path_start = pos;
        while pos < bytes.len() && matches!(bytes[pos], b'0' | b'1') {
            pos += 1;
        }
        if pos == path_start {
            return Err(HuffError::header(pos, "record has an empty path"));
        }
        if pos - path_start > MAX_PATH_LEN {
            return Err(HuffError::header(
                path_start,
                format!("path longer than {MAX_PATH_LEN} bits"),
            ));
        }
        let path = header[path_start..pos].to_string();

        if pos >= bytes.len() {
            return Err(HuffError::header(offset, "unterminated record"));
        }
        expect(bytes, pos, b')')?;
        pos += 1;

        records.push(Record {
            symbol,
            path,
            offset,
        });
    }

    if records.is_empty() {
        return Err(HuffError::header(0, "header has no records"));
    }
    Ok(records)
}

fn expect(bytes: &[u8], pos: usize, want: u8) -> Result<()> {
    match bytes.get(pos) {
        Some(&b) if b == want => Ok(()),
        Some(&b) => Err(HuffError::header(
            pos,
            format!("expected '{}', found byte 0x{b:02x}", want as char),
        )),
        None => Err(HuffError::header(pos, "unterminated record")),
    }
}

// Returns the symbol and how many header bytes encoded it.
fn parse_symbol(bytes: &[u8], pos: usize) -> Result<(u8, usize)> {
    match bytes.get(pos) {
        None => Err(HuffError::header(pos, "unterminated record")),
        Some(b'\\') => match bytes.get(pos + 1) {
            Some(b'\\') => Ok((b'\\', 2)),
            Some(b'x') => {
                let hi = bytes.get(pos + 2).and_then(|&b| hex_digit(b));
                let lo = bytes.get(pos + 3).and_then(|&b| hex_digit(b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => Ok(((hi << 4) | lo, 4)),
                    _ => Err(HuffError::header(pos, "bad \\x escape")),
                }
            }
            _ => Err(HuffError::header(pos, "unknown escape")),
        },
        Some(&b) if (0x20..=0x7e).contains(&b) => Ok((b, 1)),
        Some(&b) => Err(HuffError::header(
            pos,
            format!("byte 0x{b:02x} must be escaped"),
        )),
    }
}

// Lowercase only, so every byte has exactly one spelling.
fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Leaf(u8),
    Branch(Box<Partial>),
}

#[derive(Debug, Default)]
struct Partial {
    zero: Slot,
    one: Slot,
}

impl Partial {
    fn child_mut(&mut self, bit: u8) -> &mut Slot {
        if bit == b'0' { &mut self.zero } else { &mut self.one }
    }

    // Every branch must end up with both children filled.
    fn into_node(self, offset: usize) -> Result<Node> {
        let zero = Self::slot_into_node(self.zero, offset)?;
        let one = Self::slot_into_node(self.one, offset)?;
        Ok(Node::internal(zero, one))
    }

    fn slot_into_node(slot: Slot, offset: usize) -> Result<Node> {
        match slot {
            Slot::Empty => Err(HuffError::header(
                offset,
                "records leave a branch with a single child",
            )),
            Slot::Leaf(symbol) => Ok(Node::Leaf(symbol)),
            Slot::Branch(partial) => partial.into_node(offset),
        }
    }

    fn place(&mut self, record: &Record) -> Result<()> {
        let Some((&last, prefix)) = record.path.as_bytes().split_last() else {
            return Err(HuffError::header(record.offset, "record has an empty path"));
        };

        let mut cur = self;
        for &bit in prefix {
            let slot = cur.child_mut(bit);
            if let Slot::Empty = slot {
                *slot = Slot::Branch(Box::default());
            }
            cur = match slot {
                Slot::Branch(next) => &mut **next,
                _ => {
                    return Err(HuffError::header(
                        record.offset,
                        "path runs through another symbol's leaf",
                    ));
                }
            };
        }

        let slot = cur.child_mut(last);
        match slot {
            Slot::Empty => {
                *slot = Slot::Leaf(record.symbol);
                Ok(())
            }
            Slot::Leaf(other) => Err(HuffError::header(
                record.offset,
                format!("path already taken by byte 0x{other:02x}"),
            )),
            Slot::Branch(_) => Err(HuffError::header(
                record.offset,
                "path is a prefix of another record's path",
            )),
        }
    }
}

/// Rebuilds a tree from header records, creating branches on demand.
///
/// A header holding the single record `(s.0)` describes a lone leaf.
pub fn reconstruct(header: &str) -> Result<Node> {
    let records = parse(header)?;

    let mut seen = [false; 256];
    for record in &records {
        if std::mem::replace(&mut seen[record.symbol as usize], true) {
            return Err(HuffError::header(record.offset, "symbol appears twice"));
        }
    }

    if let [only] = records.as_slice() {
        if only.path == LONE_LEAF_CODE {
            return Ok(Node::Leaf(only.symbol));
        }
    }

    let mut root = Partial::default();
    for record in &records {
        root.place(record)?;
    }
    root.into_node(header.len())
}
