use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};

/// Byte -> occurrence count for one input. Counts are always positive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: BTreeMap<u8, u64>,
}

impl FrequencyTable {
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut counts = BTreeMap::new();
        for &byte in data {
            *counts.entry(byte).or_insert(0) += 1;
        }
        Self { counts }
    }

    /// Consumes `input` to its end. Rewinding for a second pass is the caller's job.
    pub fn from_reader<R: Read>(input: R) -> io::Result<Self> {
        let mut reader = BufReader::new(input);
        let mut counts = BTreeMap::new();
        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            for &byte in chunk {
                *counts.entry(byte).or_insert(0) += 1;
            }
            let n = chunk.len();
            reader.consume(n);
        }
        Ok(Self { counts })
    }

    pub fn get(&self, symbol: u8) -> Option<u64> {
        self.counts.get(&symbol).copied()
    }

    /// Number of distinct symbols.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of bytes counted.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts.iter().map(|(&s, &c)| (s, c))
    }
}

/// Printable form of a symbol for listings: `'a'` for printable ASCII, `0x0a` otherwise.
pub fn symbol_label(symbol: u8) -> String {
    if symbol.is_ascii_graphic() || symbol == b' ' {
        format!("'{}'", symbol as char)
    } else {
        format!("0x{symbol:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn counts_every_byte() {
        let table = FrequencyTable::from_bytes(b"aaab");
        assert_eq!(table.get(b'a'), Some(3));
        assert_eq!(table.get(b'b'), Some(1));
        assert_eq!(table.get(b'c'), None);
        assert_eq!(table.len(), 2);
        assert_eq!(table.total(), 4);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = FrequencyTable::from_reader(Cursor::new(Vec::<u8>::new())).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.total(), 0);
    }

    #[test]
    fn reader_and_slice_agree() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let from_reader = FrequencyTable::from_reader(Cursor::new(&data)).unwrap();
        assert_eq!(from_reader, FrequencyTable::from_bytes(&data));
        assert!(from_reader.iter().all(|(_, count)| count > 0));
    }

    #[test]
    fn labels() {
        assert_eq!(symbol_label(b'a'), "'a'");
        assert_eq!(symbol_label(b' '), "' '");
        assert_eq!(symbol_label(b'\n'), "0x0a");
        assert_eq!(symbol_label(0xff), "0xff");
    }

    #[test]
    fn reader_is_left_at_end() {
        let mut cursor = Cursor::new(b"hello\nworld\n".to_vec());
        FrequencyTable::from_reader(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 12);
    }
}
