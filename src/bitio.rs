//! Bit-oriented file device: a text header line followed by a packed bit payload.
//!
//! Bits are packed MSB-first. After the payload comes one trailer byte giving the
//! number of meaningful bits in the last payload byte (`1..=8`, or `0` for an empty
//! payload), so readers stop at the last real bit instead of decoding padding.

use bitstream_io::{BigEndian, BitWrite, BitWriter};
use std::io::{self, BufRead, BufReader, Read, Write};

use crate::error::{HuffError, Result};

pub trait BitSink {
    /// Writes `header` and a line break. Must come before any payload bit.
    fn write_header(&mut self, header: &str) -> Result<()>;
    fn write_bit(&mut self, bit: bool) -> Result<()>;
}

pub trait BitSource {
    /// Reads the header line, without its line break.
    fn read_header(&mut self) -> Result<String>;
    /// `None` once every meaningful bit has been read.
    fn read_bit(&mut self) -> Result<Option<bool>>;
}

pub struct HuffWriter<W: Write> {
    bits: BitWriter<W, BigEndian>,
    header_written: bool,
    payload_bits: u64,
}

impl<W: Write> HuffWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            bits: BitWriter::endian(writer, BigEndian),
            header_written: false,
            payload_bits: 0,
        }
    }

    pub fn payload_bits(&self) -> u64 {
        self.payload_bits
    }

    /// Pads the last byte with zeros, appends the trailer and hands back the writer.
    pub fn finish(mut self) -> Result<W> {
        let trailer = match self.payload_bits % 8 {
            0 if self.payload_bits == 0 => 0,
            0 => 8,
            tail => tail as u8,
        };
        self.bits.byte_align()?;
        self.bits.write_bytes(&[trailer])?;
        let mut writer = self.bits.into_writer();
        writer.flush()?;
        Ok(writer)
    }
}

impl<W: Write> BitSink for HuffWriter<W> {
    fn write_header(&mut self, header: &str) -> Result<()> {
        if self.header_written || self.payload_bits > 0 {
            return Err(HuffError::Io(io::Error::other(
                "header must be written once, before the payload",
            )));
        }
        if let Some(at) = header.find('\n') {
            return Err(HuffError::header(at, "header contains a line break"));
        }
        self.bits.write_bytes(header.as_bytes())?;
        self.bits.write_bytes(b"\n")?;
        self.header_written = true;
        Ok(())
    }

    fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.bits.write_bit(bit)?;
        self.payload_bits += 1;
        Ok(())
    }
}

/// Streams the payload back bit by bit.
///
/// Holds at most one undecided byte besides the one being read, so the trailer
/// is recognised as the byte the source ends on without buffering the payload.
pub struct HuffReader<R: Read> {
    source: BufReader<R>,
    current: u8,
    bits_left: u8,
    ahead: Option<u8>,
    finished: bool,
    bits_read: u64,
}

impl<R: Read> HuffReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            source: BufReader::new(reader),
            current: 0,
            bits_left: 0,
            ahead: None,
            finished: false,
            bits_read: 0,
        }
    }

    /// Payload bits handed out so far.
    pub fn bits_read(&self) -> u64 {
        self.bits_read
    }

    fn take_byte(&mut self) -> Result<Option<u8>> {
        let Some(&byte) = self.source.fill_buf()?.first() else {
            return Ok(None);
        };
        self.source.consume(1);
        Ok(Some(byte))
    }

    fn at_end(&mut self) -> Result<bool> {
        Ok(self.source.fill_buf()?.is_empty())
    }

    // Loads the next payload byte, settling how many of its bits are meaningful.
    fn load_byte(&mut self) -> Result<()> {
        let byte = match self.ahead.take() {
            Some(byte) => byte,
            None => self.take_byte()?.ok_or_else(|| {
                HuffError::MalformedPayload("missing bit-count trailer".to_string())
            })?,
        };

        // Only reachable before the first payload byte: `byte` is the trailer.
        let Some(next) = self.take_byte()? else {
            self.finished = true;
            return match byte {
                0 => Ok(()),
                _ => Err(HuffError::MalformedPayload(format!(
                    "trailer {byte} does not fit an empty payload"
                ))),
            };
        };

        self.current = byte;
        if self.at_end()? {
            self.finished = true;
            match next {
                1..=8 => self.bits_left = next,
                _ => {
                    return Err(HuffError::MalformedPayload(format!(
                        "trailer {next} does not fit a non-empty payload"
                    )));
                }
            }
        } else {
            self.ahead = Some(next);
            self.bits_left = 8;
        }
        Ok(())
    }
}

impl<R: Read> BitSource for HuffReader<R> {
    fn read_header(&mut self) -> Result<String> {
        let mut line = Vec::new();
        self.source.read_until(b'\n', &mut line)?;
        if line.pop() != Some(b'\n') {
            return Err(HuffError::header(line.len(), "header line is not terminated"));
        }
        String::from_utf8(line)
            .map_err(|e| HuffError::header(e.utf8_error().valid_up_to(), "header is not text"))
    }

    fn read_bit(&mut self) -> Result<Option<bool>> {
        if self.bits_left == 0 {
            if self.finished {
                return Ok(None);
            }
            self.load_byte()?;
            if self.bits_left == 0 {
                return Ok(None);
            }
        }
        let bit = self.current & 0x80 != 0;
        self.current <<= 1;
        self.bits_left -= 1;
        self.bits_read += 1;
        Ok(Some(bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(header: &str, bits: &[bool]) -> Vec<u8> {
        let mut out = HuffWriter::new(Vec::new());
        out.write_header(header).unwrap();
        for &b in bits {
            out.write_bit(b).unwrap();
        }
        out.finish().unwrap()
    }

    fn read_all(data: &[u8]) -> (String, Vec<bool>) {
        let mut input = HuffReader::new(data);
        let header = input.read_header().unwrap();
        let mut bits = Vec::new();
        while let Some(b) = input.read_bit().unwrap() {
            bits.push(b);
        }
        (header, bits)
    }

    #[test]
    fn layout_is_header_payload_trailer() {
        let bytes = written("(a.1)(b.0)", &[true, true, true, false]);
        assert_eq!(bytes, b"(a.1)(b.0)\n\xe0\x04".to_vec());
    }

    #[test]
    fn full_final_byte_has_trailer_eight() {
        let bits = [true, false, true, false, true, false, true, false];
        let bytes = written("h", &bits);
        assert_eq!(bytes, b"h\n\xaa\x08".to_vec());
        assert_eq!(read_all(&bytes), ("h".to_string(), bits.to_vec()));
    }

    #[test]
    fn padding_is_never_read() {
        let bits = [false, true, true];
        let bytes = written("(x.0)", &bits);
        let (_, read) = read_all(&bytes);
        assert_eq!(read, bits.to_vec());
    }

    #[test]
    fn empty_payload() {
        let bytes = written("(x.0)", &[]);
        assert_eq!(bytes, b"(x.0)\n\x00".to_vec());
        let mut input = HuffReader::new(bytes.as_slice());
        input.read_header().unwrap();
        assert_eq!(input.read_bit().unwrap(), None);
        assert_eq!(input.read_bit().unwrap(), None);
        assert_eq!(input.bits_read(), 0);
    }

    #[test]
    fn header_after_payload_is_refused() {
        let mut out = HuffWriter::new(Vec::new());
        out.write_bit(true).unwrap();
        assert!(out.write_header("(a.0)").is_err());
    }

    #[test]
    fn header_with_line_break_is_refused() {
        let mut out = HuffWriter::new(Vec::new());
        assert!(matches!(
            out.write_header("(a.0)\n(b.1)"),
            Err(HuffError::MalformedHeader { offset: 5, .. })
        ));
    }

    #[test]
    fn unterminated_header() {
        let mut input = HuffReader::new(&b"(a.0)(b.1)"[..]);
        assert!(matches!(
            input.read_header(),
            Err(HuffError::MalformedHeader { .. })
        ));
    }

    // Hands out one byte per read, like a pipe that trickles data.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some((&first, rest)) = self.0.split_first() else {
                return Ok(0);
            };
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = first;
            self.0 = rest;
            Ok(1)
        }
    }

    #[test]
    fn payload_streams_from_a_trickling_source() {
        let bits: Vec<bool> = (0..4099).map(|i| i % 3 == 0 || i % 7 == 0).collect();
        let bytes = written("(a.0)(b.1)", &bits);
        let mut input = HuffReader::new(Trickle(&bytes));
        assert_eq!(input.read_header().unwrap(), "(a.0)(b.1)");
        let mut read = Vec::new();
        while let Some(b) = input.read_bit().unwrap() {
            read.push(b);
        }
        assert_eq!(read, bits);
        assert_eq!(input.bits_read(), 4099);
    }

    #[test]
    fn bits_arrive_before_the_source_is_exhausted() {
        // A corrupt trailer far behind the first bytes only surfaces when reached.
        let mut data = b"h\n".to_vec();
        data.extend(std::iter::repeat_n(0xf0u8, 1000));
        data.push(0x09);
        let mut input = HuffReader::new(data.as_slice());
        input.read_header().unwrap();
        for _ in 0..8 {
            assert!(input.read_bit().unwrap().is_some());
        }
        assert_eq!(input.bits_read(), 8);
        let err = loop {
            match input.read_bit() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("corrupt trailer accepted"),
                Err(e) => break e,
            }
        };
        assert!(matches!(err, HuffError::MalformedPayload(_)));
        assert_eq!(input.bits_read(), 999 * 8);
    }

    #[test]
    fn bad_trailers() {
        for data in [&b"h\n"[..], b"h\n\xff\x09", b"h\n\x05", b"h\n\xff\x00"] {
            let mut input = HuffReader::new(data);
            input.read_header().unwrap();
            assert!(
                matches!(input.read_bit(), Err(HuffError::MalformedPayload(_))),
                "{data:?}"
            );
        }
    }
}
