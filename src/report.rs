use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::Path;

/// Summary of one command run, printed as text or as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub timestamp: String,
    pub action: String,
    pub input: String,
    pub output: Option<String>,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub distinct_symbols: usize,
    pub payload_bits: u64,
    /// SHA-256 of the uncompressed content, hex encoded.
    pub sha256: String,
}

impl Report {
    pub fn new(action: &str, input: &Path, output: Option<&Path>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: action.to_string(),
            input: input.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            input_bytes: 0,
            output_bytes: 0,
            distinct_symbols: 0,
            payload_bits: 0,
            sha256: String::new(),
        }
    }

    /// Output size over input size; 0 for empty input.
    pub fn ratio(&self) -> f64 {
        if self.input_bytes == 0 {
            0.0
        } else {
            self.output_bytes as f64 / self.input_bytes as f64
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

/// Streams `reader` through SHA-256.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex(&hasher.finalize()))
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
