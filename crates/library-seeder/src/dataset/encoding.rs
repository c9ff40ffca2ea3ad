//! Single-byte text decoding for dataset files.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use super::DatasetError;

/// Character encoding of the dataset CSV.
///
/// Kaggle exports are frequently ISO-8859-1, which decodes any byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Latin1,
    Windows1252,
    /// Invalid sequences become U+FFFD.
    Utf8,
}

/// Code points for bytes 0x80..=0x9F in windows-1252. Unassigned bytes map
/// to the matching C1 control, as ISO-8859-1 would.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => CP1252_HIGH[usize::from(b - 0x80)],
                    _ => char::from(b),
                })
                .collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Latin1 => "ISO-8859-1",
            Self::Windows1252 => "windows-1252",
            Self::Utf8 => "UTF-8",
        }
    }
}

impl FromStr for TextEncoding {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        match key.as_str() {
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Ok(Self::Latin1),
            "windows-1252" | "cp1252" => Ok(Self::Windows1252),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            _ => Err(DatasetError::UnknownEncoding(s.to_string())),
        }
    }
}

/// Bytes pulled from the inner reader per refill.
const CHUNK_SIZE: usize = 8 * 1024;

/// Adapts a reader in some [`TextEncoding`] into a UTF-8 byte stream.
///
/// Decodes one chunk at a time. UTF-8 sequences split across chunks are held
/// back until the rest arrives.
pub struct DecodingReader<R> {
    inner: R,
    encoding: TextEncoding,
    pending: Vec<u8>,
    decoded: Vec<u8>,
    pos: usize,
    eof: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: TextEncoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
            decoded: Vec::new(),
            pos: 0,
            eof: false,
        }
    }

    fn refill(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = loop {
            match self.inner.read(&mut chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.pos = 0;

        if n == 0 {
            self.eof = true;
            let rest = std::mem::take(&mut self.pending);
            self.decoded = self.encoding.decode(&rest).into_bytes();
            return Ok(());
        }

        self.decoded = match self.encoding {
            TextEncoding::Utf8 => {
                self.pending.extend_from_slice(&chunk[..n]);
                let split = self.pending.len() - incomplete_utf8_tail(&self.pending);
                let text = self.encoding.decode(&self.pending[..split]);
                self.pending.drain(..split);
                text.into_bytes()
            }
            _ => self.encoding.decode(&chunk[..n]).into_bytes(),
        };
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.decoded.len() {
            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }

        let n = buf.len().min(self.decoded.len() - self.pos);
        buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Length of a trailing UTF-8 sequence that is cut short, or 0.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let width = match bytes[i] {
            0x80..=0xBF => continue,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let have = bytes.len() - i;
        return if have < width { have } else { 0 };
    }
    0
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
