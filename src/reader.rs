use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::{DecodeError, Result};
use crate::header::{Header, SharedHeader};
use crate::parser;
use crate::record::Record;
use crate::types::{MAGIC, VERSION_MAJOR, VERSION_MINOR};

/// Iterator over the records of a byte stream: magic and header are read up
/// front, then each call to `next` frames one record by its length prefix
/// and decodes it.
///
/// Record-level malformations do not end the stream; they surface through
/// the yielded record's error code. Only I/O failures and short reads yield
/// `Err` items.
pub struct Records<R: Read> {
    header: SharedHeader,
    length_buf: [u8; parser::PREFIX_LEN],
    record_buf: Vec<u8>,
    inner: R,
}

impl<R: Read> Records<R> {
    pub fn header(&self) -> &Header {
        self.header.as_ref()
    }

    pub fn shared_header(&self) -> SharedHeader {
        self.header.clone()
    }
}

impl Records<Box<dyn Read>> {
    /// Opens a file, transparently unwrapping gzip-style compression.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let (reader, _format) = niffler::from_path(path)?;
        Self::new(reader)
    }
}

impl<R: Read> Records<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 5];
        reader.read_exact(&mut magic)?;
        if &magic[..3] != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let (major, minor) = (magic[3], magic[4]);
        if major != VERSION_MAJOR || minor > VERSION_MINOR {
            return Err(DecodeError::UnsupportedVersion { major, minor });
        }

        let mut length = [0u8; 4];
        reader.read_exact(&mut length)?;
        let l_text = u32::from_le_bytes(length) as usize;
        let mut text = vec![0u8; l_text];
        reader.read_exact(&mut text)?;
        let text = String::from_utf8_lossy(&text);
        let header = Header::from_text(text.trim_end_matches('\0'))?;
        debug!(
            "parsed header: {} contigs, {} samples",
            header.contigs().len(),
            header.samples().len()
        );

        Ok(Self {
            header: SharedHeader::new(header),
            length_buf: [0u8; parser::PREFIX_LEN],
            record_buf: Vec::new(),
            inner: reader,
        })
    }
}

impl<R: Read> Iterator for Records<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        // only a clean EOF at a record boundary ends the stream; running dry
        // inside the length prefix is a truncated record
        let mut filled = 0;
        while filled < self.length_buf.len() {
            match self.inner.read(&mut self.length_buf[filled..]) {
                Ok(0) if filled == 0 => return None,
                Ok(0) => {
                    return Some(Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "stream ends inside a record length prefix",
                    )
                    .into()))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        let l_shared = u32::from_le_bytes([
            self.length_buf[0],
            self.length_buf[1],
            self.length_buf[2],
            self.length_buf[3],
        ]) as usize;
        let l_indiv = u32::from_le_bytes([
            self.length_buf[4],
            self.length_buf[5],
            self.length_buf[6],
            self.length_buf[7],
        ]) as usize;
        self.record_buf
            .resize(parser::PREFIX_LEN + l_shared + l_indiv, 0);
        self.record_buf[..parser::PREFIX_LEN].copy_from_slice(&self.length_buf);
        if let Err(e) = self
            .inner
            .read_exact(&mut self.record_buf[parser::PREFIX_LEN..])
        {
            return Some(Err(e.into()));
        }
        Some(Record::decode(&self.record_buf, self.header.clone()))
    }
}
