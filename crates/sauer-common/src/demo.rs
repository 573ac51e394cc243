// demo.rs — gzip demo-file container
// Converted from: myq2_common::compression's flate2 usage (the teacher
// reaches for flate2 to handle R1Q2's raw-deflate packet compression; this
// repurposes the same dependency for a gzip-wrapped demo file, spec.md §6's
// `{magic[16], version:i32, protocol:i32}` header followed by
// `{gameMillis:i32, channel:i32, len:i32, bytes[len]}` records).

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::transport::Channel;

pub const DEMO_MAGIC: &[u8; 16] = b"SAUERDEMO\0\0\0\0\0\0\0";
pub const DEMO_VERSION: i32 = 1;

/// One recorded frame: a copy of whatever was written to a channel that tick.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoRecord {
    pub game_millis: i32,
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

/// Appends gzip-compressed demo frames to an in-memory buffer, flushed to
/// disk on map change or server exit (spec.md §4.3 "scoped acquisition of
/// temporary files for demo recording with guaranteed deletion").
pub struct DemoWriter {
    encoder: GzEncoder<Vec<u8>>,
    header_written: bool,
    protocol: i32,
}

impl DemoWriter {
    pub fn new(protocol: i32) -> Self {
        Self {
            encoder: GzEncoder::new(Vec::new(), Compression::default()),
            header_written: false,
            protocol,
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.encoder.write_all(DEMO_MAGIC)?;
        self.encoder.write_all(&DEMO_VERSION.to_le_bytes())?;
        self.encoder.write_all(&self.protocol.to_le_bytes())?;
        self.header_written = true;
        Ok(())
    }

    pub fn write_record(&mut self, record: &DemoRecord) -> io::Result<()> {
        self.write_header()?;
        self.encoder.write_all(&record.game_millis.to_le_bytes())?;
        self.encoder.write_all(&(record.channel.index() as i32).to_le_bytes())?;
        self.encoder.write_all(&(record.bytes.len() as i32).to_le_bytes())?;
        self.encoder.write_all(&record.bytes)?;
        Ok(())
    }

    /// Finalize the gzip stream and return the full compressed demo bytes.
    pub fn finish(self) -> io::Result<Vec<u8>> {
        self.encoder.finish()
    }
}

/// Reads a gzip demo file back into its header + ordered records, used by
/// the `GetDemo`/`SendDemo` transfer path (spec.md §6).
pub fn read_demo(gzipped: &[u8]) -> io::Result<(i32, Vec<DemoRecord>)> {
    let mut decoder = GzDecoder::new(gzipped);
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;

    if raw.len() < 24 || &raw[0..16] != DEMO_MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad demo header"));
    }
    let protocol = i32::from_le_bytes([raw[20], raw[21], raw[22], raw[23]]);

    let mut records = Vec::new();
    let mut pos = 24;
    while pos + 12 <= raw.len() {
        let game_millis = i32::from_le_bytes(raw[pos..pos + 4].try_into().unwrap());
        let channel_idx = i32::from_le_bytes(raw[pos + 4..pos + 8].try_into().unwrap());
        let len = i32::from_le_bytes(raw[pos + 8..pos + 12].try_into().unwrap()) as usize;
        pos += 12;
        if pos + len > raw.len() || !(0..3).contains(&channel_idx) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated demo record"));
        }
        let bytes = raw[pos..pos + len].to_vec();
        pos += len;
        records.push(DemoRecord { game_millis, channel: Channel::ALL[channel_idx as usize], bytes });
    }

    Ok((protocol, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_empty_demo() {
        let mut writer = DemoWriter::new(42);
        writer.write_header().unwrap();
        let bytes = writer.finish().unwrap();
        let (protocol, records) = read_demo(&bytes).unwrap();
        assert_eq!(protocol, 42);
        assert!(records.is_empty());
    }

    #[test]
    fn roundtrip_with_records() {
        let mut writer = DemoWriter::new(7);
        writer
            .write_record(&DemoRecord { game_millis: 1000, channel: Channel::Position, bytes: vec![1, 2, 3] })
            .unwrap();
        writer
            .write_record(&DemoRecord { game_millis: 1033, channel: Channel::Message, bytes: vec![9] })
            .unwrap();
        let bytes = writer.finish().unwrap();

        let (protocol, records) = read_demo(&bytes).unwrap();
        assert_eq!(protocol, 7);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].game_millis, 1000);
        assert_eq!(records[0].channel, Channel::Position);
        assert_eq!(records[1].bytes, vec![9]);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_demo(&flate2::write::GzEncoder::new(Vec::new(), Compression::default()).finish().unwrap());
        assert!(err.is_err());
    }
}
