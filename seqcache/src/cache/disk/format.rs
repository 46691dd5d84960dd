//! Block file layout.
//!
//! A block file starts with a fixed directory of [`SLOTS_PER_FILE`] packed
//! slots, followed by payloads in allocation order:
//!
//! ```text
//! offset  size  field
//! 0       1     byte order tag (0 = little-endian, 255 = big-endian)
//! 1       8     frame number
//! 9       8     compressed size (0 = empty slot)
//! 17      8     raw size
//! 25      8     payload offset from start of file
//! 33      64    colorspace name, NUL padded
//! ```
//!
//! Slots are written little-endian. Big-endian slots written by other hosts
//! are still decoded. When every slot is taken the directory is reset and
//! allocation restarts at slot 0; old payload bytes are left in place until
//! overwritten and the file is never truncated.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as GzLevel;
use thiserror::Error;

use crate::cache::config::Compression;

/// Entries per block file.
pub const SLOTS_PER_FILE: usize = 100;

/// Length of the colorspace name field.
pub const COLORSPACE_LEN: usize = 64;

/// Encoded size of one directory slot.
pub const SLOT_SIZE: usize = 1 + 8 + 8 + 8 + 8 + COLORSPACE_LEN;

/// Encoded size of the directory; payloads start here.
pub const HEADER_SIZE: usize = SLOT_SIZE * SLOTS_PER_FILE;

const TAG_LITTLE_ENDIAN: u8 = 0;
const TAG_BIG_ENDIAN: u8 = 255;

/// First bytes of every gzip member.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Largest raw payload accepted when reading (1 GiB).
const MAX_RAW_SIZE: u64 = 1 << 30;

/// Errors decoding a block file directory.
#[derive(Debug, Error)]
pub enum DiskFormatError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File is shorter than a full directory
    #[error("header truncated: expected {expected} bytes, found {actual}")]
    ShortHeader { expected: usize, actual: usize },

    /// Slot carries a byte order tag this build does not know
    #[error("slot {slot} has unknown byte order tag {tag}")]
    UnknownByteOrder { slot: usize, tag: u8 },
}

/// One directory slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSlot {
    pub frame: i64,
    pub compressed_size: u64,
    pub raw_size: u64,
    pub offset: u64,
    pub colorspace: String,
}

impl HeaderSlot {
    pub fn is_empty(&self) -> bool {
        self.compressed_size == 0
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(TAG_LITTLE_ENDIAN);
        out.extend_from_slice(&self.frame.to_le_bytes());
        out.extend_from_slice(&self.compressed_size.to_le_bytes());
        out.extend_from_slice(&self.raw_size.to_le_bytes());
        out.extend_from_slice(&self.offset.to_le_bytes());

        let mut name = [0u8; COLORSPACE_LEN];
        let bytes = self.colorspace.as_bytes();
        // Keep one NUL terminator.
        let len = bytes.len().min(COLORSPACE_LEN - 1);
        name[..len].copy_from_slice(&bytes[..len]);
        out.extend_from_slice(&name);
    }

    fn decode(slot: usize, bytes: &[u8]) -> Result<Self, DiskFormatError> {
        let big_endian = match bytes[0] {
            TAG_LITTLE_ENDIAN => false,
            TAG_BIG_ENDIAN => true,
            tag => return Err(DiskFormatError::UnknownByteOrder { slot, tag }),
        };
        let field = |at: usize| -> [u8; 8] {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            buf
        };
        let read_u64 = |at: usize| {
            if big_endian {
                u64::from_be_bytes(field(at))
            } else {
                u64::from_le_bytes(field(at))
            }
        };

        let name = &bytes[33..33 + COLORSPACE_LEN];
        let end = name.iter().position(|&b| b == 0).unwrap_or(COLORSPACE_LEN);

        Ok(Self {
            frame: read_u64(1) as i64,
            compressed_size: read_u64(9),
            raw_size: read_u64(17),
            offset: read_u64(25),
            colorspace: String::from_utf8_lossy(&name[..end]).into_owned(),
        })
    }
}

/// The slot directory at the start of a block file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    slots: Vec<HeaderSlot>,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockHeader {
    /// A directory with every slot empty.
    pub fn new() -> Self {
        Self {
            slots: vec![HeaderSlot::default(); SLOTS_PER_FILE],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DiskFormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DiskFormatError::ShortHeader {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let slots = bytes[..HEADER_SIZE]
            .chunks_exact(SLOT_SIZE)
            .enumerate()
            .map(|(i, chunk)| HeaderSlot::decode(i, chunk))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { slots })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        for slot in &self.slots {
            slot.encode_into(&mut out);
        }
        out
    }

    /// Read the directory from the start of `file`.
    pub fn read_from(file: &mut File) -> Result<Self, DiskFormatError> {
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        (&mut *file).take(HEADER_SIZE as u64).read_to_end(&mut bytes)?;
        Self::decode(&bytes)
    }

    pub fn write_to(&self, file: &mut File) -> io::Result<()> {
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.encode())
    }

    pub fn slots(&self) -> &[HeaderSlot] {
        &self.slots
    }

    /// First populated slot holding `frame`.
    pub fn find(&self, frame: i64) -> Option<&HeaderSlot> {
        self.slots.iter().find(|s| !s.is_empty() && s.frame == frame)
    }

    pub fn populated(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    /// Reserve the next slot and compute where its payload goes.
    ///
    /// Returns the slot index, the payload offset and whether the directory
    /// had to be reset.
    pub fn allocate(&mut self) -> (usize, u64, bool) {
        match self.slots.iter().position(HeaderSlot::is_empty) {
            Some(0) => (0, HEADER_SIZE as u64, false),
            Some(i) => {
                let prev = &self.slots[i - 1];
                (i, prev.offset + prev.compressed_size, false)
            }
            None => {
                self.slots = vec![HeaderSlot::default(); SLOTS_PER_FILE];
                (0, HEADER_SIZE as u64, true)
            }
        }
    }

    fn set(&mut self, index: usize, slot: HeaderSlot) {
        self.slots[index] = slot;
    }
}

/// Compress a payload at the given level.
///
/// Raw bytes that happen to start with the gzip magic are wrapped in a
/// stored (level 0) gzip member so the read-side sniff stays unambiguous.
pub fn compress(data: &[u8], compression: Compression) -> io::Result<Vec<u8>> {
    let level = match compression.level() {
        Some(level) => level,
        None if is_compressed(data) => 0,
        None => return Ok(data.to_vec()),
    };
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), GzLevel::new(level));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Whether a payload starts with a gzip header.
pub fn is_compressed(payload: &[u8]) -> bool {
    payload.starts_with(&GZIP_MAGIC)
}

/// Restore a payload, checking it inflates to exactly `raw_size` bytes.
pub fn decompress(payload: &[u8], raw_size: u64) -> Option<Vec<u8>> {
    if raw_size > MAX_RAW_SIZE {
        return None;
    }
    let data = if is_compressed(payload) {
        // One byte past raw_size is enough to detect an oversized payload.
        let mut data = Vec::with_capacity(raw_size as usize);
        GzDecoder::new(payload)
            .take(raw_size + 1)
            .read_to_end(&mut data)
            .ok()?;
        data
    } else {
        payload.to_vec()
    };
    (data.len() as u64 == raw_size).then_some(data)
}

/// Outcome of [`append_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Slot the entry was written to
    pub slot: usize,
    /// Directory was reset to make room
    pub wrapped: bool,
}

/// Append one entry to an open block file.
///
/// An empty file gets a fresh directory. A directory that fails to decode is
/// returned as an error and nothing is written.
pub fn append_entry(
    file: &mut File,
    frame: i64,
    raw: &[u8],
    colorspace: &str,
    compression: Compression,
) -> Result<AppendOutcome, DiskFormatError> {
    let mut header = if file.metadata()?.len() == 0 {
        BlockHeader::new()
    } else {
        BlockHeader::read_from(file)?
    };

    let (slot, offset, wrapped) = header.allocate();
    let payload = compress(raw, compression)?;

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&payload)?;

    header.set(
        slot,
        HeaderSlot {
            frame,
            compressed_size: payload.len() as u64,
            raw_size: raw.len() as u64,
            offset,
            colorspace: colorspace.to_string(),
        },
    );
    header.write_to(file)?;

    Ok(AppendOutcome { slot, wrapped })
}

/// Read the entry for `frame` from an open block file.
///
/// Payloads that cannot be read back or inflate to the wrong size are a
/// miss. Only a bad directory is an error.
pub fn read_entry(file: &mut File, frame: i64) -> Result<Option<(HeaderSlot, Vec<u8>)>, DiskFormatError> {
    let header = BlockHeader::read_from(file)?;
    let Some(slot) = header.find(frame) else {
        return Ok(None);
    };

    let file_len = file.metadata()?.len();
    if slot.offset.saturating_add(slot.compressed_size) > file_len {
        return Ok(None);
    }

    let mut payload = vec![0u8; slot.compressed_size as usize];
    file.seek(SeekFrom::Start(slot.offset))?;
    if file.read_exact(&mut payload).is_err() {
        return Ok(None);
    }

    Ok(decompress(&payload, slot.raw_size).map(|data| (slot.clone(), data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> File {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.path().join("block.cache"))
            .unwrap()
    }

    fn payload(seed: u8) -> Vec<u8> {
        (0..1024u32).map(|i| (i as u8).wrapping_mul(seed)).collect()
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(SLOT_SIZE, 97);
        assert_eq!(HEADER_SIZE, 9700);
    }

    #[test]
    fn test_header_encode_decode() {
        let mut header = BlockHeader::new();
        header.set(
            0,
            HeaderSlot {
                frame: 42,
                compressed_size: 10,
                raw_size: 20,
                offset: HEADER_SIZE as u64,
                colorspace: "Linear Rec.709".to_string(),
            },
        );

        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(BlockHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_big_endian_slot_decodes() {
        let mut bytes = BlockHeader::new().encode();
        bytes[0] = TAG_BIG_ENDIAN;
        bytes[1..9].copy_from_slice(&7i64.to_be_bytes());
        bytes[9..17].copy_from_slice(&5u64.to_be_bytes());
        bytes[17..25].copy_from_slice(&5u64.to_be_bytes());
        bytes[25..33].copy_from_slice(&(HEADER_SIZE as u64).to_be_bytes());

        let header = BlockHeader::decode(&bytes).unwrap();
        let slot = header.find(7).unwrap();
        assert_eq!(slot.compressed_size, 5);
        assert_eq!(slot.offset, HEADER_SIZE as u64);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut bytes = BlockHeader::new().encode();
        bytes[SLOT_SIZE] = 7;
        assert!(matches!(
            BlockHeader::decode(&bytes),
            Err(DiskFormatError::UnknownByteOrder { slot: 1, tag: 7 })
        ));
    }

    #[test]
    fn test_short_header_rejected() {
        assert!(matches!(
            BlockHeader::decode(&[0u8; 100]),
            Err(DiskFormatError::ShortHeader { actual: 100, .. })
        ));
    }

    #[test]
    fn test_colorspace_truncated_to_field() {
        let mut header = BlockHeader::new();
        header.set(
            0,
            HeaderSlot {
                frame: 1,
                compressed_size: 1,
                raw_size: 1,
                offset: 0,
                colorspace: "x".repeat(100),
            },
        );
        let decoded = BlockHeader::decode(&header.encode()).unwrap();
        assert_eq!(decoded.slots()[0].colorspace.len(), COLORSPACE_LEN - 1);
    }

    #[test]
    fn test_allocate_offsets_follow_previous_payload() {
        let mut header = BlockHeader::new();
        assert_eq!(header.allocate(), (0, HEADER_SIZE as u64, false));

        header.set(
            0,
            HeaderSlot {
                frame: 0,
                compressed_size: 300,
                raw_size: 300,
                offset: HEADER_SIZE as u64,
                colorspace: String::new(),
            },
        );
        assert_eq!(header.allocate(), (1, HEADER_SIZE as u64 + 300, false));
    }

    #[test]
    fn test_append_and_read_uncompressed() {
        let dir = TempDir::new().unwrap();
        let mut file = open(&dir);
        let data = payload(3);

        let outcome = append_entry(&mut file, 5, &data, "sRGB", Compression::None).unwrap();
        assert_eq!(outcome, AppendOutcome { slot: 0, wrapped: false });

        let (slot, read) = read_entry(&mut file, 5).unwrap().unwrap();
        assert_eq!(read, data);
        assert_eq!(slot.colorspace, "sRGB");
        assert_eq!(slot.compressed_size, slot.raw_size);
        assert!(read_entry(&mut file, 6).unwrap().is_none());
    }

    #[test]
    fn test_append_and_read_compressed() {
        let dir = TempDir::new().unwrap();
        let mut file = open(&dir);
        let data = vec![9u8; 64 * 1024];

        append_entry(&mut file, 1, &data, "sRGB", Compression::High).unwrap();
        append_entry(&mut file, 2, &payload(5), "sRGB", Compression::Low).unwrap();

        let (slot, read) = read_entry(&mut file, 1).unwrap().unwrap();
        assert_eq!(read, data);
        assert!(slot.compressed_size < slot.raw_size);
        assert_eq!(read_entry(&mut file, 2).unwrap().unwrap().1, payload(5));
    }

    #[test]
    fn test_ring_wrap_after_full_directory() {
        let dir = TempDir::new().unwrap();
        let mut file = open(&dir);

        for frame in 0..SLOTS_PER_FILE as i64 {
            let outcome = append_entry(&mut file, frame, &payload(frame as u8), "sRGB", Compression::None).unwrap();
            assert!(!outcome.wrapped);
        }
        let outcome = append_entry(&mut file, 100, &payload(100), "sRGB", Compression::None).unwrap();

        assert_eq!(outcome, AppendOutcome { slot: 0, wrapped: true });
        assert!(read_entry(&mut file, 0).unwrap().is_none());
        assert!(read_entry(&mut file, 50).unwrap().is_none());
        assert_eq!(read_entry(&mut file, 100).unwrap().unwrap().1, payload(100));
        assert_eq!(BlockHeader::read_from(&mut file).unwrap().populated(), 1);
    }

    #[test]
    fn test_raw_size_mismatch_is_miss() {
        let dir = TempDir::new().unwrap();
        let mut file = open(&dir);
        append_entry(&mut file, 1, &payload(1), "sRGB", Compression::None).unwrap();

        let mut header = BlockHeader::read_from(&mut file).unwrap();
        let mut slot = header.slots()[0].clone();
        slot.raw_size += 1;
        header.set(0, slot);
        header.write_to(&mut file).unwrap();

        assert!(read_entry(&mut file, 1).unwrap().is_none());
    }

    #[test]
    fn test_raw_payload_with_gzip_magic_round_trips() {
        let mut data = payload(1);
        data[0] = 0x1F;
        data[1] = 0x8B;

        let stored = compress(&data, Compression::None).unwrap();
        assert!(is_compressed(&stored));
        assert_eq!(decompress(&stored, data.len() as u64).unwrap(), data);

        let plain = compress(&payload(1), Compression::None).unwrap();
        assert_eq!(plain, payload(1));
    }

    #[test]
    fn test_compression_sniff() {
        let compressed = compress(&payload(1), Compression::Low).unwrap();
        assert!(is_compressed(&compressed));
        assert!(!is_compressed(&payload(1)));
        assert_eq!(decompress(&compressed, 1024).unwrap(), payload(1));
        assert!(decompress(&compressed, 1000).is_none());
    }
}
