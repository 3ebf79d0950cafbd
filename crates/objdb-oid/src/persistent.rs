//! Channel-backed identity table.
//!
//! Channel format:
//! ```text
//! [4 bytes: magic "ODBI"]
//! [4 bytes: format version (big-endian u32)]
//! [8 bytes: next value (big-endian u64)]
//! [record]*  one per value v >= 1, at 16 + (v - 1) * 13
//!
//! record:
//! [1 byte:  state (0 free, 1 allocated, 2 bound, 3 deleted)]
//! [8 bytes: position (big-endian u64)]
//! [4 bytes: CRC32 of the previous 9 bytes (big-endian u32)]
//! ```
//!
//! `allocate` advances the header before writing the new record, so a crash
//! in between leaves a value that is skipped rather than handed out twice.
//! Records past the end of the channel, and all-zero records, read as free.

use std::marker::PhantomData;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use objdb_io::StorageChannel;
use objdb_types::{Oid, Position};

use crate::error::{OidError, OidResult};
use crate::table::{require_live, IdentityTable, OidState};

const MAGIC: &[u8; 4] = b"ODBI";
const VERSION: u32 = 1;
const HEADER_SIZE: u64 = 16;
const NEXT_OFFSET: u64 = 8;
const RECORD_SIZE: u64 = 13;

const STATE_FREE: u8 = 0;
const STATE_ALLOCATED: u8 = 1;
const STATE_BOUND: u8 = 2;
const STATE_DELETED: u8 = 3;

struct TableFile<C> {
    channel: C,
    next: u64,
}

/// Identity table persisted as fixed-width records on a storage channel.
pub struct PersistentIdentityTable<O, C> {
    file: Mutex<TableFile<C>>,
    _kind: PhantomData<fn() -> O>,
}

impl<O: Oid, C: StorageChannel> PersistentIdentityTable<O, C> {
    /// Open the table stored in `channel`, initializing an empty channel.
    pub fn open(mut channel: C) -> OidResult<Self> {
        let next = if channel.is_empty()? {
            let mut header = Vec::with_capacity(HEADER_SIZE as usize);
            header.extend_from_slice(MAGIC);
            header.extend_from_slice(&VERSION.to_be_bytes());
            header.extend_from_slice(&1u64.to_be_bytes());
            channel.set_position(0)?;
            channel.write_bytes(&header)?;
            channel.flush()?;
            1
        } else {
            let magic = channel.read_at(0, 4)?;
            if magic != MAGIC {
                return Err(OidError::CorruptHeader(format!("bad magic {magic:?}")));
            }
            let version = channel.read_u32_at(4)?;
            if version != VERSION {
                return Err(OidError::CorruptHeader(format!(
                    "unsupported version {version}"
                )));
            }
            let next = channel.read_u64_at(NEXT_OFFSET)?;
            if next == 0 {
                return Err(OidError::CorruptHeader("next value is zero".into()));
            }
            next
        };

        info!(kind = %O::KIND, next, "opened identity table");
        Ok(Self {
            file: Mutex::new(TableFile { channel, next }),
            _kind: PhantomData,
        })
    }

    /// Flush pending writes to stable storage.
    pub fn flush(&self) -> OidResult<()> {
        self.file.lock().expect("lock poisoned").channel.flush()?;
        Ok(())
    }

    /// Close the table, returning its channel.
    pub fn into_channel(self) -> C {
        self.file.into_inner().expect("lock poisoned").channel
    }
}

fn record_offset(value: u64) -> u64 {
    HEADER_SIZE + (value - 1) * RECORD_SIZE
}

fn encode_record(state: OidState) -> [u8; RECORD_SIZE as usize] {
    let (tag, position) = match state {
        OidState::Free => (STATE_FREE, 0),
        OidState::Allocated => (STATE_ALLOCATED, 0),
        OidState::Bound(position) => (STATE_BOUND, position.offset()),
        OidState::Deleted => (STATE_DELETED, 0),
    };
    let mut record = [0u8; RECORD_SIZE as usize];
    record[0] = tag;
    record[1..9].copy_from_slice(&position.to_be_bytes());
    let crc = crc32fast::hash(&record[..9]);
    record[9..].copy_from_slice(&crc.to_be_bytes());
    record
}

fn decode_record(value: u64, record: &[u8]) -> OidResult<OidState> {
    let corrupt = |reason: String| OidError::CorruptRecord { value, reason };
    if record.len() != RECORD_SIZE as usize {
        return Err(corrupt(format!("record is {} bytes", record.len())));
    }
    // Zero fill left behind when a later record was written first.
    if record.iter().all(|b| *b == 0) {
        return Ok(OidState::Free);
    }

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&record[9..]);
    let expected = u32::from_be_bytes(crc_bytes);
    let actual = crc32fast::hash(&record[..9]);
    if expected != actual {
        warn!(value, expected, actual, "identity record CRC mismatch");
        return Err(corrupt(format!(
            "crc mismatch: expected {expected:#010x}, got {actual:#010x}"
        )));
    }

    let mut position_bytes = [0u8; 8];
    position_bytes.copy_from_slice(&record[1..9]);
    let position = u64::from_be_bytes(position_bytes);
    match record[0] {
        STATE_FREE => Ok(OidState::Free),
        STATE_ALLOCATED => Ok(OidState::Allocated),
        STATE_BOUND => Ok(OidState::Bound(Position::new(position))),
        STATE_DELETED => Ok(OidState::Deleted),
        other => Err(corrupt(format!("unknown state tag {other}"))),
    }
}

impl<C: StorageChannel> TableFile<C> {
    fn read_state(&mut self, value: u64) -> OidResult<OidState> {
        if value == 0 || value >= self.next {
            return Ok(OidState::Free);
        }
        let offset = record_offset(value);
        if offset + RECORD_SIZE > self.channel.len()? {
            return Ok(OidState::Free);
        }
        let record = self.channel.read_at(offset, RECORD_SIZE as usize)?;
        decode_record(value, &record)
    }

    fn write_state(&mut self, value: u64, state: OidState) -> OidResult<()> {
        self.channel.set_position(record_offset(value))?;
        self.channel.write_bytes(&encode_record(state))?;
        Ok(())
    }

    fn write_next(&mut self, next: u64) -> OidResult<()> {
        self.channel.set_position(NEXT_OFFSET)?;
        self.channel.write_u64(next)?;
        self.next = next;
        Ok(())
    }
}

impl<O: Oid, C: StorageChannel> IdentityTable<O> for PersistentIdentityTable<O, C> {
    fn allocate(&self) -> OidResult<O> {
        let mut file = self.file.lock().expect("lock poisoned");
        let value = file.next;
        let oid = O::from_value(value);

        // A record written past a stale header would otherwise be reissued.
        let offset = record_offset(value);
        if offset + RECORD_SIZE <= file.channel.len()? {
            let record = file.channel.read_at(offset, RECORD_SIZE as usize)?;
            if decode_record(value, &record)?.is_live() {
                return Err(OidError::duplicate(oid));
            }
        }

        file.write_next(value + 1)?;
        file.write_state(value, OidState::Allocated)?;
        debug!(%oid, "allocated identifier");
        Ok(oid)
    }

    fn bind(&self, oid: O, position: Position) -> OidResult<()> {
        let mut file = self.file.lock().expect("lock poisoned");
        let state = file.read_state(oid.value())?;
        require_live(oid, state)?;
        file.write_state(oid.value(), OidState::Bound(position))
    }

    fn invalidate(&self, oid: O) -> OidResult<()> {
        let mut file = self.file.lock().expect("lock poisoned");
        let state = file.read_state(oid.value())?;
        require_live(oid, state)?;
        file.write_state(oid.value(), OidState::Deleted)?;
        debug!(%oid, "invalidated identifier");
        Ok(())
    }

    fn state(&self, oid: O) -> OidResult<OidState> {
        self.file
            .lock()
            .expect("lock poisoned")
            .read_state(oid.value())
    }

    fn live_ids(&self) -> OidResult<Vec<O>> {
        let mut file = self.file.lock().expect("lock poisoned");
        let len = file.channel.len()?;
        if len <= HEADER_SIZE || file.next <= 1 {
            return Ok(Vec::new());
        }

        let stored = (len - HEADER_SIZE) / RECORD_SIZE;
        let count = stored.min(file.next - 1);
        let region = file
            .channel
            .read_at(HEADER_SIZE, (count * RECORD_SIZE) as usize)?;

        let mut ids = Vec::new();
        for (index, record) in region.chunks_exact(RECORD_SIZE as usize).enumerate() {
            let value = index as u64 + 1;
            if decode_record(value, record)?.is_live() {
                ids.push(O::from_value(value));
            }
        }
        Ok(ids)
    }

    fn next_value(&self) -> u64 {
        self.file.lock().expect("lock poisoned").next
    }
}

impl<O: Oid, C> std::fmt::Debug for PersistentIdentityTable<O, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentIdentityTable")
            .field("kind", &O::KIND)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdb_io::{ChannelConfig, FileChannel, MemoryChannel};
    use objdb_types::{ClassOid, ObjectOid};

    fn table() -> PersistentIdentityTable<ObjectOid, MemoryChannel> {
        PersistentIdentityTable::open(MemoryChannel::new()).unwrap()
    }

    #[test]
    fn empty_channel_gets_header() {
        let table = table();
        assert_eq!(table.next_value(), 1);
        let bytes = table.into_channel().into_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE as usize);
        assert_eq!(&bytes[..4], MAGIC);
    }

    #[test]
    fn lifecycle() {
        let table = table();
        let oid = table.allocate().unwrap();
        assert_eq!(oid, ObjectOid::new(1));
        assert!(matches!(table.resolve(oid), Err(OidError::UnboundOid { .. })));

        table.bind(oid, Position::new(4096)).unwrap();
        assert_eq!(table.resolve(oid).unwrap(), Position::new(4096));

        table.invalidate(oid).unwrap();
        assert!(matches!(table.resolve(oid), Err(OidError::DeletedOid { .. })));
        assert!(matches!(
            table.resolve(ObjectOid::new(99)),
            Err(OidError::UnknownOid { .. })
        ));
    }

    #[test]
    fn records_have_fixed_offsets() {
        let table = table();
        for _ in 0..3 {
            table.allocate().unwrap();
        }
        table.bind(ObjectOid::new(2), Position::new(7)).unwrap();
        let bytes = table.into_channel().into_bytes();
        assert_eq!(bytes.len(), (HEADER_SIZE + 3 * RECORD_SIZE) as usize);

        let second = &bytes[record_offset(2) as usize..record_offset(3) as usize];
        assert_eq!(second[0], STATE_BOUND);
        assert_eq!(&second[1..9], &7u64.to_be_bytes());
    }

    #[test]
    fn state_survives_reopen() {
        let table = table();
        let a = table.allocate().unwrap();
        let b = table.allocate().unwrap();
        let c = table.allocate().unwrap();
        table.bind(a, Position::new(10)).unwrap();
        table.bind(c, Position::new(30)).unwrap();
        table.invalidate(b).unwrap();

        let reopened =
            PersistentIdentityTable::<ObjectOid, _>::open(table.into_channel()).unwrap();
        assert_eq!(reopened.next_value(), 4);
        assert_eq!(reopened.resolve(a).unwrap(), Position::new(10));
        assert!(matches!(reopened.resolve(b), Err(OidError::DeletedOid { .. })));
        assert_eq!(reopened.live_ids().unwrap(), vec![a, c]);

        let d = reopened.allocate().unwrap();
        assert_eq!(d, ObjectOid::new(4));
    }

    #[test]
    fn corrupted_record_detected() {
        let table = table();
        let oid = table.allocate().unwrap();
        table.bind(oid, Position::new(5)).unwrap();

        let mut channel = table.into_channel();
        let at = record_offset(1) as usize + 3;
        channel.bytes_mut()[at] ^= 0x40;

        let reopened = PersistentIdentityTable::<ObjectOid, _>::open(channel).unwrap();
        assert!(matches!(
            reopened.resolve(oid),
            Err(OidError::CorruptRecord { value: 1, .. })
        ));
    }

    #[test]
    fn stale_header_does_not_reissue() {
        let table = table();
        table.allocate().unwrap();
        let mut channel = table.into_channel();
        // Roll the counter back as if the header write was lost.
        channel.set_position(NEXT_OFFSET).unwrap();
        channel.write_u64(1).unwrap();

        let reopened = PersistentIdentityTable::<ObjectOid, _>::open(channel).unwrap();
        assert!(matches!(
            reopened.allocate(),
            Err(OidError::DuplicateOidAllocation { value: 1, .. })
        ));
    }

    #[test]
    fn missing_record_reads_free() {
        let table = table();
        table.allocate().unwrap();
        let mut channel = table.into_channel();
        // Header advanced but the record never landed.
        let len = channel.as_bytes().len() - RECORD_SIZE as usize;
        channel.bytes_mut().truncate(len);

        let reopened = PersistentIdentityTable::<ObjectOid, _>::open(channel).unwrap();
        assert_eq!(reopened.state(ObjectOid::new(1)).unwrap(), OidState::Free);
        assert_eq!(reopened.allocate().unwrap(), ObjectOid::new(2));
        assert_eq!(reopened.state(ObjectOid::new(1)).unwrap(), OidState::Free);
        assert_eq!(reopened.live_ids().unwrap(), vec![ObjectOid::new(2)]);
    }

    #[test]
    fn bad_magic_rejected() {
        let channel = MemoryChannel::from_bytes(vec![0u8; 16]);
        assert!(matches!(
            PersistentIdentityTable::<ClassOid, _>::open(channel),
            Err(OidError::CorruptHeader(_))
        ));
    }

    #[test]
    fn file_backed_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.odbi");
        let config = ChannelConfig::default();

        let oid = {
            let channel = FileChannel::create(&path, &config).unwrap();
            let table = PersistentIdentityTable::<ObjectOid, _>::open(channel).unwrap();
            let oid = table.allocate().unwrap();
            table.bind(oid, Position::new(512)).unwrap();
            table.flush().unwrap();
            oid
        };

        let channel = FileChannel::open(&path, &config).unwrap();
        let table = PersistentIdentityTable::<ObjectOid, _>::open(channel).unwrap();
        assert_eq!(table.resolve(oid).unwrap(), Position::new(512));
    }

    proptest::proptest! {
        #[test]
        fn reopen_preserves_live_set(ops in proptest::collection::vec(0u8..3, 1..100)) {
            let table = table();
            let mut live: Vec<ObjectOid> = Vec::new();
            for (i, op) in ops.into_iter().enumerate() {
                match op {
                    0 => live.push(table.allocate().unwrap()),
                    1 if !live.is_empty() => {
                        let oid = live[i % live.len()];
                        table.bind(oid, Position::new(i as u64)).unwrap();
                    }
                    2 if !live.is_empty() => {
                        let oid = live.remove(i % live.len());
                        table.invalidate(oid).unwrap();
                    }
                    _ => {}
                }
            }
            let reopened = PersistentIdentityTable::<ObjectOid, _>::open(table.into_channel()).unwrap();
            live.sort();
            proptest::prop_assert_eq!(reopened.live_ids().unwrap(), live);
        }
    }
}
