//! # Durable Parameter Storage
//!
//! Layout: `N` little-endian `f32` slots starting at the configured offset,
//! immediately followed by the checksum pair (A, then B). `N` is the table
//! length bounded by the configured maximum.
//!
//! Loading verifies the checksum before adopting anything. Saving rewrites
//! only slots whose bytes differ, to keep storage wear down.

use super::checksum::ParamChecksum;
use crate::error::{BeaconError, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, info};

/// Bytes per persisted value
pub const PARAM_SLOT_LEN: usize = 4;

/// Byte-granular persistent storage
pub trait Storage {
    /// Read `buf.len()` bytes starting at `offset`
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Where and how parameters are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLayout {
    pub offset: usize,
    pub version: u8,
    pub max_params: usize,
}

impl StorageLayout {
    /// Number of slots persisted for a table of `len` parameters
    pub fn slots(&self, len: usize) -> usize {
        len.min(self.max_params)
    }

    pub fn slot_offset(&self, index: usize) -> usize {
        self.offset + index * PARAM_SLOT_LEN
    }

    pub fn checksum_offset(&self, slots: usize) -> usize {
        self.slot_offset(slots)
    }
}

/// How [`load`](super::ParameterStore::load) reads the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// Read values and checksum in one scratch buffer
    Block,
    /// Verify one slot at a time, then read the slots again to adopt them
    #[default]
    Streaming,
}

/// Result of a durable load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Checksum matched, persisted values adopted
    Loaded,
    /// Checksum mismatch, compiled defaults kept
    Defaults,
}

/// Verify and read persisted values into `values`
pub(crate) fn load_values<S: Storage + ?Sized>(
    storage: &mut S,
    layout: &StorageLayout,
    strategy: LoadStrategy,
    values: &mut [f32],
) -> Result<LoadOutcome> {
    let slots = layout.slots(values.len());
    let outcome = match strategy {
        LoadStrategy::Block => load_block(storage, layout, &mut values[..slots])?,
        LoadStrategy::Streaming => load_streaming(storage, layout, &mut values[..slots])?,
    };

    match outcome {
        LoadOutcome::Loaded => info!("Loaded {} parameters from storage", slots),
        LoadOutcome::Defaults => info!("Parameter checksum mismatch, keeping defaults"),
    }
    Ok(outcome)
}

fn load_block<S: Storage + ?Sized>(
    storage: &mut S,
    layout: &StorageLayout,
    values: &mut [f32],
) -> Result<LoadOutcome> {
    let data_len = values.len() * PARAM_SLOT_LEN;
    let mut scratch = vec![0u8; data_len + 2];
    storage.read(layout.offset, &mut scratch)?;

    let mut checksum = ParamChecksum::new(layout.version);
    checksum.update(&scratch[..data_len]);
    if checksum.bytes() != scratch[data_len..] {
        return Ok(LoadOutcome::Defaults);
    }

    for (value, slot) in values.iter_mut().zip(scratch.chunks_exact(PARAM_SLOT_LEN)) {
        *value = f32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
    }
    Ok(LoadOutcome::Loaded)
}

fn load_streaming<S: Storage + ?Sized>(
    storage: &mut S,
    layout: &StorageLayout,
    values: &mut [f32],
) -> Result<LoadOutcome> {
    let mut checksum = ParamChecksum::new(layout.version);
    let mut slot = [0u8; PARAM_SLOT_LEN];
    for index in 0..values.len() {
        storage.read(layout.slot_offset(index), &mut slot)?;
        checksum.update(&slot);
    }

    let mut stored = [0u8; 2];
    storage.read(layout.checksum_offset(values.len()), &mut stored)?;
    if checksum.bytes() != stored {
        return Ok(LoadOutcome::Defaults);
    }

    for (index, value) in values.iter_mut().enumerate() {
        storage.read(layout.slot_offset(index), &mut slot)?;
        *value = f32::from_le_bytes(slot);
    }
    Ok(LoadOutcome::Loaded)
}

/// Persist `values`, returning how many writes were issued
///
/// The checksum is computed over the values held in memory, not over what
/// storage returned.
pub(crate) fn save_values<S: Storage + ?Sized>(
    storage: &mut S,
    layout: &StorageLayout,
    values: &[f32],
) -> Result<usize> {
    let slots = layout.slots(values.len());
    let mut checksum = ParamChecksum::new(layout.version);
    let mut writes = 0;
    let mut stored = [0u8; PARAM_SLOT_LEN];

    for (index, value) in values[..slots].iter().enumerate() {
        let bytes = value.to_le_bytes();
        storage.read(layout.slot_offset(index), &mut stored)?;
        if stored != bytes {
            storage.write(layout.slot_offset(index), &bytes)?;
            writes += 1;
        }
        checksum.update(&bytes);
    }

    let mut stored_checksum = [0u8; 2];
    storage.read(layout.checksum_offset(slots), &mut stored_checksum)?;
    if stored_checksum != checksum.bytes() {
        storage.write(layout.checksum_offset(slots), &checksum.bytes())?;
        writes += 1;
    }

    debug!("Saved {} parameters with {} writes", slots, writes);
    Ok(writes)
}

fn out_of_range(offset: usize, len: usize, size: usize) -> BeaconError {
    BeaconError::Storage(format!(
        "Access of {} bytes at offset {} exceeds storage size {}",
        len, offset, size
    ))
}

/// Erased-EEPROM image held in memory
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
    writes: usize,
}

impl MemoryStorage {
    /// Storage of `size` bytes, erased to `0xFF`
    pub fn new(size: usize) -> Self {
        Self {
            bytes: vec![0xFF; size],
            writes: 0,
        }
    }

    /// Number of write operations issued so far
    pub fn write_count(&self) -> usize {
        self.writes
    }

    #[cfg(test)]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[cfg(test)]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Storage for MemoryStorage {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let src = self
            .bytes
            .get(offset..offset + buf.len())
            .ok_or_else(|| out_of_range(offset, buf.len(), self.bytes.len()))?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let size = self.bytes.len();
        let dst = self
            .bytes
            .get_mut(offset..offset + data.len())
            .ok_or_else(|| out_of_range(offset, data.len(), size))?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

/// EEPROM image kept in a file on the host
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    size: usize,
}

impl FileStorage {
    /// Open or create the image at `path`, extending it to `size` bytes of `0xFF`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or extended
    pub fn open<P: AsRef<Path>>(path: P, size: usize) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let current = file.metadata()?.len() as usize;
        if current < size {
            file.seek(SeekFrom::Start(current as u64))?;
            file.write_all(&vec![0xFF; size - current])?;
            file.flush()?;
            debug!(
                "Extended parameter image {} to {} bytes",
                path.as_ref().display(),
                size
            );
        }

        Ok(Self { file, size })
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset + len > self.size {
            return Err(out_of_range(offset, len, self.size));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<()> {
        self.check(offset, buf.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check(offset, data.len())?;
        self.file.seek(SeekFrom::Start(offset as u64))?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LAYOUT: StorageLayout = StorageLayout {
        offset: 16,
        version: 1,
        max_params: 64,
    };

    #[test]
    fn test_erased_storage_loads_defaults() {
        let mut storage = MemoryStorage::new(256);
        let mut values = [1.0f32, 2.0];

        for strategy in [LoadStrategy::Block, LoadStrategy::Streaming] {
            let outcome = load_values(&mut storage, &LAYOUT, strategy, &mut values).unwrap();
            assert_eq!(outcome, LoadOutcome::Defaults);
            assert_eq!(values, [1.0, 2.0]);
        }
    }

    #[test]
    fn test_save_then_load() {
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &LAYOUT, &[0.5, -3.25, 1e-3]).unwrap();

        for strategy in [LoadStrategy::Block, LoadStrategy::Streaming] {
            let mut values = [0.0f32; 3];
            let outcome = load_values(&mut storage, &LAYOUT, strategy, &mut values).unwrap();
            assert_eq!(outcome, LoadOutcome::Loaded);
            assert_eq!(values, [0.5, -3.25, 1e-3]);
        }
    }

    #[test]
    fn test_layout_positions() {
        let mut storage = MemoryStorage::new(256);
        let values = [1.0f32, 2.0];
        save_values(&mut storage, &LAYOUT, &values).unwrap();

        let bytes = storage.as_bytes();
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &2.0f32.to_le_bytes());

        let mut checksum = ParamChecksum::new(1);
        checksum.update(&bytes[16..24]);
        assert_eq!(&bytes[24..26], &checksum.bytes());
        // untouched beyond the checksum
        assert_eq!(bytes[26], 0xFF);
        assert_eq!(bytes[15], 0xFF);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &LAYOUT, &[4.0]).unwrap();

        let other = StorageLayout { version: 2, ..LAYOUT };
        let mut values = [0.0f32];
        let outcome = load_values(&mut storage, &other, LoadStrategy::Block, &mut values).unwrap();
        assert_eq!(outcome, LoadOutcome::Defaults);
        assert_eq!(values, [0.0]);
    }

    #[test]
    fn test_unchanged_save_writes_nothing() {
        let mut storage = MemoryStorage::new(256);
        let values = [1.0f32, 2.0, 3.0];

        let first = save_values(&mut storage, &LAYOUT, &values).unwrap();
        assert_eq!(first, 4);
        let count = storage.write_count();

        let second = save_values(&mut storage, &LAYOUT, &values).unwrap();
        assert_eq!(second, 0);
        assert_eq!(storage.write_count(), count);
    }

    /// Values whose bits a float comparison would blur
    fn edge_values() -> Vec<f32> {
        vec![
            f32::NAN,
            f32::from_bits(0x7FC0_0001),
            f32::from_bits(0xFFC0_1234),
            f32::from_bits(0xFFFF_FFFF),
            -0.0,
            0.0,
            f32::from_bits(0x0000_0001),
            f32::from_bits(0x807F_FFFF),
            f32::MIN_POSITIVE,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::MAX,
            f32::MIN,
        ]
    }

    #[test]
    fn test_edge_bit_patterns_round_trip() {
        let saved = edge_values();
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &LAYOUT, &saved).unwrap();

        for strategy in [LoadStrategy::Block, LoadStrategy::Streaming] {
            let mut values = vec![1.0f32; saved.len()];
            let outcome = load_values(&mut storage, &LAYOUT, strategy, &mut values).unwrap();
            assert_eq!(outcome, LoadOutcome::Loaded);
            for (loaded, expected) in values.iter().zip(&saved) {
                assert_eq!(loaded.to_bits(), expected.to_bits(), "{:?}", strategy);
            }
        }

        assert_eq!(save_values(&mut storage, &LAYOUT, &saved).unwrap(), 0);
    }

    #[test]
    fn test_each_edge_value_alone_round_trips() {
        for value in edge_values() {
            let mut storage = MemoryStorage::new(64);
            let layout = StorageLayout { offset: 0, ..LAYOUT };
            save_values(&mut storage, &layout, &[value]).unwrap();

            for strategy in [LoadStrategy::Block, LoadStrategy::Streaming] {
                let mut loaded = [0.5f32];
                let outcome = load_values(&mut storage, &layout, strategy, &mut loaded).unwrap();
                assert_eq!(outcome, LoadOutcome::Loaded, "bits 0x{:08X}", value.to_bits());
                assert_eq!(loaded[0].to_bits(), value.to_bits());
            }
            assert_eq!(save_values(&mut storage, &layout, &[value]).unwrap(), 0);
        }
    }

    #[test]
    fn test_changed_nan_payload_is_rewritten() {
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &LAYOUT, &[f32::NAN, 0.0]).unwrap();

        let writes = save_values(&mut storage, &LAYOUT, &[f32::from_bits(0x7FC0_0001), -0.0]).unwrap();
        // both slots plus the checksum pair
        assert_eq!(writes, 3);
    }

    #[test]
    fn test_save_rewrites_only_changed_slot() {
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &LAYOUT, &[1.0, 2.0, 3.0]).unwrap();

        let writes = save_values(&mut storage, &LAYOUT, &[1.0, 2.5, 3.0]).unwrap();
        // one slot plus the checksum pair
        assert_eq!(writes, 2);
    }

    #[test]
    fn test_max_params_bounds_layout() {
        let layout = StorageLayout { max_params: 2, ..LAYOUT };
        let mut storage = MemoryStorage::new(256);
        save_values(&mut storage, &layout, &[1.0, 2.0, 3.0]).unwrap();

        // checksum sits right after the second slot
        assert_ne!(&storage.as_bytes()[24..26], &[0xFF, 0xFF]);
        assert_eq!(&storage.as_bytes()[26..28], &[0xFF, 0xFF]);

        let mut values = [0.0f32, 0.0, 9.0];
        load_values(&mut storage, &layout, LoadStrategy::Streaming, &mut values).unwrap();
        assert_eq!(values, [1.0, 2.0, 9.0]);
    }

    #[test]
    fn test_memory_storage_bounds() {
        let mut storage = MemoryStorage::new(8);
        let mut buf = [0u8; 4];
        assert!(storage.read(6, &mut buf).is_err());
        assert!(matches!(storage.write(7, &[1, 2]), Err(BeaconError::Storage(_))));
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_file_storage_created_erased() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.eeprom");

        let mut storage = FileStorage::open(&path, 64).unwrap();
        let mut buf = [0u8; 4];
        storage.read(60, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
    }

    #[test]
    fn test_file_storage_persists_across_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beacon.eeprom");

        {
            let mut storage = FileStorage::open(&path, 128).unwrap();
            save_values(&mut storage, &LAYOUT, &[0.35, 1.5]).unwrap();
        }

        let mut storage = FileStorage::open(&path, 128).unwrap();
        let mut values = [0.0f32; 2];
        let outcome = load_values(&mut storage, &LAYOUT, LoadStrategy::Block, &mut values).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(values, [0.35, 1.5]);
    }

    #[test]
    fn test_file_storage_bounds() {
        let dir = tempdir().unwrap();
        let mut storage = FileStorage::open(dir.path().join("small.eeprom"), 8).unwrap();
        assert!(storage.write(6, &[0; 4]).is_err());
    }
}
