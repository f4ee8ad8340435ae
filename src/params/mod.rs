//! # Parameter Store
//!
//! In-memory table of tunable `f32` parameters, durable load/save with
//! checksum verification, and the per-tick transmit state machine that
//! streams `PARAM_VALUE` messages to the ground link.
//!
//! Two sources feed [`ParameterStore::transmit_step`]:
//! - a bounded queue of remote-requested entries, which always wins
//! - a local sweep cursor over the table, which is idle when it equals the
//!   table length

pub mod checksum;
pub mod storage;

pub use storage::{FileStorage, LoadOutcome, LoadStrategy, MemoryStorage, Storage, StorageLayout};

use crate::error::Result;
use heapless::Deque;
use tracing::{debug, info, warn};

/// Longest parameter name (MAVLink `param_id` width)
pub const PARAM_NAME_LEN: usize = 16;

/// Capacity of the remote-request queue
pub const PARAM_QUEUE_LEN: usize = 8;

/// Compiled-in parameter defaults
pub const DEFAULT_PARAMS: &[(&str, f32)] = &[
    ("MAV_ID", 0.0),
    ("GPS_SAFALT", 3.0),
    ("GPS_MXANGL", 0.35),
    ("GPS_MAXSPD", 1.0),
    ("GPS_MAXROT", 1.5),
    ("GPS_MAXADF", 3.0),
    ("GPS_MINRAD", 2.0),
    ("GPS_Kp", 0.03),
    ("GPS_Ki", 0.0),
    ("GPS_Kd", 0.1),
];

/// Bounded parameter name; longer input is truncated, a NUL ends it early
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamName(heapless::Vec<u8, PARAM_NAME_LEN>);

impl ParamName {
    pub fn new(name: &str) -> Self {
        Self::from_bytes(name.as_bytes())
    }

    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut name = heapless::Vec::new();
        for &byte in raw.iter().take(PARAM_NAME_LEN) {
            if byte == 0 {
                break;
            }
            let _ = name.push(byte);
        }
        Self(name)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// NUL-padded form used on the wire
    pub fn to_array(&self) -> [u8; PARAM_NAME_LEN] {
        let mut array = [0u8; PARAM_NAME_LEN];
        array[..self.0.len()].copy_from_slice(&self.0);
        array
    }
}

impl std::fmt::Display for ParamName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// One named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamEntry {
    pub name: ParamName,
    pub value: f32,
}

/// Which transmit source produced an outbound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Served from the remote-request queue
    Queued,
    /// Served by the local sweep cursor
    Sweep,
}

/// One `PARAM_VALUE` to send
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundParam {
    pub name: ParamName,
    pub value: f32,
    pub index: u16,
    pub count: u16,
    pub source: ParamSource,
}

/// Parameter table with durable storage and transmit state
#[derive(Debug)]
pub struct ParameterStore {
    entries: Vec<ParamEntry>,
    layout: StorageLayout,
    /// Next local index to send; `entries.len()` means idle
    cursor: usize,
    single: bool,
    queue: Deque<OutboundParam, PARAM_QUEUE_LEN>,
    /// Another component shares the ground link's parameter transfer
    peer_tracking: bool,
    /// That component has a transfer in flight
    ack_pending: bool,
}

impl ParameterStore {
    /// Store holding [`DEFAULT_PARAMS`]
    pub fn with_defaults(layout: StorageLayout) -> Self {
        let entries = DEFAULT_PARAMS
            .iter()
            .map(|&(name, value)| ParamEntry {
                name: ParamName::new(name),
                value,
            })
            .collect();
        Self::from_entries(entries, layout)
    }

    pub fn from_entries(entries: Vec<ParamEntry>, layout: StorageLayout) -> Self {
        let cursor = entries.len();
        Self {
            entries,
            layout,
            cursor,
            single: false,
            queue: Deque::new(),
            peer_tracking: false,
            ack_pending: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ParamEntry> {
        self.entries.get(index)
    }

    /// Index of the parameter called `name`
    pub fn find(&self, name: &ParamName) -> Option<usize> {
        self.entries.iter().position(|entry| entry.name == *name)
    }

    /// Set the value at `index`; returns false if out of range
    pub fn set(&mut self, index: usize, value: f32) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                debug!("Parameter {} = {}", entry.name, value);
                entry.value = value;
                true
            }
            None => false,
        }
    }

    /// Set the value of the parameter called `name`, returning its index
    pub fn set_by_name(&mut self, name: &ParamName, value: f32) -> Option<usize> {
        let index = self.find(name)?;
        self.set(index, value);
        Some(index)
    }

    /// Outbound record for the local entry at `index`
    pub fn outbound(&self, index: usize, source: ParamSource) -> Option<OutboundParam> {
        let entry = self.entries.get(index)?;
        Some(OutboundParam {
            name: entry.name.clone(),
            value: entry.value,
            index: index as u16,
            count: self.entries.len() as u16,
            source,
        })
    }

    /// Arm a full local sweep from index 0
    pub fn start_sweep(&mut self) {
        info!("Starting parameter sweep of {} entries", self.entries.len());
        self.single = false;
        self.cursor = 0;
    }

    /// Arm a single send of the entry at `index`
    pub fn request_single(&mut self, index: usize) -> bool {
        if index >= self.entries.len() {
            debug!("Ignoring request for parameter index {}", index);
            return false;
        }
        self.single = true;
        self.cursor = index;
        true
    }

    /// Whether the local sweep is idle
    pub fn sweep_idle(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Queue a remote-requested value; dropped when the queue is full
    pub fn enqueue(&mut self, param: OutboundParam) -> bool {
        match self.queue.push_back(param) {
            Ok(()) => true,
            Err(param) => {
                warn!("Parameter queue full, dropping {}", param.name);
                false
            }
        }
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Enable or disable gating the sweep on another component's transfer
    pub fn set_peer_tracking(&mut self, enabled: bool) {
        self.peer_tracking = enabled;
        if !enabled {
            self.ack_pending = false;
        }
    }

    /// Mark the other component as mid-transfer
    pub fn await_peer(&mut self) {
        self.ack_pending = true;
    }

    pub fn ack_pending(&self) -> bool {
        self.ack_pending
    }

    /// Produce at most one parameter to send this cycle
    ///
    /// The queue is served first and clears the ack-pending flag. Otherwise
    /// the sweep cursor advances, subject to the peer gate; in single mode
    /// the cursor returns to idle after one send.
    pub fn transmit_step(&mut self) -> Option<OutboundParam> {
        if let Some(param) = self.queue.pop_front() {
            self.ack_pending = false;
            return Some(param);
        }

        if self.sweep_idle() || (self.peer_tracking && self.ack_pending) {
            return None;
        }

        let index = self.cursor;
        let param = self.outbound(index, ParamSource::Sweep);
        if self.single {
            self.single = false;
            self.cursor = self.entries.len();
        } else {
            self.cursor = index + 1;
        }
        param
    }

    /// Adopt persisted values if their checksum verifies
    ///
    /// # Errors
    ///
    /// Returns error only if the storage itself fails
    pub fn load<S: Storage + ?Sized>(
        &mut self,
        storage: &mut S,
        strategy: LoadStrategy,
    ) -> Result<LoadOutcome> {
        let mut values: Vec<f32> = self.entries.iter().map(|entry| entry.value).collect();
        let outcome = storage::load_values(storage, &self.layout, strategy, &mut values)?;
        if outcome == LoadOutcome::Loaded {
            for (entry, value) in self.entries.iter_mut().zip(values) {
                entry.value = value;
            }
        }
        Ok(outcome)
    }

    /// Persist the table, returning the number of storage writes issued
    ///
    /// # Errors
    ///
    /// Returns error if the storage fails
    pub fn save<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<usize> {
        let values: Vec<f32> = self.entries.iter().map(|entry| entry.value).collect();
        storage::save_values(storage, &self.layout, &values)
    }
}
