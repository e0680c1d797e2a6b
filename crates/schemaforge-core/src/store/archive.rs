//! Versioned archive of activated schema snapshots.

use crate::catalog::SchemaSnapshot;
use crate::error::Error;
use parking_lot::RwLock;
use sled::{Db, Tree};
use std::sync::atomic::{AtomicU64, Ordering};

/// Tree name for archived snapshots.
const SNAPSHOT_TREE: &str = "schema:snapshots";

/// Tree name for archive metadata.
const META_TREE: &str = "schema:meta";

/// Key for the latest archived generation in the meta tree.
const CURRENT_GENERATION_KEY: &[u8] = b"current_generation";

/// Sled-backed archive of the snapshot behind every activated generation.
pub struct SnapshotArchive {
    snapshot_tree: Tree,
    meta_tree: Tree,
    current_generation: AtomicU64,
    current: RwLock<Option<SchemaSnapshot>>,
}

impl SnapshotArchive {
    /// Open or create an archive using the given sled database.
    pub fn open(db: &Db) -> Result<Self, Error> {
        let snapshot_tree = db.open_tree(SNAPSHOT_TREE)?;
        let meta_tree = db.open_tree(META_TREE)?;

        let current_generation = match meta_tree.get(CURRENT_GENERATION_KEY)? {
            Some(bytes) => decode_u64(&bytes)?,
            None => 0,
        };

        let archive = Self {
            snapshot_tree,
            meta_tree,
            current_generation: AtomicU64::new(current_generation),
            current: RwLock::new(None),
        };

        if current_generation > 0 {
            if let Some(snapshot) = archive.at_generation(current_generation)? {
                *archive.current.write() = Some(snapshot);
            }
        }

        Ok(archive)
    }

    /// Latest archived generation, 0 when empty.
    pub fn current_generation(&self) -> u64 {
        self.current_generation.load(Ordering::SeqCst)
    }

    /// Latest archived snapshot.
    pub fn current(&self) -> Option<SchemaSnapshot> {
        self.current.read().clone()
    }

    /// Snapshot archived for a specific generation.
    pub fn at_generation(&self, generation: u64) -> Result<Option<SchemaSnapshot>, Error> {
        match self.snapshot_tree.get(generation.to_be_bytes())? {
            Some(bytes) => Ok(Some(SchemaSnapshot::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Archive a snapshot as the next generation. Returns the generation.
    pub fn record(&self, snapshot: &SchemaSnapshot) -> Result<u64, Error> {
        let generation = self.current_generation() + 1;

        self.snapshot_tree
            .insert(generation.to_be_bytes(), snapshot.to_bytes()?)?;
        self.meta_tree
            .insert(CURRENT_GENERATION_KEY, &generation.to_be_bytes())?;

        self.current_generation.store(generation, Ordering::SeqCst);
        *self.current.write() = Some(snapshot.clone());

        Ok(generation)
    }

    /// Generations currently held, oldest first.
    pub fn generations(&self) -> Result<Vec<u64>, Error> {
        self.snapshot_tree
            .iter()
            .keys()
            .map(|key| decode_u64(&key?))
            .collect()
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.snapshot_tree.flush()?;
        self.meta_tree.flush()?;
        Ok(())
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64, Error> {
    let buf: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::InvalidData(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(buf))
}
