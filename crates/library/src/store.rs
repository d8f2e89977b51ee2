use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::MediaRecord;
use parking_lot::RwLock;
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use serde::{Deserialize, Serialize};

const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");
const RECORD_ORDER_TABLE: TableDefinition<u64, &str> = TableDefinition::new("record_order");
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

const META_NEXT_SEQ_KEY: &str = "next_seq";

/// Persistence for the catalog. `list_all` returns records in catalog order,
/// which is insertion order for the stores in this crate.
pub trait CatalogStore {
    fn list_all(&self) -> Result<Vec<MediaRecord>, StoreError>;
    /// Inserts every record or none of them.
    fn insert_many(&self, records: &[MediaRecord]) -> Result<(), StoreError>;
    fn get_by_id(&self, id: &str) -> Result<Option<MediaRecord>, StoreError>;
    fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    DuplicateId(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Redb(err) => write!(f, "db error: {}", err),
            StoreError::Bincode(err) => write!(f, "bincode error: {}", err),
            StoreError::DuplicateId(id) => write!(f, "record id already exists: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(err)
    }
}

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TableError> for StoreError {
    fn from(err: TableError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<CommitError> for StoreError {
    fn from(err: CommitError) -> Self {
        StoreError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        StoreError::Bincode(err)
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    seq: u64,
    record: MediaRecord,
}

/// Catalog kept in a redb file. Records live under their id; a sequence
/// table keeps insertion order for `list_all`.
#[derive(Clone)]
pub struct RedbCatalog {
    db: Arc<Database>,
}

impl RedbCatalog {
    pub fn open(path: &Path) -> Result<Self, crate::LibraryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let db = if path.exists() {
            Database::open(path).map_err(StoreError::from)?
        } else {
            Database::create(path).map_err(StoreError::from)?
        };
        Ok(Self::with_db(Arc::new(db)))
    }

    pub fn with_db(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn init_tables(&self) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(RECORDS_TABLE)?;
            let _ = write_txn.open_table(RECORD_ORDER_TABLE)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn db(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }
}

impl CatalogStore for RedbCatalog {
    fn list_all(&self) -> Result<Vec<MediaRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let order_table = match read_txn.open_table(RECORD_ORDER_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let records_table = read_txn.open_table(RECORDS_TABLE)?;

        let mut records = Vec::new();
        for entry in order_table.iter()? {
            let entry = entry?;
            let id = entry.1.value();
            if let Some(value) = records_table.get(id)? {
                let stored: StoredRecord = decode_value(value.value())?;
                records.push(stored.record);
            }
        }
        Ok(records)
    }

    fn insert_many(&self, records: &[MediaRecord]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut meta_table = write_txn.open_table(META_TABLE)?;
            let mut records_table = write_txn.open_table(RECORDS_TABLE)?;
            let mut order_table = write_txn.open_table(RECORD_ORDER_TABLE)?;

            let mut next_seq = match meta_table.get(META_NEXT_SEQ_KEY)? {
                Some(value) => value.value(),
                None => 0,
            };
            for record in records {
                if records_table.get(record.id.as_str())?.is_some() {
                    // Dropping the transaction without commit discards the batch.
                    return Err(StoreError::DuplicateId(record.id.clone()));
                }
                let stored = StoredRecord {
                    seq: next_seq,
                    record: record.clone(),
                };
                let bytes = encode_value(&stored)?;
                records_table.insert(record.id.as_str(), bytes.as_slice())?;
                order_table.insert(next_seq, record.id.as_str())?;
                next_seq += 1;
            }
            meta_table.insert(META_NEXT_SEQ_KEY, next_seq)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<MediaRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(RECORDS_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record = match table.get(id)? {
            Some(value) => Some(decode_value::<StoredRecord>(value.value())?.record),
            None => None,
        };
        Ok(record)
    }

    fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut records_table = write_txn.open_table(RECORDS_TABLE)?;
            let mut order_table = write_txn.open_table(RECORD_ORDER_TABLE)?;
            let removed = match records_table.remove(id)? {
                Some(value) => Some(decode_value::<StoredRecord>(value.value())?),
                None => None,
            };
            if let Some(stored) = removed {
                order_table.remove(stored.seq)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// Catalog held in memory, in insertion order.
#[derive(Default)]
pub struct MemoryCatalog {
    records: RwLock<Vec<MediaRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl CatalogStore for MemoryCatalog {
    fn list_all(&self) -> Result<Vec<MediaRecord>, StoreError> {
        Ok(self.records.read().clone())
    }

    fn insert_many(&self, records: &[MediaRecord]) -> Result<(), StoreError> {
        let mut guard = self.records.write();
        for (idx, record) in records.iter().enumerate() {
            let taken = guard.iter().any(|existing| existing.id == record.id)
                || records[..idx].iter().any(|earlier| earlier.id == record.id);
            if taken {
                return Err(StoreError::DuplicateId(record.id.clone()));
            }
        }
        guard.extend_from_slice(records);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<MediaRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|record| record.id == id)
            .cloned())
    }

    fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.records.write().retain(|record| record.id != id);
        Ok(())
    }
}

fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}
