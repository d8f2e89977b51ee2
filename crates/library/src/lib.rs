mod duplicates;
mod extract;
mod scan;
mod similarity;
mod store;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use common::{library_filepath, MediaRecord};
use metadata::{LoftyReader, MetadataError, MetadataReader};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use duplicates::{find_duplicates, ClusterStrategy, DuplicateGroup, DuplicateOptions};
pub use extract::extract_record;
pub use scan::{diff, list_audio_files};
pub use similarity::{compared_similarity, record_similarity, string_similarity, MatchPolicy};
pub use store::{CatalogStore, MemoryCatalog, RedbCatalog, StoreError};

/// Where the library lives. Asked again on every operation so the root can
/// change between calls.
pub trait RootProvider: Send + Sync {
    fn library_root(&self) -> Option<String>;
}

/// A root fixed at construction time.
#[derive(Clone, Debug, Default)]
pub struct StaticRoot(pub Option<String>);

impl StaticRoot {
    pub fn new(root: impl Into<String>) -> Self {
        Self(Some(root.into()))
    }

    pub fn unset() -> Self {
        Self(None)
    }
}

impl RootProvider for StaticRoot {
    fn library_root(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractFailurePolicy {
    /// The first file that cannot be read fails the sync and nothing is stored.
    #[default]
    Abort,
    /// Unreadable files are reported and left out; the rest are stored.
    Skip,
}

#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// File extensions without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
    pub on_extract_failure: ExtractFailurePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".to_string()],
            on_extract_failure: ExtractFailurePolicy::Abort,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SkippedFile {
    pub filepath: String,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    /// Existing records in catalog order, then new ones in listing order.
    pub records: Vec<MediaRecord>,
    pub inserted: usize,
    pub skipped: Vec<SkippedFile>,
}

pub struct Library<S, M = LoftyReader> {
    store: S,
    reader: M,
    root: Arc<dyn RootProvider>,
    options: SyncOptions,
    sync_lock: Mutex<()>,
}

impl<S: CatalogStore> Library<S, LoftyReader> {
    pub fn new(store: S, root: Arc<dyn RootProvider>) -> Self {
        Self::with_reader(store, LoftyReader, root)
    }
}

impl<S: CatalogStore, M: MetadataReader> Library<S, M> {
    pub fn with_reader(store: S, reader: M, root: Arc<dyn RootProvider>) -> Self {
        Self {
            store,
            reader,
            root,
            options: SyncOptions::default(),
            sync_lock: Mutex::new(()),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Brings the catalog up to date with the files under the library root
    /// and returns the whole catalog. Files already in the catalog are not
    /// read again. New records are stored in one batch, and only when there
    /// are any. Concurrent syncs run one at a time so a new file is never
    /// inserted twice.
    pub fn sync(&self) -> Result<SyncReport, LibraryError> {
        let _guard = self.sync_lock.lock();
        let root = self.configured_root()?;
        let files = list_audio_files(Path::new(&root), &self.options.extensions)?;
        let mut records = self.store.list_all()?;
        let new_files = diff(&files, &records, &root);
        info!(
            "Found {} audio files under {:?}, {} not in catalog",
            files.len(),
            root,
            new_files.len()
        );

        let mut fresh = Vec::with_capacity(new_files.len());
        let mut skipped = Vec::new();
        for relpath in new_files {
            let filepath = library_filepath(&root, relpath);
            match extract_record(&self.reader, &filepath) {
                Ok(record) => {
                    debug!("Read {:?} as {}", filepath, record.id);
                    fresh.push(record);
                }
                Err(err) => match self.options.on_extract_failure {
                    ExtractFailurePolicy::Abort => {
                        warn!("Sync aborted, failed to read {:?}: {}", filepath, err);
                        return Err(err);
                    }
                    ExtractFailurePolicy::Skip => {
                        warn!("Skipping {:?}: {}", filepath, err);
                        skipped.push(SkippedFile {
                            filepath,
                            error: err.to_string(),
                        });
                    }
                },
            }
        }

        let inserted = fresh.len();
        if inserted > 0 {
            self.store.insert_many(&fresh)?;
            info!("Added {} records to catalog", inserted);
        }
        records.extend(fresh);

        Ok(SyncReport {
            records,
            inserted,
            skipped,
        })
    }

    /// Removes a record together with its file. The file goes first; if it
    /// cannot be removed the record stays.
    pub fn delete(&self, id: &str) -> Result<MediaRecord, LibraryError> {
        let record = self
            .store
            .get_by_id(id)?
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

        if !record.filepath.is_empty() {
            if let Err(err) = fs::remove_file(&record.filepath) {
                warn!("Failed to delete {:?}: {}", record.filepath, err);
                return Err(LibraryError::Io(err));
            }
        }

        self.store.delete_by_id(id)?;
        info!("Deleted {} ({:?})", id, record.filepath);
        Ok(record)
    }

    pub fn find_duplicates(
        &self,
        options: &DuplicateOptions,
    ) -> Result<Vec<DuplicateGroup>, LibraryError> {
        let records = self.store.list_all()?;
        let groups = find_duplicates(&records, options);
        info!(
            "Found {} duplicate groups among {} records (threshold {})",
            groups.len(),
            records.len(),
            options.threshold
        );
        Ok(groups)
    }

    pub fn records(&self) -> Result<Vec<MediaRecord>, LibraryError> {
        Ok(self.store.list_all()?)
    }

    fn configured_root(&self) -> Result<String, LibraryError> {
        match self.root.library_root() {
            Some(root) if !root.trim().is_empty() => Ok(root),
            _ => Err(LibraryError::Config(
                "library root must be set".to_string(),
            )),
        }
    }
}

impl Library<RedbCatalog, LoftyReader> {
    pub fn open(index_path: &Path, root: Arc<dyn RootProvider>) -> Result<Self, LibraryError> {
        let store = RedbCatalog::open(index_path)?;
        store.init_tables()?;
        Ok(Self::new(store, root))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Io,
    Parse,
    NotFound,
    Store,
}

#[derive(Debug)]
pub enum LibraryError {
    Config(String),
    Io(std::io::Error),
    Parse { path: String, source: MetadataError },
    NotFound(String),
    Store(StoreError),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LibraryError::Config(_) => ErrorKind::Config,
            LibraryError::Io(_) => ErrorKind::Io,
            LibraryError::Parse { .. } => ErrorKind::Parse,
            LibraryError::NotFound(_) => ErrorKind::NotFound,
            LibraryError::Store(_) => ErrorKind::Store,
        }
    }
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Config(message) => write!(f, "config error: {}", message),
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Parse { path, source } => {
                write!(f, "failed to read metadata from {}: {}", path, source)
            }
            LibraryError::NotFound(id) => write!(f, "record not found: {}", id),
            LibraryError::Store(err) => write!(f, "store error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LibraryError::Io(err) => Some(err),
            LibraryError::Parse { source, .. } => Some(source),
            LibraryError::Store(err) => Some(err),
            LibraryError::Config(_) | LibraryError::NotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<StoreError> for LibraryError {
    fn from(err: StoreError) -> Self {
        LibraryError::Store(err)
    }
}
