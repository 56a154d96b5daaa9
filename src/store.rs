//! Flat-file JSON persistence.
//!
//! Each entity type is one whole document under the data directory, read and
//! rewritten wholesale. There is no partial update and no schema validation
//! beyond serde. Read-modify-write sequences take the store's mutation guard
//! so that, within this process, a stock decrement can never interleave with
//! another placement between load and persist.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Document {
    Products,
    Inventory,
    Cities,
    Events,
    Orders,
    Coupons,
    Settings,
}

impl Document {
    pub fn file_name(self) -> &'static str {
        match self {
            Document::Products => "products.json",
            Document::Inventory => "inventory.json",
            Document::Cities => "cities.json",
            Document::Events => "events.json",
            Document::Orders => "orders.json",
            Document::Coupons => "coupons.json",
            Document::Settings => "settings.json",
        }
    }
}

pub struct FileStore {
    dir: PathBuf,
    mutation: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mutation: Mutex::new(()),
        }
    }

    pub fn path(&self, doc: Document) -> PathBuf {
        self.dir.join(doc.file_name())
    }

    /// Serializes read-modify-write sequences. Hold the guard across the
    /// whole load-validate-mutate-persist span.
    pub async fn lock_mutations(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().await
    }

    /// Whole-document read. A missing file is an empty document, not an
    /// error; malformed JSON is.
    pub async fn read<T>(&self, doc: Document) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(doc);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| Error::Storage(format!("{}: {e}", doc.file_name()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whole-document rewrite, pretty-printed. On a read-only filesystem the
    /// write is skipped with a warning rather than failed, so the service
    /// stays usable in read-only deployments.
    pub async fn write<T>(&self, doc: Document, value: &T) -> Result<()>
    where
        T: Serialize,
    {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| Error::Storage(format!("{}: {e}", doc.file_name())))?;
        match tokio::fs::write(self.path(doc), json).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied || e.kind() == ErrorKind::ReadOnlyFilesystem => {
                warn!(document = doc.file_name(), error = %e, "skipping write on read-only storage");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
