use crate::config::VaultConfig;
use crate::storage::SlotStorage;
use crate::storage::file::FileSlotStorage;
use crate::store::CURRENT_KEY;
use crate::store::LEGACY_KEY;
use crate::store::RecordStore;
use std::path::Path;

#[cfg(feature = "sqlite")]
use crate::storage::sqlite::SqliteSlotStorage;

/// Backend selection for slot persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    File,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

impl Backend {
    /// Parse a backend name. Unknown names, and `sqlite` when it is not
    /// compiled in, fall back to the file backend.
    pub fn from_name(name: &str) -> Backend {
        match name.trim().to_ascii_lowercase().as_str() {
            "file" | "" => Backend::File,
            #[cfg(feature = "sqlite")]
            "sqlite" => Backend::Sqlite,
            other => {
                tracing::warn!(backend = other, "unknown or unavailable backend; using file");
                Backend::File
            }
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    /// Strict counterpart of [`Backend::from_name`] for command-line input.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(Backend::Sqlite),
            other => Err(format!("unsupported backend: {other}")),
        }
    }
}

/// Open slot storage of the given kind inside `data_dir`:
/// `<data_dir>/slots/` for files, `<data_dir>/vault.db` for SQLite.
pub fn open_storage(data_dir: &Path, backend: Backend) -> anyhow::Result<Box<dyn SlotStorage>> {
    Ok(match backend {
        Backend::File => Box::new(FileSlotStorage::new(data_dir.join("slots"))),
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            Box::new(SqliteSlotStorage::new(data_dir.join("vault.db")))
        }
    })
}

pub fn open_record_store(config: &VaultConfig) -> anyhow::Result<RecordStore> {
    let storage = open_storage(&config.data_dir(), config.backend())?;
    tracing::debug!(storage = %storage.describe(), "opened record store");
    Ok(RecordStore::new(storage))
}

/// Copy the current and legacy slots from one storage to another, verbatim.
/// Returns the number of slots copied.
pub fn transfer(from: &dyn SlotStorage, to: &dyn SlotStorage) -> anyhow::Result<usize> {
    let mut copied = 0;
    for key in [CURRENT_KEY, LEGACY_KEY] {
        if let Some(doc) = from.get(key)? {
            to.set(key, &doc)?;
            copied += 1;
        }
    }
    tracing::info!(
        from = %from.describe(),
        to = %to.describe(),
        copied,
        "transferred slots"
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySlotStorage;

    #[test]
    fn backend_names() {
        assert_eq!(Backend::from_name("FILE"), Backend::File);
        assert_eq!(Backend::from_name("bogus"), Backend::File);
        assert!("bogus".parse::<Backend>().is_err());
        assert_eq!("file".parse::<Backend>().unwrap(), Backend::File);
    }

    #[test]
    fn transfer_copies_existing_slots_only() {
        let from = MemorySlotStorage::new();
        let to = MemorySlotStorage::new();
        from.set(CURRENT_KEY, "[]").unwrap();
        assert_eq!(transfer(&from, &to).unwrap(), 1);
        assert_eq!(to.get(CURRENT_KEY).unwrap().as_deref(), Some("[]"));
        assert_eq!(to.get(LEGACY_KEY).unwrap(), None);
    }

    #[test]
    fn file_backend_lives_under_slots_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open_storage(dir.path(), Backend::File).unwrap();
        storage.set(CURRENT_KEY, "[]").unwrap();
        assert!(dir.path().join("slots").join("vault-gear-list-v2.json").exists());
    }
}
