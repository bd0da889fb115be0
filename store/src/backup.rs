use crate::ids;
use crate::ids::Stamp;
use crate::migrate;
use crate::types::EquipmentRecord;
use thiserror::Error;

pub const BACKUP_FILE_PREFIX: &str = "gear_vault_backup_";

#[derive(Debug, Error)]
pub enum BackupError {
    /// The restore document is not a JSON array of objects. Nothing is
    /// applied.
    #[error("malformed document: {0}")]
    Malformed(#[from] migrate::DecodeError),

    #[error("serialize backup: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// An exported backup ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDocument {
    pub file_name: String,
    pub contents: String,
}

/// How restored records combine with the current list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestoreMode {
    /// Restored records go in front of the current ones; both are kept.
    #[default]
    Append,
    /// Restored records supersede the current list.
    Replace,
}

pub fn backup_file_name(stamp: &Stamp) -> String {
    format!("{BACKUP_FILE_PREFIX}{}.json", stamp.iso_date)
}

pub fn encode(records: &[EquipmentRecord], stamp: &Stamp) -> Result<BackupDocument, BackupError> {
    Ok(BackupDocument {
        file_name: backup_file_name(stamp),
        contents: serde_json::to_string_pretty(records)?,
    })
}

/// Parse a restore document. Older record shapes are upgraded the same way
/// stored records are.
pub fn decode(doc: &str, stamp: &Stamp) -> Result<Vec<EquipmentRecord>, BackupError> {
    Ok(migrate::decode_document(doc, stamp)?)
}

/// Combine `current` and `imported` under `mode`. On append, imported
/// records whose id is already in use get a fresh id.
pub fn merge(
    current: Vec<EquipmentRecord>,
    mut imported: Vec<EquipmentRecord>,
    mode: RestoreMode,
    stamp: &Stamp,
) -> Vec<EquipmentRecord> {
    match mode {
        RestoreMode::Append => {
            ids::dedupe_against(&mut imported, &current, stamp);
            imported.extend(current);
            imported
        }
        RestoreMode::Replace => {
            ids::dedupe(&mut imported, stamp);
            imported
        }
    }
}
