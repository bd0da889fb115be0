use crate::backup;
use crate::backup::RestoreMode;
use crate::error::Result;
use crate::error::VaultError;
use crate::ids;
use crate::ids::Stamp;
use crate::migrate;
use crate::storage::SlotStorage;
use crate::types::Category;
use crate::types::EquipmentRecord;
use crate::types::MAX_RATING;
use crate::types::MIN_RATING;
use crate::types::RecordDraft;
use crate::types::RecordPatch;
use crate::types::brand_or_unknown;
use crate::types::non_empty;
use serde_json::json;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// Slot holding the live record list.
pub const CURRENT_KEY: &str = "vault-gear-list-v2";
/// Slot written by older versions; read only by the migrator.
pub const LEGACY_KEY: &str = "vault-gear-list";

/// The catalog. Every mutation reads the persisted list, derives a new list
/// and writes it back whole through [`RecordStore::save`]; nothing is cached
/// between calls.
pub struct RecordStore {
    storage: Box<dyn SlotStorage>,
}

impl RecordStore {
    pub fn new(storage: Box<dyn SlotStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn SlotStorage {
        self.storage.as_ref()
    }

    /// Read the current list, migrating the legacy slot on first use.
    ///
    /// Entries that had to be upgraded or given a new id are written back
    /// at once so ids and dates stay stable across reads. A malformed
    /// current document is logged and read as an empty list. Backend read
    /// and write failures are returned.
    pub fn load(&self) -> Result<Vec<EquipmentRecord>> {
        let stamp = Stamp::now();
        let Some(doc) = self.storage.get(CURRENT_KEY)? else {
            return Ok(migrate::migrate_legacy_slot(self.storage.as_ref(), &stamp)?);
        };
        match migrate::decode_document_lenient(&doc, &stamp) {
            Ok(decoded) => {
                if decoded.repaired > 0 {
                    self.save(&decoded.records)?;
                    tracing::info!(
                        repaired = decoded.repaired,
                        storage = %self.storage.describe(),
                        "rewrote repaired records"
                    );
                }
                Ok(decoded.records)
            }
            Err(e) => {
                tracing::warn!(
                    key = CURRENT_KEY,
                    storage = %self.storage.describe(),
                    error = %e,
                    "stored document is malformed; starting from an empty list"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Overwrite the persisted list. Refuses lists that break the store
    /// invariants so a bad caller cannot corrupt the document.
    pub fn save(&self, records: &[EquipmentRecord]) -> Result<()> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if record.model.trim().is_empty() {
                return Err(VaultError::Validation(format!(
                    "record {} has an empty model",
                    record.id
                )));
            }
            if !seen.insert(record.id.as_str()) {
                return Err(VaultError::DuplicateId(record.id.clone()));
            }
        }
        let doc = serde_json::to_string(records)?;
        self.storage.set(CURRENT_KEY, &doc)?;
        tracing::debug!(count = records.len(), "saved records");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<EquipmentRecord>> {
        self.load()
    }

    pub fn get(&self, id: &str) -> Result<Option<EquipmentRecord>> {
        Ok(self.load()?.into_iter().find(|r| r.id == id))
    }

    /// Validate a draft, stamp it and prepend it to the list.
    pub fn add(&self, draft: RecordDraft) -> Result<EquipmentRecord> {
        let model = draft.model.trim().to_string();
        if model.is_empty() {
            return Err(VaultError::Validation("model is required".to_string()));
        }
        check_rating(draft.rating)?;

        let stamp = Stamp::now();
        let mut records = self.load()?;
        let mut fresh = [EquipmentRecord {
            id: ids::manual_id(&stamp),
            brand: brand_or_unknown(&draft.brand),
            model,
            category: draft.category,
            rating: draft.rating,
            description: draft.description,
            image_reference: non_empty(draft.image_reference),
            purchase_url: non_empty(draft.purchase_url),
            date: stamp.date.clone(),
        }];
        ids::dedupe_against(&mut fresh, &records, &stamp);
        let [record] = fresh;
        records.insert(0, record.clone());
        self.save(&records)?;
        tracing::debug!(id = %record.id, "added record");
        Ok(record)
    }

    /// Apply an edit. `id` and `date` never change.
    pub fn update(&self, id: &str, patch: RecordPatch) -> Result<EquipmentRecord> {
        if let Some(model) = &patch.model
            && model.trim().is_empty()
        {
            return Err(VaultError::Validation("model is required".to_string()));
        }
        if let Some(rating) = patch.rating {
            check_rating(rating)?;
        }
        self.modify(id, |record| {
            if let Some(brand) = patch.brand {
                record.brand = brand_or_unknown(&brand);
            }
            if let Some(model) = patch.model {
                record.model = model.trim().to_string();
            }
            if let Some(category) = patch.category {
                record.category = category;
            }
            if let Some(rating) = patch.rating {
                record.rating = rating;
            }
            if let Some(description) = patch.description {
                record.description = description;
            }
            if let Some(image) = patch.image_reference {
                record.image_reference = non_empty(Some(image));
            }
            if let Some(url) = patch.purchase_url {
                record.purchase_url = non_empty(Some(url));
            }
        })
    }

    /// Re-read the list, change one record in place and write the whole list
    /// back.
    pub fn modify<F>(&self, id: &str, f: F) -> Result<EquipmentRecord>
    where
        F: FnOnce(&mut EquipmentRecord),
    {
        let mut records = self.load()?;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Err(VaultError::NotFound(id.to_string()));
        };
        f(record);
        let updated = record.clone();
        self.save(&records)?;
        Ok(updated)
    }

    pub fn delete(&self, id: &str) -> Result<EquipmentRecord> {
        let mut records = self.load()?;
        let Some(pos) = records.iter().position(|r| r.id == id) else {
            return Err(VaultError::NotFound(id.to_string()));
        };
        let removed = records.remove(pos);
        self.save(&records)?;
        tracing::debug!(id, "deleted record");
        Ok(removed)
    }

    /// Prepend `incoming` (e.g. a bulk import) to the list in one save.
    /// Returns how many records were added.
    pub fn prepend(&self, incoming: Vec<EquipmentRecord>) -> Result<usize> {
        self.restore(incoming, RestoreMode::Append)
    }

    /// Merge a restored backup into the list under `mode`.
    pub fn restore(&self, imported: Vec<EquipmentRecord>, mode: RestoreMode) -> Result<usize> {
        let stamp = Stamp::now();
        let count = imported.len();
        let current = match mode {
            RestoreMode::Append => self.load()?,
            RestoreMode::Replace => Vec::new(),
        };
        let merged = backup::merge(current, imported, mode, &stamp);
        self.save(&merged)?;
        tracing::info!(count, ?mode, total = merged.len(), "restored records");
        Ok(count)
    }

    /// Counts by category, in the shape the CLI prints.
    pub fn stats(&self) -> Result<serde_json::Value> {
        let records = self.load()?;
        let mut by_category: BTreeMap<&'static str, usize> =
            Category::ALL.iter().map(|c| (c.as_str(), 0)).collect();
        for record in &records {
            *by_category.entry(record.category.as_str()).or_default() += 1;
        }
        let pending = records
            .iter()
            .filter(|r| crate::enrich::needs_enrichment(r))
            .count();
        Ok(json!({
            "total": records.len(),
            "by_category": by_category,
            "needs_enrichment": pending,
        }))
    }
}

fn check_rating(rating: u8) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(VaultError::Validation(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySlotStorage;

    fn store() -> (RecordStore, MemorySlotStorage) {
        let slots = MemorySlotStorage::new();
        (RecordStore::new(Box::new(slots.clone())), slots)
    }

    #[test]
    fn empty_storage_loads_empty_list() {
        let (store, _) = store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn malformed_document_fails_soft() {
        let (store, slots) = store();
        slots.set(CURRENT_KEY, "{not json").unwrap();
        assert!(store.load().unwrap().is_empty());
        slots.set(CURRENT_KEY, r#"{"id":"1"}"#).unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn add_validates_model_and_rating() {
        let (store, _) = store();
        let blank = RecordDraft::new("Shure", "   ", Category::Microphone);
        assert!(matches!(store.add(blank), Err(VaultError::Validation(_))));

        let mut loud = RecordDraft::new("Shure", "SM7B", Category::Microphone);
        loud.rating = 6;
        assert!(matches!(store.add(loud), Err(VaultError::Validation(_))));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn add_prepends_and_defaults_brand() {
        let (store, _) = store();
        let first = store
            .add(RecordDraft::new("", "SM58", Category::Microphone))
            .unwrap();
        let second = store
            .add(RecordDraft::new("Genelec", "8030C", Category::Speaker))
            .unwrap();
        assert_eq!(first.brand, "Unknown");
        assert_ne!(first.id, second.id);
        let ids: Vec<_> = store.load().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn update_keeps_id_and_date() {
        let (store, _) = store();
        let added = store
            .add(RecordDraft::new("Sony", "MDR-7506", Category::Headphone))
            .unwrap();
        let patch = RecordPatch {
            rating: Some(3),
            purchase_url: Some("https://example.com/7506".into()),
            ..RecordPatch::default()
        };
        let updated = store.update(&added.id, patch).unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.date, added.date);
        assert_eq!(updated.rating, 3);
        assert_eq!(
            store.get(&added.id).unwrap().unwrap().purchase_url.as_deref(),
            Some("https://example.com/7506")
        );

        let clear = RecordPatch {
            purchase_url: Some(String::new()),
            ..RecordPatch::default()
        };
        assert_eq!(store.update(&added.id, clear).unwrap().purchase_url, None);
    }

    #[test]
    fn update_and_delete_unknown_id() {
        let (store, _) = store();
        assert!(matches!(
            store.update("nope", RecordPatch::default()),
            Err(VaultError::NotFound(_))
        ));
        assert!(matches!(store.delete("nope"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn save_rejects_duplicate_ids() {
        let (store, _) = store();
        let record = store
            .add(RecordDraft::new("AKG", "C414", Category::Microphone))
            .unwrap();
        let err = store.save(&[record.clone(), record]).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateId(_)));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn stats_counts_categories() {
        let (store, _) = store();
        store
            .add(RecordDraft::new("AKG", "C414", Category::Microphone))
            .unwrap();
        let mut draft = RecordDraft::new("Yamaha", "HS5", Category::Speaker);
        draft.purchase_url = Some("https://example.com/hs5".into());
        store.add(draft).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats["total"], 2);
        assert_eq!(stats["by_category"]["Microphone"], 1);
        assert_eq!(stats["by_category"]["Speaker"], 1);
        assert_eq!(stats["by_category"]["Earphone"], 0);
        assert_eq!(stats["needs_enrichment"], 1);
    }
}
