//! Schema migration for stored records.
//!
//! Every record read from storage or from a backup goes through
//! [`decode_record`]: a strict decode into the current shape is tried first,
//! and anything that does not fit is read through the fully optional
//! [`LegacyRecord`] shape and upgraded field by field. Current-shape records
//! come out unchanged.
//!
//! [`migrate_legacy_slot`] handles the older storage slot: when the current
//! slot has never been written, the legacy slot is upgraded and copied into
//! the current slot. The legacy slot itself is never modified.

use crate::ids;
use crate::ids::Stamp;
use crate::storage::SlotStorage;
use crate::store::CURRENT_KEY;
use crate::store::LEGACY_KEY;
use crate::types::Category;
use crate::types::DEFAULT_RATING;
use crate::types::EquipmentRecord;
use crate::types::MAX_RATING;
use crate::types::MIN_RATING;
use crate::types::UNKNOWN_BRAND;
use crate::types::UNKNOWN_MODEL;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("top level is not an array")]
    NotArray,
    #[error("entry {index} is not an object")]
    NotObject { index: usize },
}

/// A field from an older document whose type is not trusted.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Loose {
    Text(String),
    Number(serde_json::Number),
    Other(Value),
}

impl Loose {
    fn text(&self) -> Option<String> {
        match self {
            Loose::Text(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Loose::Number(n) => Some(n.to_string()),
            Loose::Other(_) => None,
        }
    }

    /// Like `text` but keeps surrounding whitespace.
    fn raw_text(&self) -> Option<String> {
        match self {
            Loose::Text(s) => Some(s.clone()),
            _ => self.text(),
        }
    }

    fn rating(&self) -> Option<u8> {
        let value = match self {
            Loose::Number(n) => n.as_f64()?,
            Loose::Text(s) => s.trim().parse::<f64>().ok()?,
            Loose::Other(_) => return None,
        };
        if !value.is_finite() {
            return None;
        }
        let clamped = value.round().clamp(f64::from(MIN_RATING), f64::from(MAX_RATING));
        Some(clamped as u8)
    }
}

/// Superset of every shape the catalog has been stored in. Every field is
/// optional; the oldest documents carry `name` instead of `brand`/`model`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    pub id: Option<Loose>,
    pub brand: Option<Loose>,
    pub model: Option<Loose>,
    pub name: Option<Loose>,
    pub category: Option<Loose>,
    pub rating: Option<Loose>,
    pub description: Option<Loose>,
    #[serde(alias = "imageReference")]
    pub image_url: Option<Loose>,
    pub purchase_url: Option<Loose>,
    pub date: Option<Loose>,
}

impl LegacyRecord {
    /// Fill every missing or invalid field with its default. The id may still
    /// collide with another record's; callers resolve that with
    /// [`ids::dedupe`].
    pub fn upgrade(self, stamp: &Stamp) -> EquipmentRecord {
        let text = |field: &Option<Loose>| field.as_ref().and_then(Loose::text);
        EquipmentRecord {
            id: text(&self.id).unwrap_or_else(|| ids::synthesized_id(stamp)),
            brand: text(&self.brand).unwrap_or_else(|| UNKNOWN_BRAND.to_string()),
            model: text(&self.model)
                .or_else(|| text(&self.name))
                .unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
            category: text(&self.category)
                .map(|label| Category::normalize(&label))
                .unwrap_or_default(),
            rating: self
                .rating
                .as_ref()
                .and_then(Loose::rating)
                .unwrap_or(DEFAULT_RATING),
            description: self
                .description
                .as_ref()
                .and_then(Loose::raw_text)
                .unwrap_or_default(),
            image_reference: text(&self.image_url),
            purchase_url: text(&self.purchase_url),
            date: text(&self.date).unwrap_or_else(|| stamp.date.clone()),
        }
    }
}

/// A stored entry, classified by shape.
#[derive(Clone, Debug, PartialEq)]
pub enum StoredRecord {
    Current(EquipmentRecord),
    Legacy(LegacyRecord),
}

impl StoredRecord {
    pub fn classify(value: Value) -> Result<Self, Value> {
        if !value.is_object() {
            return Err(value);
        }
        if let Ok(record) = serde_json::from_value::<EquipmentRecord>(value.clone())
            && record.is_canonical()
        {
            return Ok(StoredRecord::Current(record));
        }
        // Objects always fit the legacy shape since every field is optional
        // and loosely typed.
        match serde_json::from_value::<LegacyRecord>(value.clone()) {
            Ok(legacy) => Ok(StoredRecord::Legacy(legacy)),
            Err(_) => Err(value),
        }
    }

    pub fn into_current(self, stamp: &Stamp) -> EquipmentRecord {
        match self {
            StoredRecord::Current(record) => record,
            StoredRecord::Legacy(legacy) => legacy.upgrade(stamp),
        }
    }
}

/// Decode one stored entry into the current shape. Fails only for entries
/// that are not JSON objects.
pub fn decode_record(value: Value, stamp: &Stamp) -> Option<EquipmentRecord> {
    StoredRecord::classify(value)
        .ok()
        .map(|stored| stored.into_current(stamp))
}

/// Strictly decode a whole document: it must be a JSON array of objects.
/// Record ids are made unique.
pub fn decode_document(doc: &str, stamp: &Stamp) -> Result<Vec<EquipmentRecord>, DecodeError> {
    let Value::Array(entries) = serde_json::from_str::<Value>(doc)? else {
        return Err(DecodeError::NotArray);
    };
    let mut records = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match decode_record(entry, stamp) {
            Some(record) => records.push(record),
            None => return Err(DecodeError::NotObject { index }),
        }
    }
    ids::dedupe(&mut records, stamp);
    Ok(records)
}

/// Result of [`decode_document_lenient`].
#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<EquipmentRecord>,
    /// Entries that were upgraded, skipped or given a new id. Nonzero means
    /// the stored document no longer matches `records` and should be
    /// rewritten.
    pub repaired: usize,
}

/// Like [`decode_document`] but entries that are not objects are skipped
/// with a warning instead of failing the whole document.
pub fn decode_document_lenient(doc: &str, stamp: &Stamp) -> Result<Decoded, DecodeError> {
    let Value::Array(entries) = serde_json::from_str::<Value>(doc)? else {
        return Err(DecodeError::NotArray);
    };
    let mut decoded = Decoded {
        records: Vec::with_capacity(entries.len()),
        repaired: 0,
    };
    for (index, entry) in entries.into_iter().enumerate() {
        match StoredRecord::classify(entry) {
            Ok(StoredRecord::Current(record)) => decoded.records.push(record),
            Ok(StoredRecord::Legacy(legacy)) => {
                decoded.records.push(legacy.upgrade(stamp));
                decoded.repaired += 1;
            }
            Err(_) => {
                tracing::warn!(index, "skipping stored entry that is not an object");
                decoded.repaired += 1;
            }
        }
    }
    let reassigned = ids::dedupe(&mut decoded.records, stamp);
    if reassigned > 0 {
        tracing::warn!(reassigned, "stored document had duplicate ids");
        decoded.repaired += reassigned;
    }
    Ok(decoded)
}

/// Upgrade the legacy slot into the current slot.
///
/// Only call this when the current slot is empty. Returns the migrated list,
/// or an empty list when there is no legacy slot or it cannot be parsed.
/// The legacy slot is left as it was.
pub fn migrate_legacy_slot(
    storage: &dyn SlotStorage,
    stamp: &Stamp,
) -> anyhow::Result<Vec<EquipmentRecord>> {
    let Some(doc) = storage.get(LEGACY_KEY)? else {
        return Ok(Vec::new());
    };
    let records = match decode_document_lenient(&doc, stamp) {
        Ok(decoded) => decoded.records,
        Err(e) => {
            tracing::warn!(key = LEGACY_KEY, error = %e, "legacy document unreadable; not migrating");
            return Ok(Vec::new());
        }
    };
    storage.set(CURRENT_KEY, &serde_json::to_string(&records)?)?;
    tracing::info!(
        count = records.len(),
        from = LEGACY_KEY,
        to = CURRENT_KEY,
        "migrated legacy records"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn current() -> EquipmentRecord {
        EquipmentRecord {
            id: "1735689600000".into(),
            brand: "Neumann".into(),
            model: "U87ai".into(),
            category: Category::Microphone,
            rating: 5,
            description: "Studio staple".into(),
            image_reference: Some("u87.png".into()),
            purchase_url: Some("https://example.com/u87".into()),
            date: "2025/01/01".into(),
        }
    }

    #[test]
    fn current_records_pass_through_unchanged() {
        let stamp = Stamp::now();
        let record = current();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            StoredRecord::classify(value.clone()).unwrap(),
            StoredRecord::Current(record.clone())
        );
        assert_eq!(decode_record(value, &stamp), Some(record));
    }

    #[test]
    fn legacy_name_becomes_model() {
        let stamp = Stamp::now();
        let record = decode_record(
            json!({"id": "7", "name": "SM58", "category": "Microphone", "rating": 4, "date": "2024/5/1"}),
            &stamp,
        )
        .unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.brand, UNKNOWN_BRAND);
        assert_eq!(record.model, "SM58");
        assert_eq!(record.rating, 4);
        assert_eq!(record.date, "2024/5/1");
    }

    #[test]
    fn missing_everything_gets_defaults() {
        let stamp = Stamp::now();
        let record = decode_record(json!({}), &stamp).unwrap();
        assert_eq!(record.model, UNKNOWN_MODEL);
        assert_eq!(record.brand, UNKNOWN_BRAND);
        assert_eq!(record.category, Category::Microphone);
        assert_eq!(record.rating, DEFAULT_RATING);
        assert_eq!(record.date, stamp.date);
        assert!(record.id.starts_with(&stamp.millis.to_string()));
    }

    #[test]
    fn loose_fields_are_coerced() {
        let stamp = Stamp::now();
        let record = decode_record(
            json!({
                "id": 1700000000000u64,
                "brand": "RME",
                "model": "Babyface Pro",
                "category": "Audio Interface",
                "rating": "9",
                "imageUrl": "",
                "purchaseUrl": "https://example.com/bf"
            }),
            &stamp,
        )
        .unwrap();
        assert_eq!(record.id, "1700000000000");
        assert_eq!(record.category, Category::PreampInterfaceAmp);
        assert_eq!(record.rating, MAX_RATING);
        assert_eq!(record.image_reference, None);
        assert_eq!(record.purchase_url.as_deref(), Some("https://example.com/bf"));
    }

    #[test]
    fn out_of_range_rating_is_clamped() {
        let stamp = Stamp::now();
        let mut value = serde_json::to_value(current()).unwrap();
        value["rating"] = json!(0);
        let record = decode_record(value, &stamp).unwrap();
        assert_eq!(record.rating, MIN_RATING);
        assert_eq!(record.model, "U87ai");
    }

    #[test]
    fn non_objects_are_rejected() {
        let stamp = Stamp::now();
        assert_eq!(decode_record(json!(3), &stamp), None);
        assert!(matches!(
            decode_document("[{}, 3]", &stamp),
            Err(DecodeError::NotObject { index: 1 })
        ));
        let decoded = decode_document_lenient("[{}, 3]", &stamp).unwrap();
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.repaired, 2);
    }

    #[test]
    fn canonical_documents_need_no_repair() {
        let stamp = Stamp::now();
        let doc = serde_json::to_string(&[current()]).unwrap();
        let decoded = decode_document_lenient(&doc, &stamp).unwrap();
        assert_eq!(decoded.records, vec![current()]);
        assert_eq!(decoded.repaired, 0);

        let twice = serde_json::to_string(&[current(), current()]).unwrap();
        assert_eq!(decode_document_lenient(&twice, &stamp).unwrap().repaired, 1);
    }

    #[test]
    fn document_must_be_array() {
        let stamp = Stamp::now();
        assert!(matches!(
            decode_document(r#"{"id":"1"}"#, &stamp),
            Err(DecodeError::NotArray)
        ));
        assert!(matches!(
            decode_document("not json", &stamp),
            Err(DecodeError::NotJson(_))
        ));
    }
}
