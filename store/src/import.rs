//! Bulk import of comma-separated catalog lines.
//!
//! Columns are positional: `brand, model, category-label, shop-label, url`.
//! The first line is a header and is always skipped. Parsing never touches
//! storage; callers hand the result to [`crate::store::RecordStore::prepend`].

use crate::ids;
use crate::ids::Stamp;
use crate::types::Category;
use crate::types::DEFAULT_RATING;
use crate::types::EquipmentRecord;
use crate::types::brand_or_unknown;
use crate::types::non_empty;

/// Description given to imported records whose line names no shop.
pub const PLACEHOLDER_DESCRIPTION: &str = "Catalog entry";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub records: Vec<EquipmentRecord>,
    pub count: usize,
    /// Non-blank data lines that produced no record.
    pub dropped: usize,
}

pub fn import_delimited(text: &str, stamp: &Stamp) -> ImportOutcome {
    let mut records = Vec::new();
    let mut dropped = 0usize;
    for (index, line) in text.lines().enumerate() {
        if index == 0 || line.trim().is_empty() {
            continue;
        }
        match split_fields(line).and_then(|fields| record_from_fields(&fields, index, stamp)) {
            Some(record) => records.push(record),
            None => {
                tracing::debug!(line = index + 1, "dropping import line without a model");
                dropped += 1;
            }
        }
    }
    let count = records.len();
    ImportOutcome {
        records,
        count,
        dropped,
    }
}

fn split_fields(line: &str) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(row)) => Some(row.iter().map(str::to_string).collect()),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "unreadable import line");
            None
        }
        None => Some(Vec::new()),
    }
}

fn record_from_fields(fields: &[String], index: usize, stamp: &Stamp) -> Option<EquipmentRecord> {
    let field = |i: usize| fields.get(i).map(|s| s.trim()).unwrap_or("");
    let model = field(1);
    if model.is_empty() {
        return None;
    }
    let shop = field(3);
    let description = if shop.is_empty() {
        PLACEHOLDER_DESCRIPTION.to_string()
    } else {
        format!("{shop} catalog entry")
    };
    Some(EquipmentRecord {
        id: ids::import_id(stamp, index),
        brand: brand_or_unknown(field(0)),
        model: model.to_string(),
        category: Category::normalize(field(2)),
        rating: DEFAULT_RATING,
        description,
        image_reference: None,
        purchase_url: non_empty(Some(field(4).to_string())),
        date: stamp.date.clone(),
    })
}
