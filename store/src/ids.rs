use crate::types::EquipmentRecord;
use chrono::DateTime;
use chrono::Local;
use chrono::TimeZone;
use std::collections::HashSet;
use std::fmt::Display;
use uuid::Uuid;

/// Format of the display date stored on each record.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// A single reading of the clock, shared by every record created in one
/// operation so ids and dates agree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub millis: i64,
    /// Display date written to new records.
    pub date: String,
    /// `YYYY-MM-DD`, used in backup file names.
    pub iso_date: String,
}

impl Stamp {
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at<Tz>(dt: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            millis: dt.timestamp_millis(),
            date: dt.format(DATE_FORMAT).to_string(),
            iso_date: dt.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Id for a manually added record.
pub fn manual_id(stamp: &Stamp) -> String {
    stamp.millis.to_string()
}

/// Id for the record produced from line `index` of a bulk import. The line
/// index keeps ids distinct within one batch.
pub fn import_id(stamp: &Stamp, index: usize) -> String {
    format!("imported-{}-{index}", stamp.millis)
}

/// Timestamp plus random suffix, for records that arrive without an id or
/// whose id is already taken.
pub fn synthesized_id(stamp: &Stamp) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", stamp.millis, &suffix[..8])
}

/// Give every record in `incoming` an id that is unique among themselves and
/// not used by any record in `existing`. Records in `existing` keep their ids.
/// Returns how many ids were replaced.
pub fn dedupe_against(
    incoming: &mut [EquipmentRecord],
    existing: &[EquipmentRecord],
    stamp: &Stamp,
) -> usize {
    let mut taken: HashSet<String> = existing.iter().map(|r| r.id.clone()).collect();
    let mut replaced = 0;
    for record in incoming.iter_mut() {
        if record.id.trim().is_empty() || taken.contains(&record.id) {
            let mut fresh = synthesized_id(stamp);
            while taken.contains(&fresh) {
                fresh = synthesized_id(stamp);
            }
            tracing::debug!(old = %record.id, new = %fresh, "reassigned colliding record id");
            record.id = fresh;
            replaced += 1;
        }
        taken.insert(record.id.clone());
    }
    replaced
}

/// Make ids unique within one list; the first holder of an id keeps it.
pub fn dedupe(records: &mut [EquipmentRecord], stamp: &Stamp) -> usize {
    dedupe_against(records, &[], stamp)
}
