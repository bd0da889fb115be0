use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Brand written when the user (or a legacy document) left it empty.
pub const UNKNOWN_BRAND: &str = "Unknown";
/// Model written when a legacy document carries neither `model` nor `name`.
pub const UNKNOWN_MODEL: &str = "Unknown Model";

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;
/// Rating given to imported records and legacy records without one.
pub const DEFAULT_RATING: u8 = 5;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[default]
    Microphone,
    #[serde(rename = "Preamp/Interface/Amp")]
    PreampInterfaceAmp,
    Speaker,
    Headphone,
    Earphone,
}

/// Labels accepted from imports and older documents. Canonical names map to
/// themselves.
const CATEGORY_LABELS: &[(&str, Category)] = &[
    ("Microphone", Category::Microphone),
    ("Audio Interface", Category::PreampInterfaceAmp),
    ("Mic Pre", Category::PreampInterfaceAmp),
    ("Preamp/Interface/Amp", Category::PreampInterfaceAmp),
    ("Speaker", Category::Speaker),
    ("Headphone", Category::Headphone),
    ("Earphone", Category::Earphone),
];

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Microphone,
        Category::PreampInterfaceAmp,
        Category::Speaker,
        Category::Headphone,
        Category::Earphone,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Microphone => "Microphone",
            Category::PreampInterfaceAmp => "Preamp/Interface/Amp",
            Category::Speaker => "Speaker",
            Category::Headphone => "Headphone",
            Category::Earphone => "Earphone",
        }
    }

    /// Look a label up in the category table, ignoring ASCII case and
    /// surrounding whitespace.
    pub fn lookup(label: &str) -> Option<Category> {
        let label = label.trim();
        CATEGORY_LABELS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(label))
            .map(|(_, category)| *category)
    }

    /// Like [`Category::lookup`] but never fails: unknown labels fall back to
    /// the default category.
    pub fn normalize(label: &str) -> Category {
        Self::lookup(label).unwrap_or_default()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::lookup(s).ok_or_else(|| {
            let known: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
            format!("unknown category `{s}` (expected one of: {})", known.join(", "))
        })
    }
}

/// One catalog entry.
///
/// Optional fields never hold empty strings; use [`non_empty`] when building
/// records from user input.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentRecord {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub category: Category,
    pub rating: u8,
    #[serde(default)]
    pub description: String,
    #[serde(
        rename = "imageUrl",
        alias = "imageReference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_url: Option<String>,
    pub date: String,
}

impl EquipmentRecord {
    /// `"<brand> <model>"`, the text sent to metadata lookups.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.brand, self.model).trim().to_string()
    }

    /// True when the record already satisfies every store invariant and
    /// would survive a decode untouched.
    pub fn is_canonical(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.brand.trim().is_empty()
            && !self.model.trim().is_empty()
            && (MIN_RATING..=MAX_RATING).contains(&self.rating)
            && !self.date.is_empty()
            && self.image_reference.as_deref().is_none_or(|s| !s.is_empty())
            && self.purchase_url.as_deref().is_none_or(|s| !s.is_empty())
    }
}

/// User-supplied fields for a new record. `id` and `date` are assigned by the
/// store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordDraft {
    pub brand: String,
    pub model: String,
    pub category: Category,
    pub rating: u8,
    pub description: String,
    pub image_reference: Option<String>,
    pub purchase_url: Option<String>,
}

impl RecordDraft {
    pub fn new(brand: impl Into<String>, model: impl Into<String>, category: Category) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            category,
            rating: DEFAULT_RATING,
            description: String::new(),
            image_reference: None,
            purchase_url: None,
        }
    }
}

/// Field changes applied by an edit. `None` leaves a field as is; for the
/// optional URL fields `Some("")` clears the value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub category: Option<Category>,
    pub rating: Option<u8>,
    pub description: Option<String>,
    pub image_reference: Option<String>,
    pub purchase_url: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        *self == RecordPatch::default()
    }
}

/// Trim `s` and map an empty result to `None`.
pub fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn brand_or_unknown(brand: &str) -> String {
    let brand = brand.trim();
    if brand.is_empty() {
        UNKNOWN_BRAND.to_string()
    } else {
        brand.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_table_maps_aliases() {
        assert_eq!(
            Category::normalize("Audio Interface"),
            Category::PreampInterfaceAmp
        );
        assert_eq!(Category::normalize("Mic Pre"), Category::PreampInterfaceAmp);
        assert_eq!(Category::normalize("  headphone "), Category::Headphone);
        assert_eq!(
            Category::normalize("Preamp/Interface/Amp"),
            Category::PreampInterfaceAmp
        );
    }

    #[test]
    fn unknown_category_falls_back_to_microphone() {
        assert_eq!(Category::normalize("Turntable"), Category::Microphone);
        assert_eq!(Category::normalize(""), Category::Microphone);
        assert!("Turntable".parse::<Category>().is_err());
    }

    #[test]
    fn record_uses_existing_wire_names() {
        let record = EquipmentRecord {
            id: "1".into(),
            brand: "Neumann".into(),
            model: "U87ai".into(),
            category: Category::PreampInterfaceAmp,
            rating: 5,
            description: String::new(),
            image_reference: Some("u87.png".into()),
            purchase_url: None,
            date: "2025/01/01".into(),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["imageUrl"], "u87.png");
        assert_eq!(v["category"], "Preamp/Interface/Amp");
        assert!(v.get("purchaseUrl").is_none());

        let aliased: EquipmentRecord = serde_json::from_str(
            r#"{"id":"1","brand":"Neumann","model":"U87ai","category":"Preamp/Interface/Amp","rating":5,"imageReference":"u87.png","date":"2025/01/01"}"#,
        )
        .unwrap();
        assert_eq!(aliased, record);
    }

    #[test]
    fn blank_brand_becomes_unknown() {
        assert_eq!(brand_or_unknown("   "), UNKNOWN_BRAND);
        assert_eq!(brand_or_unknown(" Shure "), "Shure");
    }
}
