//! Worklist item model.
//!
//! An [`Item`] is one line of the daily worklist: a named product (optionally
//! carrying a `#<digits>` SKU), a free-text location/instruction, a case count
//! and a priority label. Items live in exactly one of the active set
//! (`items/<id>`) or the completed set (`completedItems/<id>`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Priority label carried by an item.
///
/// `Missing` means "no priority assigned yet" and is distinct from
/// `Level(0)`, the no-priority-zone label. The derived ordering puts
/// `Missing` before every level and orders levels ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[default]
    Missing,
    Level(u32),
}

impl Priority {
    pub const MISSING_LABEL: &'static str = "missing";

    pub fn is_missing(&self) -> bool {
        matches!(self, Priority::Missing)
    }

    /// `0` marks the "no-priority zone".
    pub fn is_no_priority_zone(&self) -> bool {
        matches!(self, Priority::Level(0))
    }

    /// Decode a stored JSON label. Anything other than a non-negative
    /// integer or the `missing` sentinel is rejected.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Priority::Level),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        match self {
            Priority::Missing => serde_json::Value::String(Self::MISSING_LABEL.into()),
            Priority::Level(n) => serde_json::Value::Number(n.into()),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Missing => f.write_str(Self::MISSING_LABEL),
            Priority::Level(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    /// Accepts `missing`, the worklist shorthand `U`, or a non-negative integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Self::MISSING_LABEL) || s == "U" {
            return Ok(Priority::Missing);
        }
        s.parse::<u32>()
            .map(Priority::Level)
            .map_err(|_| ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("'{s}' is neither a non-negative integer nor 'missing'"),
            })
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Priority::Missing => serializer.serialize_str(Self::MISSING_LABEL),
            Priority::Level(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriorityVisitor;

        impl Visitor<'_> for PriorityVisitor {
            type Value = Priority;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer or \"missing\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Priority, E> {
                u32::try_from(v)
                    .map(Priority::Level)
                    .map_err(|_| E::custom(format!("priority {v} out of range")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Priority, E> {
                u32::try_from(v)
                    .map(Priority::Level)
                    .map_err(|_| E::custom(format!("priority {v} out of range")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Priority, E> {
                if v.fract() == 0.0 && v >= 0.0 && v <= f64::from(u32::MAX) {
                    Ok(Priority::Level(v as u32))
                } else {
                    Err(E::custom(format!("priority {v} is not a whole number")))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Priority, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(PriorityVisitor)
    }
}

/// Numeric product identifier embedded in an item name after `#`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Extract the first `#<digits>` run from a display name.
    ///
    /// Returns `None` when the name carries no SKU; timing and video features
    /// are then unavailable for the item.
    pub fn from_name(name: &str) -> Option<Self> {
        name.match_indices('#').find_map(|(idx, _)| {
            let digits: String = name[idx + 1..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            (!digits.is_empty()).then_some(Sku(digits))
        })
    }

    /// Accept an operator-supplied SKU, with or without the leading `#`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let digits = raw.trim().trim_start_matches('#');
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            Ok(Sku(digits.to_string()))
        } else {
            Err(ValidationError::InvalidValue {
                field: "sku".into(),
                message: format!("'{raw}' is not a numeric SKU"),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name with the SKU suffix removed, as shown on item cards.
pub fn display_name(full_name: &str) -> &str {
    full_name.split('#').next().unwrap_or_default().trim()
}

/// One worklist line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub location: String,
    pub cases: u32,
    #[serde(default)]
    pub priority: Priority,
}

impl Item {
    pub fn sku(&self) -> Option<Sku> {
        Sku::from_name(&self.name)
    }

    pub fn display_name(&self) -> &str {
        display_name(&self.name)
    }
}

/// A completed ledger entry: the item plus the instant it was completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedItem {
    #[serde(flatten)]
    pub item: Item,
    pub completed_at: DateTime<Utc>,
}

impl CompletedItem {
    /// Strip completion metadata, yielding the active-set record.
    pub fn into_item(self) -> Item {
        self.item
    }
}

/// Item record as delivered by ingestion or manual entry, before an id is
/// assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub location: String,
    pub cases: u32,
    #[serde(default)]
    pub priority: Priority,
}

impl NewItem {
    /// Trim and check the record: name and location must be non-blank and
    /// `cases` at least one.
    pub fn validate(self) -> Result<Self, ValidationError> {
        let name = self.name.trim().to_string();
        let location = self.location.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::Required("name"));
        }
        if location.is_empty() {
            return Err(ValidationError::Required("location"));
        }
        if self.cases < 1 {
            return Err(ValidationError::InvalidValue {
                field: "cases".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(Self {
            name,
            location,
            cases: self.cases,
            priority: self.priority,
        })
    }

    pub fn with_id(self, id: impl Into<String>) -> Item {
        Item {
            id: id.into(),
            name: self.name,
            location: self.location,
            cases: self.cases,
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_from_name() {
        assert_eq!(Sku::from_name("Apples #123").unwrap().as_str(), "123");
        assert_eq!(Sku::from_name("Kale #77 bunch").unwrap().as_str(), "77");
        assert!(Sku::from_name("Loose onions").is_none());
        assert!(Sku::from_name("Bin # 5").is_none());
    }

    #[test]
    fn sku_skips_hash_without_digits() {
        assert_eq!(Sku::from_name("Pears #A #45").unwrap().as_str(), "45");
    }

    #[test]
    fn sku_parse_accepts_leading_hash() {
        assert_eq!(Sku::parse("#900").unwrap().as_str(), "900");
        assert!(Sku::parse("12a").is_err());
        assert!(Sku::parse("").is_err());
    }

    #[test]
    fn display_name_strips_sku() {
        assert_eq!(display_name("Apples #123"), "Apples");
        assert_eq!(display_name("Plain"), "Plain");
    }

    #[test]
    fn priority_ordering() {
        let mut labels = vec![
            Priority::Level(3),
            Priority::Missing,
            Priority::Level(0),
            Priority::Level(1),
        ];
        labels.sort();
        assert_eq!(
            labels,
            vec![
                Priority::Missing,
                Priority::Level(0),
                Priority::Level(1),
                Priority::Level(3)
            ]
        );
    }

    #[test]
    fn priority_json_shape() {
        assert_eq!(serde_json::to_string(&Priority::Missing).unwrap(), "\"missing\"");
        assert_eq!(serde_json::to_string(&Priority::Level(2)).unwrap(), "2");
        let p: Priority = serde_json::from_str("4").unwrap();
        assert_eq!(p, Priority::Level(4));
        let p: Priority = serde_json::from_str("\"missing\"").unwrap();
        assert_eq!(p, Priority::Missing);
        assert!(serde_json::from_str::<Priority>("-1").is_err());
        assert!(serde_json::from_str::<Priority>("\"high\"").is_err());
    }

    #[test]
    fn priority_from_str_accepts_worklist_shorthand() {
        assert_eq!("U".parse::<Priority>().unwrap(), Priority::Missing);
        assert_eq!(" 2 ".parse::<Priority>().unwrap(), Priority::Level(2));
    }

    #[test]
    fn completed_item_roundtrips_with_camel_case_timestamp() {
        let item = Item {
            id: "a".into(),
            name: "Apples #123".into(),
            location: "Cooler 2".into(),
            cases: 10,
            priority: Priority::Level(1),
        };
        let completed = CompletedItem {
            item: item.clone(),
            completed_at: Utc::now(),
        };
        let json = serde_json::to_value(&completed).unwrap();
        assert!(json.get("completedAt").is_some());
        assert_eq!(json["priority"], serde_json::json!(1));
        let back: CompletedItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.into_item(), item);
    }

    #[test]
    fn new_item_validation() {
        let ok = NewItem {
            name: "  Apples #1 ".into(),
            location: " Dock ".into(),
            cases: 2,
            priority: Priority::Missing,
        }
        .validate()
        .unwrap();
        assert_eq!(ok.name, "Apples #1");
        assert_eq!(ok.location, "Dock");

        let blank_name = NewItem {
            name: " ".into(),
            location: "Dock".into(),
            cases: 1,
            priority: Priority::Missing,
        };
        assert!(matches!(
            blank_name.validate(),
            Err(ValidationError::Required("name"))
        ));

        let zero_cases = NewItem {
            name: "Figs".into(),
            location: "Dock".into(),
            cases: 0,
            priority: Priority::Missing,
        };
        assert!(zero_cases.validate().is_err());
    }
}
