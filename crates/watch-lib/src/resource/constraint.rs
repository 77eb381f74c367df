//! Placement constraint tree and its structural validation
//!
//! A constraint is an intersection of items, each item a union of typed
//! entries. Only completeness is checked here; whether a constraint can be
//! satisfied by some agent is decided by the scheduler.

use serde::{Deserialize, Serialize};

/// Declared payload type of a constraint entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    #[default]
    Scalar,
    Range,
    Set,
    Text,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scalar {
    pub value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueSet {
    pub item: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub value: String,
}

/// One entry of a union
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintData {
    pub name: String,
    pub operate: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub scalar: Option<Scalar>,
    pub ranges: Option<Vec<Option<Range>>>,
    pub set: Option<ValueSet>,
    pub text: Option<Text>,
}

impl ConstraintData {
    /// Whether the payload matching the declared type is present
    ///
    /// A range entry additionally needs a non-empty list with every element
    /// populated.
    pub fn is_complete(&self) -> bool {
        match self.value_type {
            ValueType::Scalar => self.scalar.is_some(),
            ValueType::Text => self.text.is_some(),
            ValueType::Set => self.set.is_some(),
            ValueType::Range => match &self.ranges {
                Some(ranges) => !ranges.is_empty() && ranges.iter().all(Option::is_some),
                None => false,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintDataItem {
    pub union_data: Vec<ConstraintData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    pub intersection_item: Vec<ConstraintDataItem>,
}

/// Validate that every entry in the tree carries its payload
///
/// A missing tree is vacuously valid. Stops at the first incomplete entry.
pub fn check_constraints(constraint: Option<&Constraint>) -> bool {
    let Some(constraint) = constraint else {
        return true;
    };

    constraint
        .intersection_item
        .iter()
        .flat_map(|item| item.union_data.iter())
        .all(ConstraintData::is_complete)
}
