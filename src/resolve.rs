//! Column resolution: maps logical fields onto whichever header spelling the
//! current snapshot uses.
//!
//! Spreadsheets drift over time: columns get renamed, pluralised, or pick up
//! a stray double space. [`AliasTable`] lists the accepted spellings for each
//! [`LogicalField`] in preference order and [`resolve_columns()`] picks the
//! first one present. A field with no matching header is reported through a
//! [`Notice`] and left unresolved; it never fails the run.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::OnceLock,
};

use clap::ValueEnum;
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Notice;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    Id,
    Category,
    DateOfBirth,
    InseminationDate,
    MilkMorning,
    MilkMidMorning,
    MilkEvening,
    Feed,
    Labor,
    Utilities,
    Salt,
    Silage,
    Vaccination,
    MilkingLabor,
    Electricity,
    OtherMedical,
    ArtificialInsemination,
    PregnancyTest,
    FeedStock,
    ReorderThreshold,
    Valuation,
}

impl LogicalField {
    pub const ALL: [LogicalField; 21] = [
        LogicalField::Id,
        LogicalField::Category,
        LogicalField::DateOfBirth,
        LogicalField::InseminationDate,
        LogicalField::MilkMorning,
        LogicalField::MilkMidMorning,
        LogicalField::MilkEvening,
        LogicalField::Feed,
        LogicalField::Labor,
        LogicalField::Utilities,
        LogicalField::Salt,
        LogicalField::Silage,
        LogicalField::Vaccination,
        LogicalField::MilkingLabor,
        LogicalField::Electricity,
        LogicalField::OtherMedical,
        LogicalField::ArtificialInsemination,
        LogicalField::PregnancyTest,
        LogicalField::FeedStock,
        LogicalField::ReorderThreshold,
        LogicalField::Valuation,
    ];

    /// The cost fields summed into total expenses.
    pub const COSTS: [LogicalField; 11] = [
        LogicalField::Feed,
        LogicalField::Labor,
        LogicalField::Utilities,
        LogicalField::Salt,
        LogicalField::Silage,
        LogicalField::Vaccination,
        LogicalField::MilkingLabor,
        LogicalField::Electricity,
        LogicalField::OtherMedical,
        LogicalField::ArtificialInsemination,
        LogicalField::PregnancyTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::Id => "id",
            LogicalField::Category => "category",
            LogicalField::DateOfBirth => "date_of_birth",
            LogicalField::InseminationDate => "insemination_date",
            LogicalField::MilkMorning => "milk_morning",
            LogicalField::MilkMidMorning => "milk_mid_morning",
            LogicalField::MilkEvening => "milk_evening",
            LogicalField::Feed => "feed",
            LogicalField::Labor => "labor",
            LogicalField::Utilities => "utilities",
            LogicalField::Salt => "salt",
            LogicalField::Silage => "silage",
            LogicalField::Vaccination => "vaccination",
            LogicalField::MilkingLabor => "milking_labor",
            LogicalField::Electricity => "electricity",
            LogicalField::OtherMedical => "other_medical",
            LogicalField::ArtificialInsemination => "artificial_insemination",
            LogicalField::PregnancyTest => "pregnancy_test",
            LogicalField::FeedStock => "feed_stock",
            LogicalField::ReorderThreshold => "reorder_threshold",
            LogicalField::Valuation => "valuation",
        }
    }

    fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            LogicalField::Id => &["Cow ID", "Cow Id", "ID", "Tag Number", "Cow Name", "id"],
            LogicalField::Category => &["Category", "Cow Category", "Type", "category"],
            LogicalField::DateOfBirth => &["Date of Birth", "DOB", "Birth Date"],
            LogicalField::InseminationDate => &[
                "Insemination Date",
                "Date of Insemination",
                "Date  of Insemination",
                "AI Date",
            ],
            LogicalField::MilkMorning => &[
                "Morning Milk (L)",
                "Morning  Milk (L)",
                "Morning Milk",
                "Milk AM",
                "milk_am",
            ],
            LogicalField::MilkMidMorning => &[
                "Mid-Morning Milk (L)",
                "Mid Morning Milk (L)",
                "Mid  Morning Milk (L)",
                "Mid-Morning Milk",
                "Milk Midday",
                "milk_mid",
            ],
            LogicalField::MilkEvening => &[
                "Evening Milk (L)",
                "Evening  Milk (L)",
                "Evening Milk",
                "Milk PM",
                "milk_pm",
            ],
            LogicalField::Feed => &["Feed Cost", "Feeds Cost", "Feed"],
            LogicalField::Labor => &["Labor Cost", "Labour Cost", "Labor"],
            LogicalField::Utilities => &["Utilities Cost", "Utilities"],
            LogicalField::Salt => &["Salt Cost", "Salt"],
            LogicalField::Silage => &["Silage Cost", "Silage"],
            LogicalField::Vaccination => &["Vaccination Cost", "Vaccination"],
            LogicalField::MilkingLabor => {
                &["Milking Labor Cost", "Milking Labour Cost", "Milking Labor"]
            }
            LogicalField::Electricity => &["Electricity Cost", "Electricity"],
            LogicalField::OtherMedical => {
                &["Other Medical Cost", "Other  Medical Cost", "Other Medical"]
            }
            LogicalField::ArtificialInsemination => &[
                "AI Cost",
                "Artificial Insemination Cost",
                "Artificial Insemination",
            ],
            LogicalField::PregnancyTest => {
                &["Pregnancy Test Cost", "Pregnancy Test", "PD Cost"]
            }
            LogicalField::FeedStock => &["Feed Stock", "Existing Kg", "Feeds (kg)"],
            LogicalField::ReorderThreshold => {
                &["Reorder Level", "Reorder Threshold", "Reorder Kg"]
            }
            LogicalField::Valuation => &["Valuation", "Cow Value", "Estimated Value"],
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum HeaderMatching {
    /// Header names must equal an alias byte for byte.
    #[default]
    Exact,
    /// Leading/trailing whitespace is ignored and interior runs collapse to
    /// one space, on both aliases and headers.
    CollapseWhitespace,
}

impl HeaderMatching {
    fn key<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            HeaderMatching::Exact => std::borrow::Cow::Borrowed(name),
            HeaderMatching::CollapseWhitespace => {
                std::borrow::Cow::Owned(collapse_whitespace(name))
            }
        }
    }
}

pub fn collapse_whitespace(name: &str) -> String {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    let runs = RUNS.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"));
    runs.replace_all(name.trim(), " ").into_owned()
}

/// Logical field to accepted header spellings, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<LogicalField, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let entries = LogicalField::ALL
            .iter()
            .map(|field| {
                let aliases = field
                    .default_aliases()
                    .iter()
                    .map(|alias| alias.to_string())
                    .collect();
                (*field, aliases)
            })
            .collect();
        Self { entries }
    }
}

impl AliasTable {
    /// Replaces the alias list of every field named in `overrides`; fields
    /// not mentioned keep their current list.
    pub fn with_overrides(mut self, overrides: &BTreeMap<LogicalField, Vec<String>>) -> Self {
        for (field, aliases) in overrides {
            self.entries.insert(*field, aliases.clone());
        }
        self
    }

    pub fn aliases(&self, field: LogicalField) -> &[String] {
        self.entries
            .get(&field)
            .map(|v| v.as_slice())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (LogicalField, &[String])> {
        self.entries.iter().map(|(f, a)| (*f, a.as_slice()))
    }
}

/// Outcome of matching an alias table against one snapshot's headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedColumns {
    resolved: BTreeMap<LogicalField, String>,
    unresolved: Vec<LogicalField>,
}

impl ResolvedColumns {
    /// The header name actually present in the records for `field`.
    pub fn column(&self, field: LogicalField) -> Option<&str> {
        self.resolved.get(&field).map(|s| s.as_str())
    }

    pub fn is_resolved(&self, field: LogicalField) -> bool {
        self.resolved.contains_key(&field)
    }

    pub fn unresolved(&self) -> &[LogicalField] {
        &self.unresolved
    }

    pub fn resolved(&self) -> impl Iterator<Item = (LogicalField, &str)> {
        self.resolved.iter().map(|(f, c)| (*f, c.as_str()))
    }

    /// Reverse lookup used by the `columns` listing.
    pub fn field_for_header(&self, header: &str) -> Option<LogicalField> {
        self.resolved
            .iter()
            .find(|(_, column)| column.as_str() == header)
            .map(|(field, _)| *field)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.unresolved
            .iter()
            .map(|field| Notice::UnresolvedField { field: *field })
            .collect()
    }
}

pub fn resolve_columns(
    headers: &[String],
    table: &AliasTable,
    matching: HeaderMatching,
) -> ResolvedColumns {
    let mut present: HashMap<std::borrow::Cow<'_, str>, &str> = HashMap::new();
    for header in headers {
        present.entry(matching.key(header)).or_insert(header.as_str());
    }

    let mut resolved = ResolvedColumns::default();
    for (field, aliases) in table.fields() {
        let hit = aliases
            .iter()
            .find_map(|alias| present.get(&*matching.key(alias)).copied());
        match hit {
            Some(column) => {
                resolved.resolved.insert(field, column.to_string());
            }
            None => {
                info!("No column found for '{field}' (tried {aliases:?})");
                resolved.unresolved.push(field);
            }
        }
    }
    resolved
}
