use std::fmt;

use serde::{Serialize, Serializer, ser::SerializeMap};

/// A cell as delivered by the record source, before any coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Blank,
}

impl RawValue {
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Blank => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(_) => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Blank => String::new(),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            RawValue::Blank
        } else {
            RawValue::Text(value.to_string())
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// One tracked animal. Columns keep the order the source delivered them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: Vec<(String, RawValue)>,
    source_row: Option<usize>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags the record with its 1-based row in the source sheet, counted
    /// below the header and including skipped spacer lines.
    pub fn at_source_row(mut self, row: usize) -> Self {
        self.source_row = Some(row);
        self
    }

    pub fn source_row(&self) -> Option<usize> {
        self.source_row
    }

    /// Sets `column`, replacing an earlier value under the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: RawValue) {
        let column = column.into();
        if let Some(slot) = self.cells.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.cells.push((column, value));
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// True when every cell is blank, as on a spacer line in the sheet.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, value)| value.is_blank())
    }

    pub fn cells(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Serializes as a map in column order.
impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The full snapshot fetched for one invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    headers: Vec<String>,
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            records: Vec::new(),
        }
    }

    /// Builds a set from records alone; headers are the union of column
    /// names in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut set = RecordSet::default();
        for record in records {
            set.push(record);
        }
        set
    }

    pub fn push(&mut self, record: Record) {
        for column in record.columns() {
            if !self.headers.iter().any(|h| h == column) {
                self.headers.push(column.to_string());
            }
        }
        self.records.push(record);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_insert_replaces_existing_column() {
        let mut record = Record::new().with("Cow ID", "7");
        record.insert("Cow ID", RawValue::Text("8".into()));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("Cow ID"), Some(&RawValue::Text("8".into())));
    }

    #[test]
    fn record_set_headers_follow_first_seen_order() {
        let set = RecordSet::from_records(vec![
            Record::new().with("b", "1").with("a", "2"),
            Record::new().with("c", "3").with("a", "4"),
        ]);
        assert_eq!(set.headers(), ["b", "a", "c"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_text_converts_to_blank() {
        assert_eq!(RawValue::from(""), RawValue::Blank);
        assert!(RawValue::Text("   ".into()).is_blank());
        assert!(!RawValue::Number(0.0).is_blank());
        assert!(Record::new().with("a", "").with("b", " ").is_blank());
        assert!(!Record::new().with("a", "").with("b", 0.0).is_blank());
    }

    #[test]
    fn record_serializes_as_ordered_map() {
        let record = Record::new()
            .with("Cow ID", "C1")
            .with("Feed Cost", 12.5)
            .with("Notes", "")
            .at_source_row(3);
        assert_eq!(record.source_row(), Some(3));
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"Cow ID":"C1","Feed Cost":12.5,"Notes":null}"#
        );
    }
}
