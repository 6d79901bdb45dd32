use crate::identifier::IdentifierRef;
use crate::table::NULL_TOKEN;

/// What a default or override puts into a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    /// A constant, `None` for null.
    Literal(Option<String>),
    /// A fresh anonymous identity per row, taken from an identifier attribute.
    Identifier(IdentifierRef),
}

impl ColumnValue {
    /// A literal, reading the null token as a real null.
    pub fn literal(value: impl Into<String>) -> Self {
        let value = value.into();
        if value == NULL_TOKEN {
            Self::Literal(None)
        } else {
            Self::Literal(Some(value))
        }
    }
}

/// Ordered `column → value` assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnValues(Vec<(String, ColumnValue)>);

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: ColumnValue) {
        let column = column.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: ColumnValue) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&ColumnValue> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` overlaid with `other`: keys of `other` win, new keys are appended.
    pub fn merged(&self, other: &ColumnValues) -> ColumnValues {
        let mut merged = self.clone();
        for (column, value) in &other.0 {
            merged.insert(column.clone(), value.clone());
        }
        merged
    }
}

impl FromIterator<(String, ColumnValue)> for ColumnValues {
    fn from_iter<I: IntoIterator<Item = (String, ColumnValue)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (column, value) in iter {
            values.insert(column, value);
        }
        values
    }
}
