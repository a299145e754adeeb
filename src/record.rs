use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::KiraError;

/// One cell of a pipeline row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Cell {
    /// Nothing known: never looked up, or the lookup failed.
    #[default]
    Absent,
    /// Looked up, and the source reported nothing.
    NoMatch,
    Text(String),
    List(Vec<String>),
}

static ABSENT: Cell = Cell::Absent;

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Cell::List(values.into_iter().map(Into::into).collect())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Cell::Absent)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    /// The value used as a lookup key: trimmed scalar text, or the only
    /// element of a one-element list.
    pub fn as_key(&self) -> Option<&str> {
        let value = match self {
            Cell::Text(value) => value.as_str(),
            Cell::List(values) if values.len() == 1 => values[0].as_str(),
            _ => return None,
        };
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Scalar,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: FieldKind,
}

impl Column {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
        }
    }

    pub fn multi(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Multi,
        }
    }
}

/// Ordered column declaration for one stage's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, KiraError> {
        check_unique(columns.iter().map(|column| column.name.as_str()))?;
        Ok(Self {
            name: name.into(),
            columns,
        })
    }

    pub fn scalars<I, S>(name: impl Into<String>, fields: I) -> Result<Self, KiraError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, fields.into_iter().map(Column::scalar).collect())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.columns
            .iter()
            .find(|column| column.name == field)
            .map(|column| column.kind)
    }

    pub fn require(&self, field: &str) -> Result<FieldKind, KiraError> {
        self.kind(field).ok_or_else(|| KiraError::UnknownField {
            stage: self.name.clone(),
            field: field.to_string(),
        })
    }

    /// Appends `columns`, redeclaring any that already exist in place.
    pub fn extend(&self, name: impl Into<String>, columns: &[Column]) -> Result<Self, KiraError> {
        check_unique(columns.iter().map(|column| column.name.as_str()))?;
        let mut merged = self.columns.clone();
        for column in columns {
            match merged.iter_mut().find(|existing| existing.name == column.name) {
                Some(existing) => existing.kind = column.kind,
                None => merged.push(column.clone()),
            }
        }
        Ok(Self {
            name: name.into(),
            columns: merged,
        })
    }

    /// Same columns, with `fields` switched to `kind`. Unknown names are ignored.
    pub fn with_kind(&self, fields: &[&str], kind: FieldKind) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                if fields.contains(&column.name.as_str()) {
                    Column {
                        name: column.name.clone(),
                        kind,
                    }
                } else {
                    column.clone()
                }
            })
            .collect();
        Self {
            name: self.name.clone(),
            columns,
        }
    }
}

pub(crate) fn check_unique<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), KiraError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(KiraError::DuplicateField(name.to_string()));
        }
    }
    Ok(())
}

/// A row keyed by field name. The index is the row label carried through the
/// CSV files and reported in error tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    index: String,
    cells: HashMap<String, Cell>,
}

impl Record {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            cells: HashMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, cell: Cell) -> Self {
        self.set(field, cell);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn set_index(&mut self, index: impl Into<String>) {
        self.index = index.into();
    }

    pub fn get(&self, field: &str) -> &Cell {
        self.cells.get(field).unwrap_or(&ABSENT)
    }

    pub fn set(&mut self, field: impl Into<String>, cell: Cell) {
        self.cells.insert(field.into(), cell);
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    schema: Schema,
    rows: Vec<Record>,
    indexed: bool,
}

impl Table {
    pub fn new(schema: Schema, rows: Vec<Record>) -> Self {
        Self {
            schema,
            rows,
            indexed: false,
        }
    }

    /// Marks the table as carrying an explicit index column on disk.
    pub fn indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_parts(self) -> (Schema, Vec<Record>, bool) {
        (self.schema, self.rows, self.indexed)
    }
}
