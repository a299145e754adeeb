use std::fs;
use std::io::Write;
use std::path::Path;

use crate::codec;
use crate::error::KiraError;
use crate::pipeline::ErrorRecord;
use crate::record::{Cell, Column, FieldKind, Record, Schema, Table};

pub const DEFAULT_NO_MATCH_LABEL: &str = "No Similarity Matches";
pub const ERROR_HEADERS: [&str; 3] = ["Index", "Query", "Error"];

/// How cells are interpreted at the CSV boundary.
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Columns whose cells are `", "`-joined lists.
    pub multi: Vec<String>,
    pub no_match_label: String,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            multi: Vec::new(),
            no_match_label: DEFAULT_NO_MATCH_LABEL.to_string(),
        }
    }
}

impl TableFormat {
    pub fn with_multi(mut self, fields: &[&str]) -> Self {
        self.multi = fields.iter().map(|field| field.to_string()).collect();
        self
    }

    pub fn with_no_match_label(mut self, label: impl Into<String>) -> Self {
        self.no_match_label = label.into();
        self
    }
}

/// Reads a CSV table. A first column with an empty (or pandas `Unnamed: 0`)
/// header is taken as the row index.
pub fn read_table(path: &Path, name: &str, format: &TableFormat) -> Result<Table, KiraError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| read_error(path, err))?;
    let headers = reader
        .headers()
        .map_err(|err| read_error(path, err))?
        .clone();
    let indexed = headers
        .get(0)
        .is_some_and(|header| header.is_empty() || header == "Unnamed: 0");

    let columns = headers
        .iter()
        .skip(usize::from(indexed))
        .map(|header| {
            if format.multi.iter().any(|field| field == header) {
                Column::multi(header)
            } else {
                Column::scalar(header)
            }
        })
        .collect();
    let schema = Schema::new(name, columns)?;

    let mut rows = Vec::new();
    for (position, result) in reader.records().enumerate() {
        let raw = result.map_err(|err| read_error(path, err))?;
        let mut values = raw.iter();
        let index = if indexed {
            values.next().unwrap_or_default().to_string()
        } else {
            position.to_string()
        };
        let mut row = Record::new(index);
        for (column, value) in schema.columns().iter().zip(values) {
            row.set(
                column.name.as_str(),
                parse_cell(value, column.kind, &format.no_match_label),
            );
        }
        rows.push(row);
    }
    Ok(Table::new(schema, rows).indexed(indexed))
}

pub fn write_table(path: &Path, table: &Table, no_match_label: &str) -> Result<(), KiraError> {
    write_atomic(path, |writer| {
        let mut header = Vec::new();
        if table.is_indexed() {
            header.push("");
        }
        header.extend(table.schema().field_names());
        writer.write_record(&header)?;

        for row in table.rows() {
            let mut record = Vec::with_capacity(header.len());
            if table.is_indexed() {
                record.push(row.index().to_string());
            }
            for field in table.schema().field_names() {
                record.push(render_cell(row.get(field), no_match_label));
            }
            writer.write_record(&record)?;
        }
        Ok(())
    })
}

/// Writes the three-column error table. The header is written even when
/// there are no errors.
pub fn write_errors(path: &Path, errors: &[ErrorRecord]) -> Result<(), KiraError> {
    write_atomic(path, |writer| {
        writer.write_record(ERROR_HEADERS)?;
        for error in errors {
            writer.write_record([&error.index, &error.query, &error.message])?;
        }
        Ok(())
    })
}

fn parse_cell(raw: &str, kind: FieldKind, no_match_label: &str) -> Cell {
    if raw.is_empty() {
        return Cell::Absent;
    }
    if raw == no_match_label {
        return Cell::NoMatch;
    }
    match kind {
        FieldKind::Scalar => Cell::text(raw),
        FieldKind::Multi => Cell::List(codec::decode(Some(raw)).into_iter().flatten().collect()),
    }
}

fn render_cell(cell: &Cell, no_match_label: &str) -> String {
    match cell {
        Cell::Absent => String::new(),
        Cell::NoMatch => no_match_label.to_string(),
        Cell::Text(value) => value.clone(),
        Cell::List(values) => codec::encode(values),
    }
}

fn write_atomic<F>(path: &Path, write: F) -> Result<(), KiraError>
where
    F: FnOnce(&mut csv::Writer<&mut fs::File>) -> Result<(), csv::Error>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| write_error(path, err))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-pb-table")
        .tempfile_in(parent)
        .map_err(|err| write_error(path, err))?;
    {
        let mut writer = csv::Writer::from_writer(temp.as_file_mut());
        write(&mut writer).map_err(|err| write_error(path, err))?;
        writer.flush().map_err(|err| write_error(path, err))?;
    }
    temp.persist(path).map_err(|err| write_error(path, err))?;
    Ok(())
}

fn read_error(path: &Path, err: impl ToString) -> KiraError {
    KiraError::TableRead {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn write_error(path: &Path, err: impl ToString) -> KiraError {
    KiraError::TableWrite {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
