//! One-to-many row expansion.
//!
//! A parent row whose multi-value fields hold aligned lists becomes one child
//! row per position. Alignment is positional and the shortest list wins:
//! upstream sources report each list independently, so trailing values on a
//! longer list are dropped without an error. Whether that truncation matches
//! the real pairing in every source has not been verified against ground
//! truth.

use crate::error::KiraError;
use crate::record::{Cell, FieldKind, Record, Schema, Table, check_unique};

#[derive(Debug, Clone)]
pub struct Expander {
    multi: Vec<String>,
    scalars: Vec<String>,
    output_schema: Schema,
}

impl Expander {
    /// Fails with [`KiraError::UnknownField`] when a field is not part of
    /// `schema`, before any row is touched.
    pub fn new(schema: &Schema, multi_value_fields: &[&str]) -> Result<Self, KiraError> {
        check_unique(multi_value_fields.iter().copied())?;
        for field in multi_value_fields {
            schema.require(field)?;
        }
        let scalars = schema
            .field_names()
            .filter(|name| !multi_value_fields.contains(name))
            .map(str::to_string)
            .collect();
        Ok(Self {
            multi: multi_value_fields.iter().map(|f| f.to_string()).collect(),
            scalars,
            output_schema: schema.with_kind(multi_value_fields, FieldKind::Scalar),
        })
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn expand(&self, parent: &Record) -> Vec<Record> {
        let columns: Vec<Vec<Cell>> = self
            .multi
            .iter()
            .map(|field| split_cell(parent.get(field)))
            .collect();
        let n = columns.iter().map(Vec::len).min().unwrap_or(1);
        if n == 0 {
            return Vec::new();
        }

        let mut columns: Vec<_> = columns
            .into_iter()
            .map(|values| values.into_iter().take(n))
            .collect();
        let mut children = Vec::with_capacity(n);
        for _ in 0..n {
            let mut child = Record::new(parent.index());
            for field in &self.scalars {
                child.set(field.as_str(), parent.get(field).clone());
            }
            for (field, values) in self.multi.iter().zip(columns.iter_mut()) {
                child.set(field.as_str(), values.next().unwrap_or_default());
            }
            children.push(child);
        }
        children
    }

    /// Expands every parent, keeping parent order and each parent's children
    /// contiguous.
    pub fn expand_all(&self, parents: &[Record]) -> Vec<Record> {
        parents
            .iter()
            .flat_map(|parent| self.expand(parent))
            .collect()
    }

    /// Expands a whole table. Child rows get a fresh `0..n` index.
    pub fn expand_table(&self, table: &Table) -> Table {
        let mut rows = self.expand_all(table.rows());
        for (position, row) in rows.iter_mut().enumerate() {
            row.set_index(position.to_string());
        }
        Table::new(self.output_schema.clone(), rows).indexed(table.is_indexed())
    }
}

fn split_cell(cell: &Cell) -> Vec<Cell> {
    match cell {
        Cell::List(values) => values.iter().cloned().map(Cell::Text).collect(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::record::Column;

    fn binding_schema() -> Schema {
        Schema::new(
            "bindingdb",
            vec![
                Column::scalar("C_ID"),
                Column::scalar("SMILES"),
                Column::multi("target_name"),
                Column::multi("species"),
                Column::multi("bdb_id"),
            ],
        )
        .unwrap()
    }

    fn expander() -> Expander {
        Expander::new(&binding_schema(), &["target_name", "species", "bdb_id"]).unwrap()
    }

    fn parent(index: &str) -> Record {
        Record::new(index)
            .with("C_ID", Cell::text(format!("C{index}")))
            .with("SMILES", Cell::text("CCO"))
    }

    #[test]
    fn truncates_to_shortest_list() {
        let row = parent("0")
            .with("target_name", Cell::list(["Protease", "Integrase", "RT"]))
            .with("species", Cell::list(["HIV-1", "HIV-2"]))
            .with("bdb_id", Cell::list(["50001", "50002", "50003", "50004"]));

        let children = expander().expand(&row);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].get("target_name"), &Cell::text("Protease"));
        assert_eq!(children[0].get("species"), &Cell::text("HIV-1"));
        assert_eq!(children[0].get("bdb_id"), &Cell::text("50001"));
        assert_eq!(children[1].get("target_name"), &Cell::text("Integrase"));
        assert_eq!(children[1].get("species"), &Cell::text("HIV-2"));
        assert_eq!(children[1].get("bdb_id"), &Cell::text("50002"));
    }

    #[test]
    fn scalars_copied_to_every_child() {
        let row = parent("7")
            .with("target_name", Cell::list(["A", "B", "C"]))
            .with("species", Cell::list(["x", "y", "z"]))
            .with("bdb_id", Cell::list(["1", "2", "3"]));
        for child in expander().expand(&row) {
            assert_eq!(child.get("C_ID"), row.get("C_ID"));
            assert_eq!(child.get("SMILES"), row.get("SMILES"));
            assert_eq!(child.index(), "7");
        }
    }

    #[test]
    fn absent_field_counts_as_one() {
        let row = parent("0")
            .with("target_name", Cell::list(["A", "B", "C"]))
            .with("species", Cell::list(["x", "y", "z"]));
        let children = expander().expand(&row);
        assert_eq!(children.len(), 1);
        assert!(children[0].get("bdb_id").is_absent());
        assert_eq!(children[0].get("target_name"), &Cell::text("A"));
    }

    #[test]
    fn no_match_survives_as_single_child() {
        let row = parent("0")
            .with("target_name", Cell::NoMatch)
            .with("species", Cell::NoMatch)
            .with("bdb_id", Cell::NoMatch);
        let children = expander().expand(&row);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].get("species"), &Cell::NoMatch);
    }

    #[test]
    fn empty_list_drops_parent() {
        let row = parent("0")
            .with("target_name", Cell::List(Vec::new()))
            .with("species", Cell::list(["x"]))
            .with("bdb_id", Cell::list(["1"]));
        assert!(expander().expand(&row).is_empty());
    }

    #[test]
    fn expand_all_keeps_parent_order() {
        let first = parent("0")
            .with("target_name", Cell::list(["A", "B"]))
            .with("species", Cell::list(["x", "y"]))
            .with("bdb_id", Cell::list(["1", "2"]));
        let second = parent("1")
            .with("target_name", Cell::text("C"))
            .with("species", Cell::text("z"))
            .with("bdb_id", Cell::text("3"));

        let children = expander().expand_all(&[first, second]);
        let order: Vec<_> = children
            .iter()
            .map(|child| child.get("target_name").as_text().unwrap())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(children[2].get("C_ID"), &Cell::text("C1"));
    }

    #[test]
    fn undeclared_field_rejected_up_front() {
        let err = Expander::new(&binding_schema(), &["target_name", "pdb_link"]).unwrap_err();
        assert_matches!(err, KiraError::UnknownField { field, .. } if field == "pdb_link");
    }

    #[test]
    fn expanded_table_is_scalar_and_reindexed() {
        let row = parent("12")
            .with("target_name", Cell::list(["A", "B"]))
            .with("species", Cell::list(["x", "y"]))
            .with("bdb_id", Cell::list(["1", "2"]));
        let table = Table::new(binding_schema(), vec![row]).indexed(true);

        let expanded = expander().expand_table(&table);
        assert!(expanded.is_indexed());
        assert_eq!(expanded.schema().kind("species"), Some(FieldKind::Scalar));
        let indices: Vec<_> = expanded.rows().iter().map(Record::index).collect();
        assert_eq!(indices, vec!["0", "1"]);
    }
}
