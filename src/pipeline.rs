use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::KiraError;
use crate::record::{Cell, Column, Record, Schema, Table, check_unique};

/// Fields returned by a source for one key.
pub type Fields = BTreeMap<String, Cell>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Fields),
    /// The source answered and has nothing for the key.
    NotFound,
}

/// One external source, queried by key. Any `Err` is treated as a failed
/// lookup for that row only, unless it is a configuration error.
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn lookup(&self, key: &str) -> Result<Lookup, KiraError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub index: String,
    pub query: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct EnrichSpec {
    pub stage: String,
    pub key_field: String,
    pub new_fields: Vec<Column>,
}

#[derive(Debug)]
pub struct EnrichOutcome {
    pub table: Table,
    pub errors: Vec<ErrorRecord>,
}

/// Row-by-row enrichment against one source. Row count and order never
/// change here; expansion is a separate step.
#[derive(Debug, Clone)]
pub struct Enricher {
    spec: EnrichSpec,
    output_schema: Schema,
}

impl Enricher {
    pub fn new(input: &Schema, spec: EnrichSpec) -> Result<Self, KiraError> {
        input.require(&spec.key_field)?;
        check_unique(spec.new_fields.iter().map(|column| column.name.as_str()))?;
        let output_schema = input.extend(spec.stage.clone(), &spec.new_fields)?;
        Ok(Self {
            spec,
            output_schema,
        })
    }

    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn run(
        &self,
        table: Table,
        adapter: &dyn SourceAdapter,
        sink: &dyn ProgressSink,
    ) -> Result<EnrichOutcome, KiraError> {
        let (_, rows, indexed) = table.into_parts();
        let total = rows.len();
        let started = Instant::now();
        let mut errors = Vec::new();
        let mut enriched = Vec::with_capacity(total);

        sink.event(ProgressEvent {
            message: format!(
                "phase=Lookup; stage={} source={} rows={total}",
                self.spec.stage,
                adapter.name()
            ),
            elapsed: None,
        });

        for (position, mut row) in rows.into_iter().enumerate() {
            self.fill(&mut row, &Cell::Absent);
            let key_cell = row.get(&self.spec.key_field).clone();
            let Some(key) = key_cell.as_key() else {
                if key_cell == Cell::NoMatch {
                    self.fill(&mut row, &Cell::NoMatch);
                }
                debug!(index = row.index(), "no lookup key, row passed through");
                enriched.push(row);
                continue;
            };

            match adapter.lookup(key) {
                Ok(Lookup::Found(fields)) => self.merge(&mut row, fields)?,
                Ok(Lookup::NotFound) => self.fill(&mut row, &Cell::NoMatch),
                Err(err) if err.is_configuration() => return Err(err),
                Err(err) => {
                    warn!(index = row.index(), key, error = %err, "lookup failed");
                    errors.push(ErrorRecord {
                        index: row.index().to_string(),
                        query: key.to_string(),
                        message: err.to_string(),
                    });
                }
            }

            sink.event(ProgressEvent {
                message: format!("{}.row {}/{total}", adapter.name(), position + 1),
                elapsed: Some(started.elapsed()),
            });
            enriched.push(row);
        }

        Ok(EnrichOutcome {
            table: Table::new(self.output_schema.clone(), enriched).indexed(indexed),
            errors,
        })
    }

    fn fill(&self, row: &mut Record, cell: &Cell) {
        for column in &self.spec.new_fields {
            row.set(column.name.as_str(), cell.clone());
        }
    }

    fn merge(&self, row: &mut Record, fields: Fields) -> Result<(), KiraError> {
        for (field, cell) in fields {
            if !self.spec.new_fields.iter().any(|column| column.name == field) {
                return Err(KiraError::UnknownField {
                    stage: self.spec.stage.clone(),
                    field,
                });
            }
            row.set(field, cell);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;
    use crate::output::SilentOutput;

    struct FlakySource {
        fail_on: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl SourceAdapter for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        fn lookup(&self, key: &str) -> Result<Lookup, KiraError> {
            self.calls.lock().unwrap().push(key.to_string());
            if key == self.fail_on {
                return Err(KiraError::BindingDbHttp("connection reset".to_string()));
            }
            if key == "none" {
                return Ok(Lookup::NotFound);
            }
            Ok(Lookup::Found(Fields::from([(
                "target_name".to_string(),
                Cell::list([format!("target of {key}")]),
            )])))
        }
    }

    fn spec() -> EnrichSpec {
        EnrichSpec {
            stage: "bindingdb".to_string(),
            key_field: "SMILES".to_string(),
            new_fields: vec![Column::multi("target_name"), Column::multi("species")],
        }
    }

    fn table(keys: &[Option<&str>]) -> Table {
        let schema = Schema::scalars("compounds", ["C_ID", "SMILES"]).unwrap();
        let rows = keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let row = Record::new(i.to_string()).with("C_ID", Cell::text(format!("C{i}")));
                match key {
                    Some(key) => row.with("SMILES", Cell::text(*key)),
                    None => row,
                }
            })
            .collect();
        Table::new(schema, rows)
    }

    fn source(fail_on: &'static str) -> FlakySource {
        FlakySource {
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn failure_is_isolated_to_its_row() {
        let enricher = Enricher::new(table(&[]).schema(), spec()).unwrap();
        let source = source("CCN");
        let outcome = enricher
            .run(
                table(&[Some("CCO"), Some("CCN"), Some("CCC")]),
                &source,
                &SilentOutput,
            )
            .unwrap();

        assert_eq!(outcome.table.len(), 3);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].index, "1");
        assert_eq!(outcome.errors[0].query, "CCN");
        assert!(outcome.table.rows()[1].get("target_name").is_absent());
        assert_eq!(
            outcome.table.rows()[2].get("target_name"),
            &Cell::list(["target of CCC"])
        );
    }

    #[test]
    fn not_found_is_distinct_from_failure() {
        let enricher = Enricher::new(table(&[]).schema(), spec()).unwrap();
        let outcome = enricher
            .run(table(&[Some("none")]), &source("-"), &SilentOutput)
            .unwrap();
        let row = &outcome.table.rows()[0];
        assert_eq!(row.get("target_name"), &Cell::NoMatch);
        assert_eq!(row.get("species"), &Cell::NoMatch);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn rows_without_key_skip_the_source() {
        let enricher = Enricher::new(table(&[]).schema(), spec()).unwrap();
        let source = source("-");
        let outcome = enricher
            .run(table(&[None, Some("CCO")]), &source, &SilentOutput)
            .unwrap();
        assert_eq!(*source.calls.lock().unwrap(), vec!["CCO".to_string()]);
        assert!(outcome.table.rows()[0].get("target_name").is_absent());
        assert_eq!(outcome.table.rows()[0].get("C_ID"), &Cell::text("C0"));
    }

    #[test]
    fn missing_key_field_is_a_schema_error() {
        let schema = Schema::scalars("plants", ["Scientific Name"]).unwrap();
        let err = Enricher::new(&schema, spec()).unwrap_err();
        assert_matches!(err, KiraError::UnknownField { field, .. } if field == "SMILES");
    }

    #[test]
    fn undeclared_result_field_aborts() {
        struct Rogue;
        impl SourceAdapter for Rogue {
            fn name(&self) -> &str {
                "rogue"
            }
            fn lookup(&self, _key: &str) -> Result<Lookup, KiraError> {
                Ok(Lookup::Found(Fields::from([(
                    "affinity".to_string(),
                    Cell::text("12 nM"),
                )])))
            }
        }

        let enricher = Enricher::new(table(&[]).schema(), spec()).unwrap();
        let err = enricher
            .run(table(&[Some("CCO")]), &Rogue, &SilentOutput)
            .unwrap_err();
        assert_matches!(err, KiraError::UnknownField { field, .. } if field == "affinity");
    }
}
