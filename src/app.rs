use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::bindingdb::BindingDbHttpClient;
use crate::config::{ResolvedConfig, StageRequest};
use crate::domain::StageKind;
use crate::error::KiraError;
use crate::explode::Expander;
use crate::knapsack::KnapsackHttpClient;
use crate::pdbj::{FastaSource, PdbjHttpClient};
use crate::pipeline::{Enricher, ErrorRecord, SourceAdapter};
use crate::rcsb::{LinkQuerySource, RcsbHttpClient, StructureSource, TitleSource};
use crate::record::Table;
use crate::store::Store;
use crate::table::{TableFormat, read_table, write_errors, write_table};

#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    pub stage: String,
    pub input: String,
    pub output: String,
    pub errors: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub stages: Vec<StageResult>,
}

impl RunResult {
    pub fn error_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.error_count).sum()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Source adapters for one run, built once and shared by every stage.
#[derive(Default)]
pub struct Session {
    adapters: HashMap<StageKind, Box<dyn SourceAdapter>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live HTTP clients for every lookup stage.
    pub fn connect(config: &ResolvedConfig, store: Store) -> Result<Self, KiraError> {
        let rcsb = RcsbHttpClient::new()?;
        let pdbj = PdbjHttpClient::new()?;
        Ok(Self::new()
            .with_adapter(StageKind::Knapsack, KnapsackHttpClient::new()?)
            .with_adapter(
                StageKind::Bindingdb,
                BindingDbHttpClient::new(config.similarity)?,
            )
            .with_adapter(StageKind::PdbQuery, LinkQuerySource)
            .with_adapter(StageKind::Structures, StructureSource::new(rcsb.clone()))
            .with_adapter(StageKind::Titles, TitleSource::new(rcsb))
            .with_adapter(
                StageKind::Fasta,
                FastaSource::new(pdbj, store, config.use_cache),
            ))
    }

    pub fn with_adapter(
        mut self,
        kind: StageKind,
        adapter: impl SourceAdapter + 'static,
    ) -> Self {
        self.adapters.insert(kind, Box::new(adapter));
        self
    }

    pub fn adapter(&self, kind: StageKind) -> Result<&dyn SourceAdapter, KiraError> {
        self.adapters
            .get(&kind)
            .map(|adapter| adapter.as_ref())
            .ok_or_else(|| KiraError::InvalidStage(format!("{kind} has no configured source")))
    }
}

pub struct App {
    session: Session,
    no_match_label: String,
}

impl App {
    pub fn new(session: Session, no_match_label: impl Into<String>) -> Self {
        Self {
            session,
            no_match_label: no_match_label.into(),
        }
    }

    /// Runs the stages in order. Row-level lookup failures end up in each
    /// stage's error table; anything else stops the run.
    pub fn run(
        &self,
        stages: &[StageRequest],
        sink: &dyn ProgressSink,
    ) -> Result<RunResult, KiraError> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(stages.len());
        for (position, request) in stages.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Stage; {} ({}/{})",
                    request.kind,
                    position + 1,
                    stages.len()
                ),
                elapsed: Some(started.elapsed()),
            });
            results.push(self.run_stage(request, sink)?);
        }
        Ok(RunResult { stages: results })
    }

    pub fn run_stage(
        &self,
        request: &StageRequest,
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, KiraError> {
        let kind = request.kind;
        self.process(
            request,
            kind.input_multi_fields(),
            kind.expand_fields(),
            sink,
        )
    }

    /// Expands arbitrary joined columns of a table, one row per position.
    pub fn explode(
        &self,
        request: &StageRequest,
        fields: &[&str],
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, KiraError> {
        self.process(request, fields, fields, sink)
    }

    fn process(
        &self,
        request: &StageRequest,
        multi_fields: &[&str],
        expand_fields: &[&str],
        sink: &dyn ProgressSink,
    ) -> Result<StageResult, KiraError> {
        let kind = request.kind;
        sink.event(ProgressEvent {
            message: format!("phase=Read; {}", request.input.display()),
            elapsed: None,
        });
        let format = TableFormat::default()
            .with_multi(multi_fields)
            .with_no_match_label(self.no_match_label.as_str());
        let table = read_table(&request.input, kind.as_str(), &format)?;
        let rows_in = table.len();

        let (table, errors) = self.enrich(kind, table, sink)?;
        let table = if expand_fields.is_empty() {
            table
        } else {
            Expander::new(table.schema(), expand_fields)?.expand_table(&table)
        };

        sink.event(ProgressEvent {
            message: format!("phase=Write; {}", request.output.display()),
            elapsed: None,
        });
        write_table(&request.output, &table, &self.no_match_label)?;
        write_errors(&request.errors, &errors)?;

        info!(
            stage = kind.as_str(),
            rows_in,
            rows_out = table.len(),
            errors = errors.len(),
            "stage finished"
        );
        Ok(StageResult {
            stage: kind.to_string(),
            input: display(&request.input),
            output: display(&request.output),
            errors: display(&request.errors),
            rows_in,
            rows_out: table.len(),
            error_count: errors.len(),
        })
    }

    fn enrich(
        &self,
        kind: StageKind,
        table: Table,
        sink: &dyn ProgressSink,
    ) -> Result<(Table, Vec<ErrorRecord>), KiraError> {
        let Some(spec) = kind.enrich_spec() else {
            return Ok((table, Vec::new()));
        };
        let adapter = self.session.adapter(kind)?;
        let enricher = Enricher::new(table.schema(), spec)?;
        let outcome = enricher.run(table, adapter, sink)?;
        Ok((outcome.table, outcome.errors))
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
