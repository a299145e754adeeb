use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("field `{field}` is not declared by the {stage} schema")]
    #[diagnostic(help("declare the field in the stage schema before referencing it"))]
    UnknownField { stage: String, field: String },

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("invalid stage: {0}")]
    InvalidStage(String),

    #[error("invalid protein id: {0}")]
    InvalidProteinId(String),

    #[error("invalid KNApSAcK compound id: {0}")]
    InvalidCompoundId(String),

    #[error("missing config file kira-pb.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read table {path}: {message}")]
    TableRead { path: PathBuf, message: String },

    #[error("failed to write table {path}: {message}")]
    TableWrite { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("KNApSAcK request failed: {0}")]
    KnapsackHttp(String),

    #[error("KNApSAcK returned status {status}: {message}")]
    KnapsackStatus { status: u16, message: String },

    #[error("BindingDB request failed: {0}")]
    BindingDbHttp(String),

    #[error("BindingDB returned status {status}: {message}")]
    BindingDbStatus { status: u16, message: String },

    #[error("BindingDB search failed on the server side")]
    BindingDbServer,

    #[error("RCSB request failed: {0}")]
    RcsbHttp(String),

    #[error("RCSB returned status {status}: {message}")]
    RcsbStatus { status: u16, message: String },

    #[error("PDBj request failed: {0}")]
    PdbjHttp(String),

    #[error("PDBj returned status {status}: {message}")]
    PdbjStatus { status: u16, message: String },

    #[error("invalid structure link: {0}")]
    InvalidLink(String),
}

impl KiraError {
    /// Configuration and schema mistakes abort a run; everything else is
    /// recoverable at the row boundary.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KiraError::UnknownField { .. }
                | KiraError::DuplicateField(_)
                | KiraError::InvalidStage(_)
                | KiraError::MissingConfig
                | KiraError::ConfigRead(_)
                | KiraError::ConfigParse(_)
        )
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            KiraError::KnapsackHttp(_)
                | KiraError::KnapsackStatus { .. }
                | KiraError::BindingDbHttp(_)
                | KiraError::BindingDbStatus { .. }
                | KiraError::BindingDbServer
                | KiraError::RcsbHttp(_)
                | KiraError::RcsbStatus { .. }
                | KiraError::PdbjHttp(_)
                | KiraError::PdbjStatus { .. }
        )
    }
}
