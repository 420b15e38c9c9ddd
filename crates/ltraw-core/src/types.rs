//! Common types, errors, and warnings for raw file parsing

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Identifies which payload channel a read error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Time,
    /// 1-indexed variable channel, in header declaration order.
    Variable(usize),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Time => write!(f, "time"),
            Channel::Variable(l) => write!(f, "variable {}", l),
        }
    }
}

/// Error type for raw file parsing.
///
/// Every variant is fatal: the parse is aborted, the input file is released,
/// and no partial dataset is returned. Recoverable conditions are reported as
/// [`Warning`]s on the dataset instead.
#[derive(Debug, Error)]
pub enum RawError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot open {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported {0} container; only the binary layout is supported")]
    UnsupportedFormat(&'static str),

    #[error("binary marker not found within the first {limit} header units")]
    MarkerNotFound { limit: usize },

    #[error("missing required header field: {0}")]
    MissingField(&'static str),

    #[error("missing header section: {0}")]
    MissingSection(&'static str),

    #[error("plot '{0}' is not a transient simulation")]
    UnsupportedSimulationType(String),

    #[error("short read on {channel} channel: expected {expected} samples, got {got}")]
    ShortRead {
        channel: Channel,
        expected: usize,
        got: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, RawError>;

// ============================================================================
// Warnings
// ============================================================================

/// Recoverable conditions surfaced alongside a complete, usable dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// Header count and parsed variable list disagree; the parsed list wins.
    VariableCountMismatch { declared: usize, parsed: usize },
    /// Stepped run detected; only the first step is decoded.
    SteppedSimulation,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::VariableCountMismatch { declared, parsed } => write!(
                f,
                "header declares {} variables but {} were parsed; using the parsed list",
                declared, parsed
            ),
            Warning::SteppedSimulation => {
                write!(f, "stepped simulation; only the first step is decoded")
            }
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// One non-time channel declared in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// Free-text type label from the header, e.g. "voltage" or "device_current".
    pub var_type: String,
}

/// Structured metadata extracted from the textual header.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// Simulation title, e.g. "Transient Analysis".
    pub plot_name: String,
    /// Free-text flags line.
    pub flags: String,
    /// Variable count declared by the header, time channel excluded.
    pub declared_variable_count: usize,
    /// Samples per channel.
    pub point_count: usize,
    /// Additive offset applied to every time sample.
    pub time_offset: f64,
    /// Non-time channels in header declaration order; position equals the
    /// column index in the decoded sample matrix.
    pub variables: Vec<Variable>,
}

impl Metadata {
    pub fn is_transient(&self) -> bool {
        self.plot_name.to_lowercase().contains("transient")
    }

    pub fn is_stepped(&self) -> bool {
        self.flags.to_lowercase().contains("stepped")
    }
}

/// Fully decoded transient dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Time axis, `point_count` entries, offset already applied.
    pub time: Vec<f64>,
    /// Variable names, time channel excluded.
    pub variables: Vec<String>,
    /// One column per variable, each of length `point_count`. Values are
    /// stored as f32 on disk and widened on load.
    pub samples: Vec<Vec<f64>>,
    pub metadata: Metadata,
    /// Recoverable conditions encountered during the parse.
    pub warnings: Vec<Warning>,
}

impl Dataset {
    pub fn num_points(&self) -> usize {
        self.time.len()
    }

    pub fn num_variables(&self) -> usize {
        self.samples.len()
    }

    /// Look up one channel's samples by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.variables
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| self.samples[i].as_slice())
    }
}
