//! # Transient Raw Waveform Reader - Core Library
//!
//! Parses the binary raw container written by transient circuit simulations
//! into an in-memory time vector plus per-signal samples and metadata.
//!
//! ## Supported Layout
//!
//! - Textual header in little-endian 2-byte code units, terminated by the
//!   "Binary:" label
//! - Double-precision time channel, single-precision variable channels,
//!   interleaved little-endian records
//! - Transient analyses only; for stepped runs, the first step
//!
//! The ASCII container variant and non-transient analyses are rejected.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let data = ltraw_core::read("simulation.raw").unwrap();
//! println!("Plot: {}", data.metadata.plot_name);
//! println!("Points: {}", data.num_points());
//!
//! // Access a channel by name
//! if let Some(vout) = data.get("V(out)") {
//!     println!("V(out) first sample: {}", vout[0]);
//! }
//!
//! // Recoverable conditions ride along with the dataset
//! for warning in &data.warnings {
//!     eprintln!("warning: {}", warning);
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//!
//! let data = ltraw_core::read("simulation.raw").unwrap();
//! ```

mod demux;
mod header;
mod parser;
mod reader;
mod types;

// Re-export public types
pub use types::{Channel, Dataset, Metadata, RawError, Result, Variable, Warning};

// ============================================================================
// Public API Functions
// ============================================================================

/// Read a binary transient raw file.
///
/// # Arguments
/// * `path` - Path to the raw waveform file
///
/// # Returns
/// * `Ok(Dataset)` - Decoded time axis, sample matrix, metadata, and any
///   recoverable warnings
/// * `Err(RawError)` - If the file cannot be read, is not the binary
///   transient layout, or the payload is shorter than the header declares
///
/// # Example
/// ```rust,no_run
/// let data = ltraw_core::read("simulation.raw").unwrap();
/// assert_eq!(data.time.len(), data.metadata.point_count);
/// ```
pub fn read<P: AsRef<std::path::Path>>(path: P) -> Result<Dataset> {
    parser::parse_impl(path)
}

/// Read only the header of a binary transient raw file.
///
/// Useful for inspecting variable names and point counts without decoding
/// the payload.
pub fn read_metadata<P: AsRef<std::path::Path>>(path: P) -> Result<Metadata> {
    parser::parse_header_impl(path)
}
