//! Header scanning and metadata extraction
//!
//! The textual header is stored as little-endian 16-bit code units and ends
//! just past the "Binary:" label. Scanning reads fixed-size chunks and
//! rescans the accumulated buffer every round, since the end marker may
//! straddle a chunk boundary.

use std::io::Read;
use tracing::{debug, warn};

use crate::types::{Metadata, RawError, Result, Variable, Warning};

/// End-of-header marker: "Binary:" minus its first letter, so a match is
/// still found when a chunk cut lands inside the label.
const HEADER_MARKER: &str = "inary";

/// Code units kept past the start of the marker; covers "inary:".
const MARKER_TAIL_UNITS: usize = 6;

/// Hard ceiling on header length, in code units.
pub const MAX_HEADER_UNITS: usize = 10_000;

/// Code units decoded per scan round.
const SCAN_CHUNK_UNITS: usize = 64;

/// Scanned header text plus its length in 16-bit code units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderText {
    pub text: String,
    pub length_units: usize,
}

impl HeaderText {
    /// Byte offset where the binary payload begins.
    pub fn binary_start_offset(&self) -> u64 {
        self.length_units as u64 * 2
    }
}

/// Find subsequence in a code-unit slice
#[inline]
fn find_subsequence(haystack: &[u16], needle: &[u16]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Fill `buf` from `reader`, stopping early only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Scan forward from the current stream position until the end-of-header
/// marker is found.
///
/// Returns the header text truncated to `marker index + 6` code units, whose
/// doubled length is the byte offset of the binary payload.
pub fn scan_header<R: Read>(reader: &mut R) -> Result<HeaderText> {
    let marker: Vec<u16> = HEADER_MARKER.encode_utf16().collect();
    let mut units: Vec<u16> = Vec::with_capacity(SCAN_CHUNK_UNITS * 4);
    let mut chunk = [0u8; SCAN_CHUNK_UNITS * 2];

    loop {
        let n = read_full(reader, &mut chunk)?;
        for pair in chunk[..n - n % 2].chunks_exact(2) {
            units.push(u16::from_le_bytes([pair[0], pair[1]]));
        }

        if let Some(pos) = find_subsequence(&units, &marker) {
            // The trailing colon may sit in the next chunk; top up before
            // truncating.
            while units.len() < pos + MARKER_TAIL_UNITS {
                let mut pair = [0u8; 2];
                reader.read_exact(&mut pair)?;
                units.push(u16::from_le_bytes([pair[0], pair[1]]));
            }
            units.truncate(pos + MARKER_TAIL_UNITS);
            let text = String::from_utf16_lossy(&units);
            debug!(units = units.len(), "header scanned");
            return Ok(HeaderText {
                text,
                length_units: units.len(),
            });
        }

        if n < chunk.len() || units.len() > MAX_HEADER_UNITS {
            return Err(RawError::MarkerNotFound {
                limit: MAX_HEADER_UNITS,
            });
        }
    }
}

// ============================================================================
// Metadata extraction
// ============================================================================

/// Extract the remainder of the first line starting with `label`, trimmed.
fn field_after<'a>(header: &'a str, label: &str) -> Option<&'a str> {
    header
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
}

/// Parse the variable declaration lines between "Variables:" and the
/// "Binary" line. Index 0 is the implicit time channel and is skipped.
fn parse_variable_lines(header: &str) -> Result<Vec<Variable>> {
    let mut in_section = false;
    let mut variables = Vec::new();

    for line in header.lines() {
        let trimmed = line.trim();
        if in_section && trimmed.starts_with("Binary") {
            break;
        }
        if trimmed.starts_with("Variables:") {
            in_section = true;
            continue;
        }
        if !in_section || trimmed.is_empty() {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        if let (Some(index), Some(name), Some(var_type)) =
            (parts.next(), parts.next(), parts.next())
        {
            match index.parse::<usize>() {
                Ok(0) | Err(_) => {}
                Ok(_) => variables.push(Variable {
                    name: name.to_string(),
                    var_type: var_type.to_string(),
                }),
            }
        }
    }

    if !in_section {
        return Err(RawError::MissingSection("Variables"));
    }
    Ok(variables)
}

/// Parse the header text into structured metadata. Pure function, no I/O.
///
/// A disagreement between the declared variable count and the parsed list is
/// recoverable; the parsed list is authoritative for decoding.
pub fn parse_metadata(header: &str) -> Result<(Metadata, Vec<Warning>)> {
    let plot_name = field_after(header, "Plotname:")
        .unwrap_or("Unknown")
        .to_string();
    let flags = field_after(header, "Flags:").unwrap_or("").to_string();

    // The header's raw count includes the time channel.
    let declared_variable_count = field_after(header, "No. Variables:")
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or(RawError::MissingField("num_vars"))?
        .saturating_sub(1);

    let point_count = field_after(header, "No. Points:")
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or(RawError::MissingField("num_points"))?;

    let time_offset = field_after(header, "Offset:")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);

    let variables = parse_variable_lines(header)?;

    let mut warnings = Vec::new();
    if variables.len() != declared_variable_count {
        warn!(
            declared = declared_variable_count,
            parsed = variables.len(),
            "variable count mismatch; using the parsed list"
        );
        warnings.push(Warning::VariableCountMismatch {
            declared: declared_variable_count,
            parsed: variables.len(),
        });
    }

    debug!(
        plot = %plot_name,
        variables = variables.len(),
        points = point_count,
        "metadata extracted"
    );

    Ok((
        Metadata {
            plot_name,
            flags,
            declared_variable_count,
            point_count,
            time_offset,
            variables,
        },
        warnings,
    ))
}

// ============================================================================
// Tests
// ============================================================================
