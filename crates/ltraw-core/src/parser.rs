//! Parse orchestration: probe, header scan, validation, payload decode

use std::path::Path;
use tracing::{info, instrument, warn};

use crate::demux::{self, BinaryLayout};
use crate::header::{self, HeaderText};
use crate::reader::ByteSource;
use crate::types::{Dataset, Metadata, RawError, Result, Warning};

/// Probe the first bytes of the file for the ASCII container variant.
///
/// Header text is stored as 2-byte code units, so byte offset 1 is the high
/// byte of the first unit and must be zero; the ASCII variant puts a printable
/// character there. Checked before any header scan.
fn check_binary_probe(source: &mut ByteSource) -> Result<()> {
    let probe = source.probe()?;
    if probe[1] != 0 {
        return Err(RawError::UnsupportedFormat("ascii"));
    }
    Ok(())
}

/// Probe, scan, and extract header metadata, enforcing the transient-type
/// precondition. The stream is left positioned after the header.
fn read_header(source: &mut ByteSource) -> Result<(HeaderText, Metadata, Vec<Warning>)> {
    check_binary_probe(source)?;

    let header = header::scan_header(source)?;
    let (metadata, mut warnings) = header::parse_metadata(&header.text)?;

    if !metadata.is_transient() {
        return Err(RawError::UnsupportedSimulationType(metadata.plot_name));
    }
    if metadata.is_stepped() {
        warn!("stepped simulation; only the first step will be decoded");
        warnings.push(Warning::SteppedSimulation);
    }

    Ok((header, metadata, warnings))
}

/// Parse one transient raw file into a fully materialized dataset.
///
/// The byte source is owned by this call and released on every exit path.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_impl<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let mut source = ByteSource::open(path)?;
    let (header, metadata, warnings) = read_header(&mut source)?;

    let layout = BinaryLayout {
        binary_start: header.binary_start_offset(),
        num_variables: metadata.variables.len(),
        num_points: metadata.point_count,
    };

    let (time, samples) = demux::decode_payload(&mut source, &layout, metadata.time_offset)?;

    info!(
        plot = %metadata.plot_name,
        points = time.len(),
        variables = samples.len(),
        "parse complete"
    );

    let variables = metadata.variables.iter().map(|v| v.name.clone()).collect();
    Ok(Dataset {
        time,
        variables,
        samples,
        metadata,
        warnings,
    })
}

/// Parse only the header of a transient raw file, without touching the
/// payload.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn parse_header_impl<P: AsRef<Path>>(path: P) -> Result<Metadata> {
    let mut source = ByteSource::open(path)?;
    let (_, metadata, _) = read_header(&mut source)?;
    Ok(metadata)
}
