//! Stride-addressed decoding of the interleaved binary payload
//!
//! Each record in the payload holds one 8-byte time value followed by one
//! 4-byte value per variable, all little-endian. A channel is recovered by
//! seeking to its first sample and skipping a fixed stride between reads.
//!
//! Variable channel reads occasionally under-deliver and succeed when the
//! same stride read is re-issued, so they carry a bounded retry budget. The
//! retry policy itself is a pure function, kept apart from the I/O call.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use tracing::{debug, trace};

use crate::types::{Channel, RawError, Result};

/// Total attempts allowed for one variable channel read.
pub const MAX_READ_ATTEMPTS: usize = 5;

// ============================================================================
// Layout arithmetic
// ============================================================================

/// Byte addressing for the interleaved payload, derived from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryLayout {
    /// Byte offset of the payload: header length in code units, doubled.
    pub binary_start: u64,
    /// Channels excluding time.
    pub num_variables: usize,
    /// Samples per channel.
    pub num_points: usize,
}

impl BinaryLayout {
    /// Bytes skipped between successive time samples.
    pub fn time_stride(&self) -> u64 {
        4 * self.num_variables as u64
    }

    /// Bytes skipped between successive samples of one variable channel.
    pub fn variable_stride(&self) -> u64 {
        4 * self.num_variables.saturating_sub(1) as u64 + 8
    }

    /// Byte offset of channel `l`'s first sample, 1-indexed.
    pub fn variable_column_offset(&self, l: usize) -> u64 {
        self.binary_start + 8 + 4 * (l as u64 - 1)
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Outcome of one read attempt against the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Succeed,
    Retry,
    Fail,
}

/// Decide what to do after attempt number `attempt` delivered `got` of
/// `expected` samples.
pub fn retry_decision(attempt: usize, got: usize, expected: usize) -> RetryDecision {
    if got >= expected {
        RetryDecision::Succeed
    } else if attempt < MAX_READ_ATTEMPTS {
        RetryDecision::Retry
    } else {
        RetryDecision::Fail
    }
}

// ============================================================================
// Strided reads
// ============================================================================

/// Read up to `count` 8-byte values at a fixed stride, stopping early at end
/// of input.
fn read_strided_f64<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    count: usize,
    skip: u64,
) -> Result<Vec<f64>> {
    reader.seek(SeekFrom::Start(start))?;
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        match reader.read_f64::<LittleEndian>() {
            Ok(v) => values.push(v),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if i + 1 < count {
            reader.seek(SeekFrom::Current(skip as i64))?;
        }
    }
    Ok(values)
}

/// Read up to `count` 4-byte values at a fixed stride, widened to f64.
fn read_strided_f32<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    count: usize,
    skip: u64,
) -> Result<Vec<f64>> {
    reader.seek(SeekFrom::Start(start))?;
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        match reader.read_f32::<LittleEndian>() {
            Ok(v) => values.push(v as f64),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if i + 1 < count {
            reader.seek(SeekFrom::Current(skip as i64))?;
        }
    }
    Ok(values)
}

// ============================================================================
// Channel decoding
// ============================================================================

/// Decode the time channel.
///
/// Raw time values carry signed deltas in some export modes; the absolute
/// value restores a usable axis before the header offset is added.
pub fn decode_time<R: Read + Seek>(
    reader: &mut R,
    layout: &BinaryLayout,
    time_offset: f64,
) -> Result<Vec<f64>> {
    let raw = read_strided_f64(
        reader,
        layout.binary_start,
        layout.num_points,
        layout.time_stride(),
    )?;
    if raw.len() < layout.num_points {
        return Err(RawError::ShortRead {
            channel: Channel::Time,
            expected: layout.num_points,
            got: raw.len(),
        });
    }
    Ok(raw.into_iter().map(|v| v.abs() + time_offset).collect())
}

/// Decode one variable channel (1-indexed), retrying the full stride read
/// from the same position when it under-delivers.
pub fn decode_variable<R: Read + Seek>(
    reader: &mut R,
    layout: &BinaryLayout,
    l: usize,
) -> Result<Vec<f64>> {
    let start = layout.variable_column_offset(l);
    let skip = layout.variable_stride();

    let mut attempt = 1;
    loop {
        let values = read_strided_f32(reader, start, layout.num_points, skip)?;
        match retry_decision(attempt, values.len(), layout.num_points) {
            RetryDecision::Succeed => return Ok(values),
            RetryDecision::Retry => {
                trace!(
                    channel = l,
                    attempt,
                    got = values.len(),
                    expected = layout.num_points,
                    "short read, retrying"
                );
                attempt += 1;
            }
            RetryDecision::Fail => {
                return Err(RawError::ShortRead {
                    channel: Channel::Variable(l),
                    expected: layout.num_points,
                    got: values.len(),
                });
            }
        }
    }
}

/// Decode the time channel and every variable channel described by the
/// layout, in declaration order.
pub fn decode_payload<R: Read + Seek>(
    reader: &mut R,
    layout: &BinaryLayout,
    time_offset: f64,
) -> Result<(Vec<f64>, Vec<Vec<f64>>)> {
    let time = decode_time(reader, layout, time_offset)?;

    let mut samples = Vec::with_capacity(layout.num_variables);
    for l in 1..=layout.num_variables {
        samples.push(decode_variable(reader, layout, l)?);
    }

    debug!(
        points = layout.num_points,
        channels = layout.num_variables,
        "payload decoded"
    );
    Ok((time, samples))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Interleave a time vector and variable columns into payload bytes.
    fn build_payload(time: &[f64], columns: &[Vec<f32>]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, t) in time.iter().enumerate() {
            out.extend_from_slice(&t.to_le_bytes());
            for col in columns {
                out.extend_from_slice(&col[i].to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn layout_column_offsets_are_adjacent() {
        let layout = BinaryLayout {
            binary_start: 100,
            num_variables: 4,
            num_points: 10,
        };
        for l in 1..layout.num_variables {
            assert_eq!(
                layout.variable_column_offset(l + 1) - layout.variable_column_offset(l),
                4
            );
        }
        assert_eq!(layout.variable_column_offset(1), 108);
    }

    #[test]
    fn layout_strides_cover_one_record() {
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 3,
            num_points: 1,
        };
        // Record size is 8 + 4 * num_variables; each stride plus its value
        // width must step exactly one record.
        assert_eq!(layout.time_stride() + 8, 20);
        assert_eq!(layout.variable_stride() + 4, 20);
    }

    #[test]
    fn retry_decision_table() {
        assert_eq!(retry_decision(1, 10, 10), RetryDecision::Succeed);
        assert_eq!(retry_decision(5, 10, 10), RetryDecision::Succeed);
        assert_eq!(retry_decision(1, 3, 10), RetryDecision::Retry);
        assert_eq!(retry_decision(4, 9, 10), RetryDecision::Retry);
        assert_eq!(retry_decision(5, 9, 10), RetryDecision::Fail);
    }

    #[test]
    fn decode_time_applies_abs_and_offset() {
        let time = [0.0f64, -1e-9, 2e-9, -3e-9];
        let col = vec![vec![1.0f32, 2.0, 3.0, 4.0]];
        let payload = build_payload(&time, &col);
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 1,
            num_points: 4,
        };

        let decoded = decode_time(&mut Cursor::new(payload), &layout, 5e-10).unwrap();
        let expected: Vec<f64> = time.iter().map(|t| t.abs() + 5e-10).collect();
        assert_eq!(decoded, expected);
        assert!(decoded.iter().all(|&t| t >= 5e-10));
    }

    #[test]
    fn decode_payload_demuxes_columns() {
        let time = [0.0f64, 1.0, 2.0];
        let cols = vec![vec![1.0f32, 2.0, 3.0], vec![-1.0f32, -2.0, -3.0]];
        let payload = build_payload(&time, &cols);
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 2,
            num_points: 3,
        };

        let (t, samples) = decode_payload(&mut Cursor::new(payload), &layout, 0.0).unwrap();
        assert_eq!(t, vec![0.0, 1.0, 2.0]);
        assert_eq!(samples[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(samples[1], vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn truncated_time_channel_is_a_short_read() {
        let time = [0.0f64, 1.0];
        let col = vec![vec![1.0f32, 2.0]];
        let payload = build_payload(&time, &col);
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 1,
            num_points: 5,
        };

        let err = decode_time(&mut Cursor::new(payload), &layout, 0.0).unwrap_err();
        assert!(matches!(
            err,
            RawError::ShortRead {
                channel: Channel::Time,
                expected: 5,
                got: 2,
            }
        ));
    }

    /// Read+Seek wrapper that reports end-of-input early for the first
    /// `short_attempts` reads of a column, where an attempt begins at each
    /// seek back to `attempt_start`.
    struct FlakyReader {
        inner: Cursor<Vec<u8>>,
        attempt_start: u64,
        short_attempts: usize,
        short_after_bytes: usize,
        attempt: usize,
        served: usize,
    }

    impl FlakyReader {
        fn new(data: Vec<u8>, attempt_start: u64, short_attempts: usize) -> Self {
            Self {
                inner: Cursor::new(data),
                attempt_start,
                short_attempts,
                short_after_bytes: 4, // one f32 per failing attempt
                attempt: 0,
                served: 0,
            }
        }
    }

    impl io::Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.attempt <= self.short_attempts && self.served >= self.short_after_bytes {
                return Ok(0);
            }
            let n = self.inner.read(buf)?;
            self.served += n;
            Ok(n)
        }
    }

    impl io::Seek for FlakyReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if pos == SeekFrom::Start(self.attempt_start) {
                self.attempt += 1;
                self.served = 0;
            }
            self.inner.seek(pos)
        }
    }

    #[test]
    fn variable_read_succeeds_on_fifth_attempt() {
        let time = [0.0f64, 1.0, 2.0, 3.0];
        let col = vec![vec![10.0f32, 20.0, 30.0, 40.0]];
        let payload = build_payload(&time, &col);
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 1,
            num_points: 4,
        };

        // Attempts 1-4 deliver a single value, attempt 5 runs clean.
        let mut reader = FlakyReader::new(payload, layout.variable_column_offset(1), 4);
        let values = decode_variable(&mut reader, &layout, 1).unwrap();
        assert_eq!(values, vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(reader.attempt, 5);
    }

    #[test]
    fn variable_read_fails_after_retry_budget() {
        let time = [0.0f64, 1.0, 2.0, 3.0];
        let col = vec![vec![10.0f32, 20.0, 30.0, 40.0]];
        let payload = build_payload(&time, &col);
        let layout = BinaryLayout {
            binary_start: 0,
            num_variables: 1,
            num_points: 4,
        };

        // Every attempt under-delivers.
        let mut reader = FlakyReader::new(payload, layout.variable_column_offset(1), usize::MAX);
        let err = decode_variable(&mut reader, &layout, 1).unwrap_err();
        assert!(matches!(
            err,
            RawError::ShortRead {
                channel: Channel::Variable(1),
                expected: 4,
                got: 1,
            }
        ));
        assert_eq!(reader.attempt, MAX_READ_ATTEMPTS);
    }
}
