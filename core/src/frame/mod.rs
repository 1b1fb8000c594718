//! the in-memory correlated table ([`IngestionFrame`]) and its timestamp spec.

mod value;

use std::collections::HashMap;

pub use value::ColumnValues;

use crate::error::{Error, Result};

/// `{start, period, count}` specifying a uniform grid of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingClock {
    pub start_instant_nanos: i64,
    pub period_nanos: i64,
    pub sample_count: u32,
}

impl SamplingClock {
    pub fn new(start_instant_nanos: i64, period_nanos: i64, sample_count: u32) -> Self {
        Self { start_instant_nanos, period_nanos, sample_count }
    }

    /// deterministic sequence of instants this clock generates.
    pub fn instants(&self) -> impl Iterator<Item = i64> + '_ {
        (0..self.sample_count as i64).map(move |i| self.start_instant_nanos + i * self.period_nanos)
    }

    /// exclusive end of the clock's half-open interval.
    pub fn end_nanos(&self) -> i64 {
        self.start_instant_nanos + self.period_nanos * self.sample_count as i64
    }

    /// derive the clock for the `i`th bin of `stride` rows each, per §4.1.
    pub fn bin(&self, bin_index: usize, stride: usize, rows_in_bin: usize) -> Self {
        Self {
            start_instant_nanos: self.start_instant_nanos + (bin_index * stride) as i64 * self.period_nanos,
            period_nanos: self.period_nanos,
            sample_count: rows_in_bin as u32,
        }
    }
}

/// either a uniform sampling clock or an explicit ordered vector of instants.
/// exactly one timestamp spec may be attached to a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampSpec {
    Clock(SamplingClock),
    Explicit(Vec<i64>),
}

impl TimestampSpec {
    pub fn count(&self) -> usize {
        match self {
            Self::Clock(c) => c.sample_count as usize,
            Self::Explicit(v) => v.len(),
        }
    }

    pub fn start_nanos(&self) -> Option<i64> {
        match self {
            Self::Clock(c) => Some(c.start_instant_nanos),
            Self::Explicit(v) => v.first().copied(),
        }
    }

    /// slice a contiguous row range, producing a fresh timestamp spec.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        match self {
            Self::Clock(c) => Self::Clock(SamplingClock {
                start_instant_nanos: c.start_instant_nanos + start as i64 * c.period_nanos,
                period_nanos: c.period_nanos,
                sample_count: (end - start) as u32,
            }),
            Self::Explicit(v) => Self::Explicit(v[start..end].to_vec()),
        }
    }
}

/// one named, typed column. length must equal the frame's timestamp count.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// a correlated, rectangular table of time-series samples with a shared
/// timestamp spec (spec §3). created by the caller, mutated only by the
/// caller until submitted to ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestionFrame {
    timestamps: Option<TimestampSpec>,
    columns: Vec<Column>,
    attributes: HashMap<String, String>,
}

impl IngestionFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// attach a uniform sampling clock. fails if a timestamp spec is already
    /// set, or if columns have already been added.
    pub fn set_clock(&mut self, clock: SamplingClock) -> Result<()> {
        self.set_timestamps(TimestampSpec::Clock(clock))
    }

    /// attach an explicit, already-ordered vector of instants.
    pub fn set_explicit_timestamps(&mut self, instants: Vec<i64>) -> Result<()> {
        self.set_timestamps(TimestampSpec::Explicit(instants))
    }

    fn set_timestamps(&mut self, spec: TimestampSpec) -> Result<()> {
        if self.timestamps.is_some() {
            return Err(Error::FrameInvalid("timestamp spec already set".into()));
        }
        if !self.columns.is_empty() {
            return Err(Error::FrameInvalid("timestamp spec must be set before columns are added".into()));
        }
        self.timestamps = Some(spec);
        Ok(())
    }

    pub fn add_column(&mut self, name: impl Into<String>, values: ColumnValues) -> Result<()> {
        let name = name.into();
        let Some(timestamps) = &self.timestamps else {
            return Err(Error::FrameInvalid("no timestamp spec set".into()));
        };
        if values.len() != timestamps.count() {
            return Err(Error::FrameInvalid(format!(
                "column `{name}` has {} values, expected {}",
                values.len(),
                timestamps.count()
            )));
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(Error::FrameInvalid(format!("duplicate column name `{name}`")));
        }
        self.columns.push(Column { name, values });
        Ok(())
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn timestamps(&self) -> Option<&TimestampSpec> {
        self.timestamps.as_ref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.timestamps.as_ref().map_or(0, TimestampSpec::count)
    }

    /// validate the frame's invariants: a timestamp spec is set, column names
    /// are unique, and every column's length equals the timestamp count.
    pub fn validate(&self) -> Result<()> {
        let Some(timestamps) = &self.timestamps else {
            return Err(Error::FrameInvalid("no timestamp spec set".into()));
        };
        let mut seen = std::collections::HashSet::new();
        for col in &self.columns {
            if !seen.insert(&col.name) {
                return Err(Error::FrameInvalid(format!("duplicate column name `{}`", col.name)));
            }
            if col.values.len() != timestamps.count() {
                return Err(Error::FrameInvalid(format!(
                    "column `{}` has {} values, expected {}",
                    col.name,
                    col.values.len(),
                    timestamps.count()
                )));
            }
        }
        Ok(())
    }

    /// monotonic in column/row additions: sum of the timestamp spec's own
    /// footprint plus every column's per-row byte accounting.
    pub fn serialized_size(&self) -> usize {
        let ts_bytes = match &self.timestamps {
            Some(TimestampSpec::Clock(_)) => 8 + 8 + 4,
            Some(TimestampSpec::Explicit(v)) => v.len() * 8,
            None => 0,
        };
        let columns_bytes: usize = self.columns.iter().map(|c| c.values.total_byte_size()).sum();
        ts_bytes + columns_bytes
    }

    /// build a derived frame over a contiguous row range `[start, end)`,
    /// sharing the same sampling clock shape (adjusted start/count) or a
    /// slice of the explicit timestamp vector, and cloned attributes.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        let timestamps = self
            .timestamps
            .as_ref()
            .ok_or_else(|| Error::FrameInvalid("no timestamp spec set".into()))?;
        Ok(Self {
            timestamps: Some(timestamps.slice(start, end)),
            columns: self
                .columns
                .iter()
                .map(|c| Column { name: c.name.clone(), values: c.values.slice(start, end) })
                .collect(),
            attributes: self.attributes.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_rows(n: usize) -> IngestionFrame {
        let mut frame = IngestionFrame::new();
        frame.set_clock(SamplingClock::new(0, 1_000_000, n as u32)).unwrap();
        frame
            .add_column("a", ColumnValues::Int64((0..n as i64).map(Some).collect()))
            .unwrap();
        frame
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let mut frame = frame_with_rows(3);
        let err = frame
            .add_column("a", ColumnValues::Int64(vec![Some(1), Some(2), Some(3)]))
            .unwrap_err();
        assert!(matches!(err, Error::FrameInvalid(_)));
    }

    #[test]
    fn rejects_mismatched_column_length() {
        let mut frame = IngestionFrame::new();
        frame.set_clock(SamplingClock::new(0, 1, 5)).unwrap();
        let err = frame.add_column("a", ColumnValues::Int64(vec![Some(1)])).unwrap_err();
        assert!(matches!(err, Error::FrameInvalid(_)));
    }

    #[test]
    fn serialized_size_is_monotonic_in_rows() {
        let small = frame_with_rows(10).serialized_size();
        let big = frame_with_rows(20).serialized_size();
        assert!(big > small);
    }

    #[test]
    fn slice_rows_preserves_clock_period_and_shifts_start() {
        let frame = frame_with_rows(10);
        let sliced = frame.slice_rows(2, 5).unwrap();
        match sliced.timestamps().unwrap() {
            TimestampSpec::Clock(c) => {
                assert_eq!(c.start_instant_nanos, 2_000_000);
                assert_eq!(c.sample_count, 3);
                assert_eq!(c.period_nanos, 1_000_000);
            }
            _ => panic!("expected clock"),
        }
        assert_eq!(sliced.row_count(), 3);
    }
}
