//! groups incoming query data buckets by a shared sampling-interval key into
//! sorted, correlated blocks (spec §4.5).

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
};

use dp_wire::{DataBucket, WireSamplingInterval};

use crate::{
    error::{Error, Result},
    frame::{ColumnValues, SamplingClock, TimestampSpec},
};

/// one bucket group sharing one sampling interval key. immutable once built
/// by [`Correlator::finish`].
#[derive(Debug, Clone)]
pub struct CorrelatedBlock {
    pub interval: TimestampSpec,
    /// source name -> its column, in first-seen order. names are unique
    /// within a block (enforced at ingest time).
    pub columns: Vec<(String, ColumnValues)>,
}

impl CorrelatedBlock {
    pub fn sample_count(&self) -> usize {
        self.interval.count()
    }

    pub fn start_nanos(&self) -> i64 {
        self.interval.start_nanos().unwrap_or(i64::MIN)
    }

    /// half-open end, matching `SamplingClock::end_nanos` for clocks and the
    /// last explicit instant for explicit vectors (see DESIGN.md).
    pub fn end_nanos(&self) -> i64 {
        match &self.interval {
            TimestampSpec::Clock(c) => c.end_nanos(),
            TimestampSpec::Explicit(v) => v.last().copied().unwrap_or(i64::MIN),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IntervalKey {
    Clock { start_nanos: i64, period_nanos: i64, sample_count: u32 },
    Explicit { hash: u64, first_instant: i64, length: usize },
}

impl IntervalKey {
    /// `(start, period, count)` ordering per spec §4.5/§8 invariant 4;
    /// explicit vectors sort by their first instant with period/length
    /// standing in for the tiebreaks.
    fn sort_tuple(&self) -> (i64, i64, u32) {
        match *self {
            Self::Clock { start_nanos, period_nanos, sample_count } => (start_nanos, period_nanos, sample_count),
            Self::Explicit { first_instant, length, .. } => (first_instant, 0, length as u32),
        }
    }
}

fn canonicalize(interval: WireSamplingInterval) -> (TimestampSpec, IntervalKey) {
    match interval {
        WireSamplingInterval::Clock { start_nanos, period_nanos, sample_count } => {
            let key = IntervalKey::Clock { start_nanos, period_nanos, sample_count };
            (TimestampSpec::Clock(SamplingClock::new(start_nanos, period_nanos, sample_count)), key)
        }
        WireSamplingInterval::Explicit(instants) => {
            let mut hasher = DefaultHasher::new();
            instants.hash(&mut hasher);
            let key = IntervalKey::Explicit {
                hash: hasher.finish(),
                first_instant: instants.first().copied().unwrap_or(0),
                length: instants.len(),
            };
            (TimestampSpec::Explicit(instants), key)
        }
    }
}

struct Group {
    interval: TimestampSpec,
    columns: HashMap<String, ColumnValues>,
    order: Vec<String>,
}

/// accumulates data buckets into correlated blocks, keyed by sampling
/// interval. emits blocks in ascending key order once the input completes.
#[derive(Default)]
pub struct Correlator {
    groups: HashMap<IntervalKey, Group>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// accumulate one data bucket. fails fast rather than assembling a
    /// partial, silently-inconsistent block.
    pub fn ingest(&mut self, bucket: DataBucket) -> Result<()> {
        if bucket.data_column.is_empty() {
            return Err(Error::MissingData { source_name: bucket.source_name });
        }
        if bucket.data_column.scalar_type() == dp_wire::ScalarType::Unsupported {
            return Err(Error::UnsupportedType { source_name: bucket.source_name });
        }

        let (interval, key) = canonicalize(bucket.sampling_interval);
        let expected = interval.count();
        if bucket.data_column.len() != expected {
            return Err(Error::InconsistentLength {
                source_name: bucket.source_name,
                expected,
                actual: bucket.data_column.len(),
            });
        }

        let values = ColumnValues::try_from(bucket.data_column)
            .map_err(|()| Error::UnsupportedType { source_name: bucket.source_name.clone() })?;

        let group = self.groups.entry(key).or_insert_with(|| Group { interval, columns: HashMap::new(), order: Vec::new() });
        if group.columns.contains_key(&bucket.source_name) {
            return Err(Error::DuplicateSource { source_name: bucket.source_name });
        }
        group.order.push(bucket.source_name.clone());
        group.columns.insert(bucket.source_name, values);
        Ok(())
    }

    /// drain the accumulated groups into blocks sorted by `(start, period,
    /// count)` (spec §8 invariant 4).
    pub fn finish(self) -> Vec<CorrelatedBlock> {
        let mut keys: Vec<IntervalKey> = self.groups.keys().cloned().collect();
        keys.sort_by_key(IntervalKey::sort_tuple);

        let mut groups = self.groups;
        keys.into_iter()
            .map(|key| {
                let group = groups.remove(&key).expect("key came from this map");
                let columns = group
                    .order
                    .into_iter()
                    .map(|name| {
                        let values = group.columns.get(&name).cloned();
                        (name, values)
                    })
                    .filter_map(|(name, values)| values.map(|v| (name, v)))
                    .collect();
                CorrelatedBlock { interval: group.interval, columns }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dp_wire::WireColumn;

    fn bucket(source: &str, start: i64, period: i64, count: u32, values: Vec<i64>) -> DataBucket {
        DataBucket {
            source_name: source.to_string(),
            sampling_interval: WireSamplingInterval::Clock { start_nanos: start, period_nanos: period, sample_count: count },
            data_column: WireColumn::Int64(values.into_iter().map(Some).collect()),
        }
    }

    #[test]
    fn groups_by_interval_and_sorts_ascending() {
        let mut c = Correlator::new();
        c.ingest(bucket("A", 1_000_000_000, 1_000_000, 5, vec![1, 2, 3, 4, 5])).unwrap();
        c.ingest(bucket("A", 0, 1_000_000, 5, vec![0, 1, 2, 3, 4])).unwrap();
        let blocks = c.finish();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].start_nanos() < blocks[1].start_nanos());
    }

    #[test]
    fn duplicate_source_in_one_interval_fails() {
        let mut c = Correlator::new();
        c.ingest(bucket("A", 0, 1, 3, vec![1, 2, 3])).unwrap();
        let err = c.ingest(bucket("A", 0, 1, 3, vec![4, 5, 6])).unwrap_err();
        assert!(matches!(err, Error::DuplicateSource { .. }));
    }

    #[test]
    fn empty_column_is_missing_data() {
        let mut c = Correlator::new();
        let b = DataBucket {
            source_name: "A".into(),
            sampling_interval: WireSamplingInterval::Clock { start_nanos: 0, period_nanos: 1, sample_count: 0 },
            data_column: WireColumn::Int64(vec![]),
        };
        assert!(matches!(c.ingest(b), Err(Error::MissingData { .. })));
    }

    #[test]
    fn length_mismatch_is_inconsistent_length() {
        let mut c = Correlator::new();
        let b = DataBucket {
            source_name: "A".into(),
            sampling_interval: WireSamplingInterval::Clock { start_nanos: 0, period_nanos: 1, sample_count: 5 },
            data_column: WireColumn::Int64(vec![Some(1), Some(2)]),
        };
        assert!(matches!(c.ingest(b), Err(Error::InconsistentLength { .. })));
    }

    #[test]
    fn unsupported_type_fails_immediately() {
        let mut c = Correlator::new();
        let b = DataBucket {
            source_name: "A".into(),
            sampling_interval: WireSamplingInterval::Clock { start_nanos: 0, period_nanos: 1, sample_count: 2 },
            data_column: WireColumn::Unsupported,
        };
        assert!(matches!(c.ingest(b), Err(Error::UnsupportedType { .. })));
    }
}
