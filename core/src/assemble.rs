//! orders correlated blocks by start time, enforces disjointness, and builds
//! a coherent sampling process exposing a per-source time series (spec §4.6).

use std::collections::HashMap;

use dp_wire::ScalarType;

use crate::{
    correlate::CorrelatedBlock,
    error::{Error, Result},
    frame::ColumnValues,
};

/// a correlated block extended so every process-level source is represented,
/// inserting explicit-null columns for sources this block never reported.
#[derive(Debug, Clone)]
pub struct SamplingBlock {
    pub start_nanos: i64,
    pub end_nanos: i64,
    pub sample_count: usize,
    columns: HashMap<String, ColumnValues>,
}

/// time-ordered sequence of sampling blocks with pairwise disjoint domains;
/// the assembled query result.
#[derive(Debug, Clone)]
pub struct SamplingProcess {
    blocks: Vec<SamplingBlock>,
    source_names: Vec<String>,
    source_types: HashMap<String, ScalarType>,
}

impl SamplingProcess {
    pub fn sample_count(&self) -> usize {
        self.blocks.iter().map(|b| b.sample_count).sum()
    }

    /// `[first block's start, last block's end)`, or `None` for an empty process.
    pub fn time_domain(&self) -> Option<(i64, i64)> {
        match (self.blocks.first(), self.blocks.last()) {
            (Some(first), Some(last)) => Some((first.start_nanos, last.end_nanos)),
            _ => None,
        }
    }

    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    pub fn source_type(&self, name: &str) -> Option<ScalarType> {
        self.source_types.get(name).copied()
    }

    pub fn blocks(&self) -> &[SamplingBlock] {
        &self.blocks
    }

    /// concatenation of `name`'s series across blocks, in block order. `None`
    /// if `name` is not one of this process's sources.
    pub fn time_series(&self, name: &str) -> Option<ColumnValues> {
        if !self.source_types.contains_key(name) {
            return None;
        }
        let mut iter = self.blocks.iter().map(|b| b.columns.get(name).expect("every block carries every source").clone());
        let first = iter.next()?;
        Some(iter.fold(first, ColumnValues::concat))
    }
}

/// builds a [`SamplingProcess`] from correlator output, already sorted
/// ascending by interval key.
pub struct Assembler;

impl Assembler {
    /// `requested_sources` is the full set of sources the caller expects the
    /// process to expose, independent of which blocks actually carried them.
    pub fn assemble(blocks: Vec<CorrelatedBlock>, requested_sources: &[String]) -> Result<SamplingProcess> {
        for (i, pair) in blocks.windows(2).enumerate() {
            if pair[0].end_nanos() > pair[1].start_nanos() {
                return Err(Error::DomainOverlap { first_block: i, second_block: i + 1 });
            }
        }

        let mut source_types: HashMap<String, ScalarType> = HashMap::new();
        for block in &blocks {
            for (name, values) in &block.columns {
                match source_types.get(name) {
                    None => {
                        source_types.insert(name.clone(), values.scalar_type());
                    }
                    Some(known) if *known != values.scalar_type() => {
                        return Err(Error::TypeConflict {
                            source_name: name.clone(),
                            first: scalar_type_name(*known),
                            second: scalar_type_name(values.scalar_type()),
                        });
                    }
                    Some(_) => {}
                }
            }
        }

        for name in requested_sources {
            if !source_types.contains_key(name) {
                return Err(Error::SourceMissing { source_name: name.clone() });
            }
        }

        let assembled_blocks = blocks
            .into_iter()
            .map(|block| {
                let sample_count = block.sample_count();
                let mut columns: HashMap<String, ColumnValues> = block.columns.into_iter().collect();
                for name in requested_sources {
                    columns.entry(name.clone()).or_insert_with(|| {
                        ColumnValues::nulls(*source_types.get(name).expect("checked above"), sample_count)
                    });
                }
                SamplingBlock {
                    start_nanos: block.interval.start_nanos().unwrap_or(i64::MIN),
                    end_nanos: block.end_nanos(),
                    sample_count,
                    columns,
                }
            })
            .collect();

        Ok(SamplingProcess { blocks: assembled_blocks, source_names: requested_sources.to_vec(), source_types })
    }
}

fn scalar_type_name(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::Int32 => "Int32",
        ScalarType::Int64 => "Int64",
        ScalarType::Float32 => "Float32",
        ScalarType::Float64 => "Float64",
        ScalarType::Bool => "Bool",
        ScalarType::Str => "Str",
        ScalarType::Bytes => "Bytes",
        ScalarType::Unsupported => "Unsupported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        correlate::Correlator,
        frame::{SamplingClock, TimestampSpec},
    };
    use dp_wire::{DataBucket, WireColumn, WireSamplingInterval};

    fn bucket(source: &str, start: i64, period: i64, count: u32, values: Vec<i64>) -> DataBucket {
        DataBucket {
            source_name: source.to_string(),
            sampling_interval: WireSamplingInterval::Clock { start_nanos: start, period_nanos: period, sample_count: count },
            data_column: WireColumn::Int64(values.into_iter().map(Some).collect()),
        }
    }

    /// S4 from spec §8.
    #[test]
    fn s4_overlap_detected() {
        let mut c = Correlator::new();
        c.ingest(bucket("A", 0, 1_000_000_000, 5, vec![1, 2, 3, 4, 5])).unwrap();
        c.ingest(bucket("A", 3_000_000_000, 1_000_000_000, 5, vec![6, 7, 8, 9, 10])).unwrap();
        let blocks = c.finish();
        let err = Assembler::assemble(blocks, &["A".to_string()]).unwrap_err();
        assert!(matches!(err, Error::DomainOverlap { first_block: 0, second_block: 1 }));
    }

    /// S5 from spec §8.
    #[test]
    fn s5_type_conflict() {
        let block_a = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(0, 1_000_000_000, 5)),
            columns: vec![("A".to_string(), ColumnValues::Int64(vec![Some(1); 5]))],
        };
        let block_b = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(5_000_000_000, 1_000_000_000, 5)),
            columns: vec![("A".to_string(), ColumnValues::Float64(vec![Some(1.0); 5]))],
        };
        let err = Assembler::assemble(vec![block_a, block_b], &["A".to_string()]).unwrap_err();
        assert!(matches!(err, Error::TypeConflict { .. }));
    }

    #[test]
    fn source_missing_from_every_block_errors() {
        let mut c = Correlator::new();
        c.ingest(bucket("A", 0, 1_000_000_000, 5, vec![1, 2, 3, 4, 5])).unwrap();
        let blocks = c.finish();
        let err = Assembler::assemble(blocks, &["A".to_string(), "B".to_string()]).unwrap_err();
        assert!(matches!(err, Error::SourceMissing { source_name } if source_name == "B"));
    }

    #[test]
    fn missing_source_in_one_block_is_filled_with_nulls() {
        let block_a = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(0, 1_000_000_000, 3)),
            columns: vec![
                ("A".to_string(), ColumnValues::Int64(vec![Some(1), Some(2), Some(3)])),
                ("B".to_string(), ColumnValues::Int64(vec![Some(4), Some(5), Some(6)])),
            ],
        };
        let block_b = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(3_000_000_000, 1_000_000_000, 2)),
            columns: vec![("A".to_string(), ColumnValues::Int64(vec![Some(7), Some(8)]))],
        };
        let process = Assembler::assemble(vec![block_a, block_b], &["A".to_string(), "B".to_string()]).unwrap();
        assert_eq!(process.sample_count(), 5);
        match process.time_series("B").unwrap() {
            ColumnValues::Int64(v) => assert_eq!(v, vec![Some(4), Some(5), Some(6), None, None]),
            _ => panic!("expected Int64"),
        }
    }

    /// S2 from spec §8: two horizontal sub-queries merge into one contiguous domain.
    #[test]
    fn s2_contiguous_domain_after_merge() {
        let block_a = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(1_000_000_000, 1_000_000_000, 5)),
            columns: vec![("A".to_string(), ColumnValues::Int64(vec![Some(1); 5]))],
        };
        let block_b = CorrelatedBlock {
            interval: TimestampSpec::Clock(SamplingClock::new(6_000_000_000, 1_000_000_000, 5)),
            columns: vec![("A".to_string(), ColumnValues::Int64(vec![Some(2); 5]))],
        };
        let process = Assembler::assemble(vec![block_a, block_b], &["A".to_string()]).unwrap();
        assert_eq!(process.time_domain(), Some((1_000_000_000, 11_000_000_000)));
    }
}
