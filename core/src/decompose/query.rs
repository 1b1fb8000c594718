//! splits a query request along time (horizontal), sources (vertical), or
//! both (grid), deterministically (spec §4.2).

use crate::error::{Error, Result};

/// half-open `[start, end)` nanosecond interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start_nanos: i64,
    pub end_nanos: i64,
}

impl TimeInterval {
    pub fn new(start_nanos: i64, end_nanos: i64) -> Result<Self> {
        if end_nanos <= start_nanos {
            return Err(Error::ConfigInvalid("time interval must have positive duration".into()));
        }
        Ok(Self { start_nanos, end_nanos })
    }

    pub fn duration_nanos(&self) -> i64 {
        self.end_nanos - self.start_nanos
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub source_names: Vec<String>,
    pub time_interval: TimeInterval,
}

/// decomposition policy, mirroring `query.recovery.stream.decomposition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    None,
    Horizontal(u32),
    Vertical(u32),
    Grid(u32, u32),
}

/// split `n` contiguous half-open sub-intervals of `interval`, equal
/// nanosecond duration, last absorbing the remainder.
fn split_horizontal(interval: TimeInterval, n: u32) -> Vec<TimeInterval> {
    let n = n as i64;
    let span = interval.duration_nanos();
    let chunk = span / n;
    (0..n)
        .map(|i| {
            let start = interval.start_nanos + i * chunk;
            let end = if i == n - 1 { interval.end_nanos } else { start + chunk };
            TimeInterval { start_nanos: start, end_nanos: end }
        })
        .collect()
}

/// split `sources` into `n` groups of near-equal size (sizes differ by at
/// most one), preserving input order within and across groups.
fn split_vertical(sources: &[String], n: u32) -> Vec<Vec<String>> {
    let n = n as usize;
    let base = sources.len() / n;
    let remainder = sources.len() % n;
    let mut groups = Vec::with_capacity(n);
    let mut idx = 0;
    for g in 0..n {
        let size = base + usize::from(g < remainder);
        groups.push(sources[idx..idx + size].to_vec());
        idx += size;
    }
    groups
}

/// apply `strategy` to `request`, producing independently valid sub-requests.
/// deterministic: same input and strategy always produce the same output
/// list, in the same order.
pub fn decompose(request: &QueryRequest, strategy: Strategy) -> Result<Vec<QueryRequest>> {
    if request.source_names.is_empty() {
        return Err(Error::ConfigInvalid("query request has no sources".into()));
    }
    match strategy {
        Strategy::None => Ok(vec![request.clone()]),
        Strategy::Horizontal(n) => {
            if n == 0 {
                return Err(Error::ConfigInvalid("horizontal decomposition needs n > 0".into()));
            }
            Ok(split_horizontal(request.time_interval, n)
                .into_iter()
                .map(|time_interval| QueryRequest { source_names: request.source_names.clone(), time_interval })
                .collect())
        }
        Strategy::Vertical(n) => {
            if n == 0 || n as usize > request.source_names.len() {
                return Err(Error::ConfigInvalid("vertical decomposition needs 0 < n <= source count".into()));
            }
            Ok(split_vertical(&request.source_names, n)
                .into_iter()
                .map(|source_names| QueryRequest { source_names, time_interval: request.time_interval })
                .collect())
        }
        Strategy::Grid(h, v) => {
            if h == 0 {
                return Err(Error::ConfigInvalid("grid decomposition needs h > 0".into()));
            }
            if v == 0 || v as usize > request.source_names.len() {
                return Err(Error::ConfigInvalid("grid decomposition needs 0 < v <= source count".into()));
            }
            let time_intervals = split_horizontal(request.time_interval, h);
            let source_groups = split_vertical(&request.source_names, v);
            // row-major: every source group for a given time interval before
            // moving to the next interval (spec §9 open question 3).
            let mut out = Vec::with_capacity(time_intervals.len() * source_groups.len());
            for time_interval in time_intervals {
                for source_names in &source_groups {
                    out.push(QueryRequest { source_names: source_names.clone(), time_interval });
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(sources: &[&str], start: i64, end: i64) -> QueryRequest {
        QueryRequest {
            source_names: sources.iter().map(|s| s.to_string()).collect(),
            time_interval: TimeInterval::new(start, end).unwrap(),
        }
    }

    /// S2 from spec §8.
    #[test]
    fn s2_horizontal_decompose() {
        let r = req(&["A", "B"], 1_000_000_000, 11_000_000_000);
        let parts = decompose(&r, Strategy::Horizontal(2)).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].time_interval, TimeInterval::new(1_000_000_000, 6_000_000_000).unwrap());
        assert_eq!(parts[1].time_interval, TimeInterval::new(6_000_000_000, 11_000_000_000).unwrap());
        for p in &parts {
            assert_eq!(p.source_names, vec!["A".to_string(), "B".to_string()]);
        }
    }

    #[test]
    fn vertical_splits_near_equal_preserving_order() {
        let r = req(&["A", "B", "C", "D", "E"], 0, 10);
        let parts = decompose(&r, Strategy::Vertical(3)).unwrap();
        let sizes: Vec<usize> = parts.iter().map(|p| p.source_names.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(parts[0].source_names, vec!["A", "B"]);
        assert_eq!(parts[1].source_names, vec!["C", "D"]);
        assert_eq!(parts[2].source_names, vec!["E"]);
    }

    #[test]
    fn grid_is_cartesian_product_row_major() {
        let r = req(&["A", "B"], 0, 100);
        let parts = decompose(&r, Strategy::Grid(2, 2)).unwrap();
        assert_eq!(parts.len(), 4);
        // first time interval entirely before moving to the second.
        assert_eq!(parts[0].time_interval, parts[1].time_interval);
        assert_eq!(parts[2].time_interval, parts[3].time_interval);
        assert_ne!(parts[0].time_interval, parts[2].time_interval);
    }

    #[test]
    fn decomposition_is_deterministic() {
        let r = req(&["A", "B", "C"], 0, 999);
        let a = decompose(&r, Strategy::Grid(3, 2)).unwrap();
        let b = decompose(&r, Strategy::Grid(3, 2)).unwrap();
        assert_eq!(
            a.iter().map(|p| (p.source_names.clone(), p.time_interval)).collect::<Vec<_>>(),
            b.iter().map(|p| (p.source_names.clone(), p.time_interval)).collect::<Vec<_>>()
        );
    }

    #[test]
    fn none_is_pass_through() {
        let r = req(&["A"], 0, 10);
        let parts = decompose(&r, Strategy::None).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].source_names, r.source_names);
    }
}
