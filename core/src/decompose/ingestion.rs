//! size-bounded decomposition ("binning") of one [`IngestionFrame`] into a
//! lazy sequence of frames whose union is row-equivalent to the input, each
//! within a serialized byte budget (spec §4.1).

use crate::{
    error::{Error, Result},
    frame::IngestionFrame,
};

/// lazily emits row-contiguous bins of `frame`, each with serialized size
/// `<= budget`. `budget <= 0` is a configuration error reported eagerly.
pub struct FrameBinner<'f> {
    frame: &'f IngestionFrame,
    budget: usize,
    stride: usize,
    next_row: usize,
    bin_index: usize,
}

impl<'f> FrameBinner<'f> {
    pub fn new(frame: &'f IngestionFrame, budget_bytes: i64) -> Result<Self> {
        if budget_bytes <= 0 {
            return Err(Error::ConfigInvalid("binning budget must be positive".into()));
        }
        frame.validate()?;

        let budget = budget_bytes as usize;
        let row_count = frame.row_count();
        if row_count == 0 {
            return Ok(Self { frame, budget, stride: 0, next_row: 0, bin_index: 0 });
        }

        // average over column payload bytes only: the timestamp spec's own
        // fixed footprint (`frame.serialized_size`'s clock/explicit header)
        // is one-time, not per-row, and including it here under-counts the
        // budget's real row capacity.
        let columns_bytes: usize = frame.columns().iter().map(|c| c.values.total_byte_size()).sum();
        let avg_row_bytes = (columns_bytes / row_count).max(1);
        let mut stride = (budget / avg_row_bytes).max(1);

        // the average is only an estimate: widest rows (variable-size str/
        // bytes columns) can make it optimistic, narrowest rows pessimistic.
        // settle on the true largest stride that still fits the budget,
        // failing fast with `FrameTooLarge` if even one row alone exceeds it.
        stride = Self::largest_safe_stride(frame, stride, budget)?;

        Ok(Self { frame, budget, stride, next_row: 0, bin_index: 0 })
    }

    /// the largest `k` such that every row's own serialized size is
    /// individually `<= budget` (a precondition for any stride to work) and
    /// the estimated size of a `k`-row window starting at row 0 is `<=
    /// budget`. shrinks or grows `candidate` until that holds, so the result
    /// maximizes budget usage rather than just being a safe under-estimate.
    fn largest_safe_stride(frame: &IngestionFrame, mut candidate: usize, budget: usize) -> Result<usize> {
        let row_count = frame.row_count();
        for row in 0..row_count {
            let row_bytes: usize = frame.columns().iter().map(|c| c.values.row_byte_size(row)).sum();
            if row_bytes > budget {
                return Err(Error::FrameTooLarge { row_index: row, row_bytes, budget });
            }
        }

        let window_bytes = |k: usize| -> usize {
            let end = k.min(row_count);
            frame.columns().iter().map(|c| (0..end).map(|r| c.values.row_byte_size(r)).sum::<usize>()).sum()
        };

        while candidate > 1 && window_bytes(candidate) > budget {
            candidate -= 1;
        }
        while candidate < row_count && window_bytes(candidate + 1) <= budget {
            candidate += 1;
        }
        Ok(candidate.max(1))
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Iterator for FrameBinner<'_> {
    type Item = Result<IngestionFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        let row_count = self.frame.row_count();
        if self.next_row >= row_count {
            return None;
        }
        let end = (self.next_row + self.stride.max(1)).min(row_count);
        let result = self.frame.slice_rows(self.next_row, end);
        self.next_row = end;
        self.bin_index += 1;
        Some(result)
    }
}

/// eagerly collect every bin, for callers that don't need streaming
/// semantics. row counts of the result sum to `frame.row_count()`.
pub fn bin_frame(frame: &IngestionFrame, budget_bytes: i64) -> Result<Vec<IngestionFrame>> {
    FrameBinner::new(frame, budget_bytes)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{ColumnValues, SamplingClock};

    fn frame(rows: usize, bytes_per_row: usize) -> IngestionFrame {
        let mut f = IngestionFrame::new();
        f.set_clock(SamplingClock::new(0, 1_000_000, rows as u32)).unwrap();
        match bytes_per_row {
            8 => f
                .add_column("a", ColumnValues::Int64((0..rows as i64).map(Some).collect()))
                .unwrap(),
            4 => f
                .add_column("a", ColumnValues::Int32((0..rows as i32).map(Some).collect()))
                .unwrap(),
            _ => unreachable!(),
        }
        f
    }

    /// S1 from spec §8: 1000 rows, 8 bytes/row, budget 2048 -> 4 bins of
    /// [256, 256, 256, 232].
    #[test]
    fn s1_bin_and_send() {
        let f = frame(1000, 8);
        let bins = bin_frame(&f, 2048).unwrap();
        let counts: Vec<usize> = bins.iter().map(IngestionFrame::row_count).collect();
        assert_eq!(counts, vec![256, 256, 256, 232]);
        assert_eq!(counts.iter().sum::<usize>(), 1000);
        for bin in &bins {
            assert!(bin.serialized_size() <= 2048);
        }
    }

    #[test]
    fn union_of_bins_is_row_equivalent_no_dup_no_drop() {
        let f = frame(777, 4);
        let bins = bin_frame(&f, 333).unwrap();
        let total: usize = bins.iter().map(IngestionFrame::row_count).sum();
        assert_eq!(total, 777);
    }

    #[test]
    fn zero_or_negative_budget_is_config_error() {
        let f = frame(10, 8);
        assert!(matches!(bin_frame(&f, 0), Err(Error::ConfigInvalid(_))));
        assert!(matches!(bin_frame(&f, -1), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn single_row_exceeding_budget_fails_not_truncated() {
        let mut f = IngestionFrame::new();
        f.set_clock(SamplingClock::new(0, 1, 3)).unwrap();
        f.add_column(
            "s",
            ColumnValues::Str(vec![Some("x".repeat(100)), Some("y".to_string()), Some("z".to_string())]),
        )
        .unwrap();
        let err = bin_frame(&f, 50).unwrap_err();
        assert!(matches!(err, Error::FrameTooLarge { row_index: 0, .. }));
    }
}
