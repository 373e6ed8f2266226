/// Ordered, non-overlapping, non-touching `[start, end)` intervals in seconds.
///
/// Mutations preserve the invariant: appends merge with any range they touch
/// or overlap, removals split ranges as needed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BufferedRanges {
    ranges: Vec<(f64, f64)>,
}

impl BufferedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.ranges.iter().copied()
    }

    /// Total buffered duration in seconds.
    pub fn total(&self) -> f64 {
        self.ranges.iter().map(|(s, e)| e - s).sum()
    }

    /// Insert `[start, end)`, merging with touching or overlapping ranges.
    pub fn append(&mut self, start: f64, end: f64) {
        if end <= start {
            return;
        }
        let mut merged_start = start;
        let mut merged_end = end;
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;

        for &(s, e) in &self.ranges {
            if e < merged_start || s > merged_end {
                // Disjoint and not touching.
                if s > merged_end && !inserted {
                    out.push((merged_start, merged_end));
                    inserted = true;
                }
                out.push((s, e));
            } else {
                merged_start = merged_start.min(s);
                merged_end = merged_end.max(e);
            }
        }
        if !inserted {
            out.push((merged_start, merged_end));
        }
        self.ranges = out;
    }

    /// Remove everything intersecting `[start, end)`.
    pub fn remove(&mut self, start: f64, end: f64) {
        if end <= start {
            return;
        }
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &(s, e) in &self.ranges {
            if e <= start || s >= end {
                out.push((s, e));
                continue;
            }
            if s < start {
                out.push((s, start));
            }
            if e > end {
                out.push((end, e));
            }
        }
        self.ranges = out;
    }

    /// The range containing `position`, if any.
    pub fn containing(&self, position: f64) -> Option<(f64, f64)> {
        self.ranges
            .iter()
            .copied()
            .find(|&(s, e)| position >= s && position < e)
    }

    /// Distance from `position` to the end of its containing range, 0 when
    /// `position` is outside every range.
    pub fn gap(&self, position: f64) -> f64 {
        self.containing(position).map_or(0.0, |(_, e)| e - position)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn assert_invariant(r: &BufferedRanges) {
        let v: Vec<_> = r.iter().collect();
        for (s, e) in &v {
            assert!(s < e, "empty or inverted range ({s}, {e})");
        }
        for pair in v.windows(2) {
            assert!(
                pair[0].1 < pair[1].0,
                "ranges touch or overlap: {:?} then {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn append_disjoint_keeps_order() {
        let mut r = BufferedRanges::new();
        r.append(10.0, 20.0);
        r.append(0.0, 5.0);
        r.append(30.0, 40.0);
        assert_eq!(
            r.iter().collect::<Vec<_>>(),
            vec![(0.0, 5.0), (10.0, 20.0), (30.0, 40.0)]
        );
        assert_invariant(&r);
    }

    #[rstest]
    #[case(4.0, 11.0, vec![(0.0, 11.0)])] // overlap
    #[case(5.0, 10.0, vec![(0.0, 10.0)])] // touching merges
    #[case(6.0, 7.0, vec![(0.0, 5.0), (6.0, 7.0)])] // disjoint stays
    fn append_merging(#[case] start: f64, #[case] end: f64, #[case] expected: Vec<(f64, f64)>) {
        let mut r = BufferedRanges::new();
        r.append(0.0, 5.0);
        r.append(start, end);
        assert_eq!(r.iter().collect::<Vec<_>>(), expected);
        assert_invariant(&r);
    }

    #[test]
    fn append_bridging_three_ranges() {
        let mut r = BufferedRanges::new();
        r.append(0.0, 2.0);
        r.append(4.0, 6.0);
        r.append(8.0, 10.0);
        r.append(1.0, 9.0);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(0.0, 10.0)]);
        assert_invariant(&r);
    }

    #[test]
    fn remove_middle_splits() {
        let mut r = BufferedRanges::new();
        r.append(0.0, 10.0);
        r.remove(3.0, 7.0);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(0.0, 3.0), (7.0, 10.0)]);
        assert_invariant(&r);
    }

    #[test]
    fn remove_spanning_multiple() {
        let mut r = BufferedRanges::new();
        r.append(0.0, 5.0);
        r.append(10.0, 15.0);
        r.append(20.0, 25.0);
        r.remove(3.0, 22.0);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(0.0, 3.0), (22.0, 25.0)]);
        assert_invariant(&r);
    }

    #[test]
    fn degenerate_mutations_are_ignored() {
        let mut r = BufferedRanges::new();
        r.append(5.0, 5.0);
        r.append(7.0, 3.0);
        assert!(r.is_empty());
        r.append(0.0, 10.0);
        r.remove(4.0, 4.0);
        assert_eq!(r.iter().collect::<Vec<_>>(), vec![(0.0, 10.0)]);
    }

    #[rstest]
    #[case(2.0, 8.0)] // inside -> distance to range end
    #[case(9.9, 0.1)]
    #[case(10.0, 0.0)] // end is exclusive
    #[case(15.0, 0.0)] // outside
    fn gap_measurement(#[case] position: f64, #[case] expected: f64) {
        let mut r = BufferedRanges::new();
        r.append(0.0, 10.0);
        assert!((r.gap(position) - expected).abs() < 1e-9);
    }

    #[test]
    fn total_sums_all_ranges() {
        let mut r = BufferedRanges::new();
        r.append(0.0, 5.0);
        r.append(10.0, 12.0);
        assert!((r.total() - 7.0).abs() < 1e-9);
    }
}
