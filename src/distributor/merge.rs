//! Legacy-shape merge: one deduplicated sample stream per series.

use crate::hash::Fingerprint;
use crate::model::{Matrix, Sample, SampleStream};
use crate::{Error, Result};
use std::collections::HashMap;

/// Union of two timestamp-ordered sample runs.
///
/// Samples sharing a timestamp collapse into one, keeping the one from `a`.
/// Replicas got both copies from the same write, so either is correct.
pub fn merge_sample_sets(a: &[Sample], b: &[Sample]) -> Vec<Sample> {
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);

    while i < a.len() && j < b.len() {
        let (sa, sb) = (a[i], b[j]);
        if sa.timestamp_ms < sb.timestamp_ms {
            result.push(sa);
            i += 1;
        } else if sa.timestamp_ms > sb.timestamp_ms {
            result.push(sb);
            j += 1;
        } else {
            result.push(sa);
            i += 1;
            j += 1;
        }
    }

    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Sort by timestamp and drop repeated timestamps, unless already strictly
/// increasing.
fn normalize(mut samples: Vec<Sample>) -> Vec<Sample> {
    let ordered = samples
        .windows(2)
        .all(|w| w[0].timestamp_ms < w[1].timestamp_ms);
    if !ordered {
        samples.sort_by_key(|s| s.timestamp_ms);
        samples.dedup_by_key(|s| s.timestamp_ms);
    }
    samples
}

/// Accumulates replica matrices keyed by [`crate::model::Labels::fingerprint`].
#[derive(Debug, Default)]
pub struct SampleMerger {
    streams: Vec<SampleStream>,
    by_fingerprint: HashMap<Fingerprint, usize>,
}

impl SampleMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one replica's result in.
    pub fn add(&mut self, matrix: Matrix) -> Result<()> {
        for stream in matrix {
            let fp = stream.labels.fingerprint();
            let samples = normalize(stream.samples);

            match self.by_fingerprint.get(&fp) {
                Some(&idx) => {
                    let existing = &mut self.streams[idx];
                    if existing.labels != stream.labels {
                        return Err(Error::MergeFailure(format!(
                            "fingerprint {} shared by {} and {}",
                            fp, existing.labels, stream.labels
                        )));
                    }
                    existing.samples = merge_sample_sets(&existing.samples, &samples);
                }
                None => {
                    self.by_fingerprint.insert(fp, self.streams.len());
                    self.streams.push(SampleStream {
                        labels: stream.labels,
                        samples,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// One stream per distinct label set, in first-seen order.
    pub fn finish(self) -> Matrix {
        self.streams
    }
}

/// Merge every replica's matrix.
pub fn merge_matrices(results: Vec<Matrix>) -> Result<Matrix> {
    let mut merger = SampleMerger::new();
    for matrix in results {
        merger.add(matrix)?;
    }
    Ok(merger.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Labels, METRIC_NAME};

    fn samples(pairs: &[(i64, f64)]) -> Vec<Sample> {
        pairs.iter().copied().map(Sample::from).collect()
    }

    fn stream(name: &str, pairs: &[(i64, f64)]) -> SampleStream {
        SampleStream {
            labels: Labels::from_pairs(&[(METRIC_NAME, name)]),
            samples: samples(pairs),
        }
    }

    #[test]
    fn test_merge_sample_sets_disjoint() {
        let merged = merge_sample_sets(&samples(&[(1, 1.0), (3, 3.0)]), &samples(&[(2, 2.0), (4, 4.0)]));
        assert_eq!(merged, samples(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]));
    }

    #[test]
    fn test_merge_sample_sets_collapses_shared_timestamps() {
        let merged = merge_sample_sets(&samples(&[(1, 1.0), (2, 2.0)]), &samples(&[(2, 2.0), (3, 3.0)]));
        assert_eq!(merged, samples(&[(1, 1.0), (2, 2.0), (3, 3.0)]));
    }

    #[test]
    fn test_merge_sample_sets_empty_sides() {
        assert_eq!(merge_sample_sets(&[], &samples(&[(1, 1.0)])), samples(&[(1, 1.0)]));
        assert_eq!(merge_sample_sets(&samples(&[(1, 1.0)]), &[]), samples(&[(1, 1.0)]));
        assert!(merge_sample_sets(&[], &[]).is_empty());
    }

    #[test]
    fn test_identical_replicas_yield_union_not_sum() {
        let replica = vec![stream("m", &[(10, 1.0), (20, 2.0), (30, 3.0)])];
        let merged = merge_matrices(vec![replica.clone(), replica.clone(), replica]).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].samples.len(), 3);
    }

    #[test]
    fn test_one_stream_per_series() {
        let merged = merge_matrices(vec![
            vec![stream("a", &[(1, 1.0)]), stream("b", &[(1, 1.0)])],
            vec![stream("b", &[(2, 2.0)]), stream("c", &[(1, 1.0)])],
        ])
        .unwrap();

        let names: Vec<&str> = merged.iter().filter_map(|s| s.labels.metric_name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(merged[1].samples, samples(&[(1, 1.0), (2, 2.0)]));
    }

    #[test]
    fn test_unordered_replica_input_is_normalized() {
        let merged = merge_matrices(vec![
            vec![stream("m", &[(30, 3.0), (10, 1.0), (10, 1.0)])],
            vec![stream("m", &[(20, 2.0)])],
        ])
        .unwrap();
        assert_eq!(merged[0].samples, samples(&[(10, 1.0), (20, 2.0), (30, 3.0)]));
    }

    #[test]
    fn test_empty_results() {
        assert!(merge_matrices(vec![]).unwrap().is_empty());
        assert!(merge_matrices(vec![vec![], vec![]]).unwrap().is_empty());
    }
}
