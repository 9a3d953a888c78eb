//! Assembling final results, including runs split across several processes.

use gridsec_contingency::Contingency;
use gridsec_core::{GridSecError, GridSecResult};
use std::fmt;
use std::str::FromStr;

use crate::result::{
    NetworkMetadata, PostContingencyResult, PreContingencyResult, SecurityAnalysisResult,
};

/// Combine a base-case result with the post-contingency results, keeping
/// their order. A failed base case yields [`SecurityAnalysisResult::failed`].
pub fn merge(
    pre: PreContingencyResult,
    posts: Vec<PostContingencyResult>,
) -> SecurityAnalysisResult {
    if !pre.limit_violations_result.computation_ok {
        return SecurityAnalysisResult::failed();
    }
    SecurityAnalysisResult {
        network_metadata: None,
        pre_contingency_result: pre,
        post_contingency_results: posts,
    }
}

/// Merge the results of the partitions of one run, given in partition order.
///
/// All parts computed the same base case, so the first part's one is kept.
/// If any part failed its base case, the whole run failed.
pub fn merge_partial_results(
    parts: Vec<SecurityAnalysisResult>,
) -> GridSecResult<SecurityAnalysisResult> {
    let mut parts = parts.into_iter();
    let first = parts
        .next()
        .ok_or_else(|| GridSecError::Validation("no partial results to merge".into()))?;
    let metadata = first.network_metadata.clone();
    if first.is_failed() {
        return Ok(failed_with(metadata));
    }

    let mut merged = first;
    for part in parts {
        if part.is_failed() {
            return Ok(failed_with(metadata));
        }
        merged
            .post_contingency_results
            .extend(part.post_contingency_results);
    }
    Ok(merged)
}

fn failed_with(metadata: Option<NetworkMetadata>) -> SecurityAnalysisResult {
    SecurityAnalysisResult {
        network_metadata: metadata,
        ..SecurityAnalysisResult::failed()
    }
}

/// Task `index` (1-based) out of `count` equal slices of a contingency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    count: usize,
}

impl Partition {
    pub fn new(index: usize, count: usize) -> GridSecResult<Self> {
        if count == 0 || index == 0 || index > count {
            return Err(GridSecError::Config(format!(
                "invalid partition {index}/{count}: expected 1 <= i <= n"
            )));
        }
        Ok(Self { index, count })
    }

    /// Parse `"i/n"`.
    pub fn parse(input: &str) -> GridSecResult<Self> {
        let parse_part = |part: &str| {
            part.trim().parse::<usize>().map_err(|_| {
                GridSecError::Parse(format!("invalid partition '{input}', expected i/n"))
            })
        };
        let (index, count) = input
            .split_once('/')
            .ok_or_else(|| GridSecError::Parse(format!("invalid partition '{input}', expected i/n")))?;
        Self::new(parse_part(index)?, parse_part(count)?)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// The contiguous slice of `contingencies` this partition is responsible
    /// for. Slice sizes differ by at most one.
    pub fn select<'c>(&self, contingencies: &'c [Contingency]) -> &'c [Contingency] {
        let total = contingencies.len();
        let start = (self.index - 1) * total / self.count;
        let end = self.index * total / self.count;
        &contingencies[start..end]
    }
}

impl FromStr for Partition {
    type Err = GridSecError;

    fn from_str(input: &str) -> GridSecResult<Self> {
        Partition::parse(input)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}
