//! Agreement thresholds scaled to participation.
//!
//! `consensus_for` takes an absolute `k`. `Resolution::Majority` derives `k`
//! from the number of analyzers that spoke at the position:
//! - 0 participants → 0 required
//! - n participants → floor(n / 2) + 1 required (strict majority)

/// Smallest strict majority of `participants`.
///
/// # Examples
///
/// ```
/// use concord_consensus::majority_threshold;
///
/// assert_eq!(majority_threshold(0), 0);
/// assert_eq!(majority_threshold(1), 1);
/// assert_eq!(majority_threshold(4), 3);
/// ```
pub const fn majority_threshold(participants: usize) -> usize {
    if participants == 0 {
        return 0;
    }
    participants / 2 + 1
}
