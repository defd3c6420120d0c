//! Lossless profile search
//!
//! Runs an ordered ladder of recompression profiles, lightest first, through a
//! [`Recompressor`] and stops at the first attempt that fits the target.

pub mod profile;
pub mod recompress;

pub use profile::{CompressionProfile, Directive, BASE_DIRECTIVES, PROFILES};
pub use recompress::LopdfRecompressor;

use std::time::Instant;

use crate::config::defaults::{LARGE_INPUT_PROFILE_LIMIT, LARGE_INPUT_THRESHOLD_BYTES};
use crate::error::RecompressError;

/// Structural recompressor: rewrites a PDF according to a list of directives.
///
/// Implementations must be deterministic for identical input and directives.
pub trait Recompressor {
    fn run(&self, input: &[u8], directives: &[Directive]) -> Result<Vec<u8>, RecompressError>;
}

/// Ladder selection for large inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPolicy {
    pub large_input_threshold: usize,
    pub large_input_profile_limit: usize,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            large_input_threshold: LARGE_INPUT_THRESHOLD_BYTES,
            large_input_profile_limit: LARGE_INPUT_PROFILE_LIMIT,
        }
    }
}

impl SearchPolicy {
    /// Profiles to run for an input of `input_len` bytes
    pub fn ladder(&self, input_len: usize, target_bytes: u64) -> &'static [CompressionProfile] {
        if target_bytes > 0 && input_len >= self.large_input_threshold {
            &PROFILES[..self.large_input_profile_limit.min(PROFILES.len())]
        } else {
            PROFILES
        }
    }
}

/// Output of one profile trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptResult {
    pub bytes: Vec<u8>,
}

impl AttemptResult {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// A lossless attempt tagged with the profile that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LosslessAttempt {
    pub profile: &'static str,
    pub result: AttemptResult,
}

impl LosslessAttempt {
    pub fn size_bytes(&self) -> u64 {
        self.result.size_bytes()
    }
}

/// Result of a lossless search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    /// First attempt that fit a non-zero target
    pub matched: Option<LosslessAttempt>,
    /// Smallest attempt among those that ran
    pub smallest: LosslessAttempt,
    /// Number of profiles that ran
    pub attempts: usize,
}

/// Run one profile, never returning more bytes than the input
pub fn run_attempt(
    recompressor: &dyn Recompressor,
    input: &[u8],
    profile: &CompressionProfile,
) -> Result<AttemptResult, RecompressError> {
    let directives = profile.full_directives();
    log::debug!(
        "Profile '{}' directives: {}",
        profile.name,
        directives
            .iter()
            .map(Directive::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );
    let output = recompressor.run(input, &directives)?;

    if output.len() <= input.len() {
        Ok(AttemptResult::new(output))
    } else {
        log::debug!(
            "Profile '{}' grew the file ({} > {} bytes), keeping the input",
            profile.name,
            output.len(),
            input.len()
        );
        Ok(AttemptResult::new(input.to_vec()))
    }
}

/// Search the profile ladder for a result of at most `target_bytes`.
///
/// A target of 0 runs every profile and reports the smallest attempt. With a
/// non-zero target the first fitting attempt wins, even if a stronger
/// profile might have produced something smaller.
pub fn search(
    recompressor: &dyn Recompressor,
    input: &[u8],
    target_bytes: u64,
    policy: &SearchPolicy,
) -> Result<SearchSummary, RecompressError> {
    let ladder = policy.ladder(input.len(), target_bytes);

    if ladder.len() < PROFILES.len() {
        log::info!(
            "Large input ({} bytes), limiting lossless search to {} profiles",
            input.len(),
            ladder.len()
        );
    }

    let mut smallest: Option<LosslessAttempt> = None;
    let mut attempts = 0;

    for profile in ladder {
        let started = Instant::now();
        let result = run_attempt(recompressor, input, profile)?;
        attempts += 1;

        log::info!(
            "Lossless profile '{}': {} -> {} bytes ({:.2?})",
            profile.name,
            input.len(),
            result.size_bytes(),
            started.elapsed()
        );

        let attempt = LosslessAttempt {
            profile: profile.name,
            result,
        };

        if target_bytes > 0 && attempt.size_bytes() <= target_bytes {
            return Ok(SearchSummary {
                matched: Some(attempt.clone()),
                smallest: attempt,
                attempts,
            });
        }

        let is_smaller = smallest
            .as_ref()
            .map_or(true, |best| attempt.size_bytes() < best.size_bytes());
        if is_smaller {
            smallest = Some(attempt);
        }
    }

    let smallest = smallest.unwrap_or_else(|| LosslessAttempt {
        profile: "none",
        result: AttemptResult::new(input.to_vec()),
    });

    Ok(SearchSummary {
        matched: None,
        smallest,
        attempts,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Recompressor returning a fixed size per compression level
    pub(crate) struct SizedRecompressor {
        sizes: Vec<(u8, usize)>,
        pub calls: RefCell<Vec<Vec<Directive>>>,
    }

    impl SizedRecompressor {
        /// `sizes[i]` is the output size of profile `i`
        pub(crate) fn new(sizes: &[usize]) -> Self {
            let sizes = PROFILES
                .iter()
                .zip(sizes)
                .map(|(profile, size)| (profile_key(&profile.full_directives()), *size))
                .collect();
            Self {
                sizes,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    /// Profiles differ by level plus directive count
    fn profile_key(directives: &[Directive]) -> u8 {
        let level = directives
            .iter()
            .find_map(|d| match d {
                Directive::CompressionLevel(level) => Some(*level),
                _ => None,
            })
            .unwrap_or(0);
        level * 10 + directives.len() as u8
    }

    impl Recompressor for SizedRecompressor {
        fn run(&self, _input: &[u8], directives: &[Directive]) -> Result<Vec<u8>, RecompressError> {
            self.calls.borrow_mut().push(directives.to_vec());
            let key = profile_key(directives);
            let size = self
                .sizes
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, size)| *size)
                .ok_or_else(|| RecompressError::Rewrite("unknown profile".to_string()))?;
            Ok(vec![b'x'; size])
        }
    }

    struct FailingRecompressor;

    impl Recompressor for FailingRecompressor {
        fn run(&self, _input: &[u8], _directives: &[Directive]) -> Result<Vec<u8>, RecompressError> {
            Err(RecompressError::Load("exit code 2".to_string()))
        }
    }

    #[test]
    fn test_no_target_runs_every_profile() {
        let input = vec![0u8; 10_000];
        let recompressor = SizedRecompressor::new(&[9_000, 7_000, 7_500, 6_000]);

        let summary = search(&recompressor, &input, 0, &SearchPolicy::default()).unwrap();

        assert!(summary.matched.is_none());
        assert_eq!(summary.attempts, 4);
        assert_eq!(summary.smallest.size_bytes(), 6_000);
        assert_eq!(summary.smallest.profile, "maximum");
    }

    #[test]
    fn test_first_match_wins() {
        let input = vec![0u8; 10_000];
        // Profiles 2 and 4 both fit; the lighter one is accepted
        let recompressor = SizedRecompressor::new(&[9_000, 7_000, 8_000, 5_000]);

        let summary = search(&recompressor, &input, 7_000, &SearchPolicy::default()).unwrap();

        let matched = summary.matched.unwrap();
        assert_eq!(matched.size_bytes(), 7_000);
        assert_eq!(matched.profile, "balanced");
        assert_eq!(summary.attempts, 2);
        assert_eq!(recompressor.calls.borrow().len(), 2);
    }

    #[test]
    fn test_no_match_reports_smallest() {
        let input = vec![0u8; 10_000];
        let recompressor = SizedRecompressor::new(&[9_000, 8_500, 8_200, 8_400]);

        let summary = search(&recompressor, &input, 3_000, &SearchPolicy::default()).unwrap();

        assert!(summary.matched.is_none());
        assert_eq!(summary.smallest.size_bytes(), 8_200);
        assert_eq!(summary.smallest.profile, "strong");
    }

    #[test]
    fn test_growth_keeps_input() {
        let input = vec![7u8; 1_000];
        let recompressor = SizedRecompressor::new(&[1_200, 1_100, 1_050, 2_000]);

        let summary = search(&recompressor, &input, 0, &SearchPolicy::default()).unwrap();

        assert_eq!(summary.smallest.size_bytes(), 1_000);
        assert_eq!(summary.smallest.result.bytes, input);
    }

    #[test]
    fn test_large_input_limits_ladder() {
        let policy = SearchPolicy {
            large_input_threshold: 1_000,
            large_input_profile_limit: 2,
        };
        let input = vec![0u8; 1_000];
        let recompressor = SizedRecompressor::new(&[900, 800, 700, 600]);

        let summary = search(&recompressor, &input, 300, &policy).unwrap();

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.smallest.size_bytes(), 800);
    }

    #[test]
    fn test_large_input_without_target_uses_full_ladder() {
        let policy = SearchPolicy {
            large_input_threshold: 1_000,
            large_input_profile_limit: 2,
        };
        assert_eq!(policy.ladder(5_000, 0).len(), 4);
        assert_eq!(policy.ladder(5_000, 1).len(), 2);
        assert_eq!(policy.ladder(999, 1).len(), 4);
    }

    #[test]
    fn test_recompressor_failure_is_fatal() {
        let input = vec![0u8; 100];
        let result = search(&FailingRecompressor, &input, 0, &SearchPolicy::default());
        assert!(matches!(result, Err(RecompressError::Load(_))));
    }

    #[test]
    fn test_base_directives_come_first() {
        let input = vec![0u8; 100];
        let recompressor = SizedRecompressor::new(&[50, 50, 50, 50]);
        search(&recompressor, &input, 0, &SearchPolicy::default()).unwrap();

        for call in recompressor.calls.borrow().iter() {
            assert_eq!(&call[..BASE_DIRECTIVES.len()], BASE_DIRECTIVES);
        }
    }
}
