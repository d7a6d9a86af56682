use crate::types::MergeScoring;

pub const GAP_CHAR: u8 = b'-';
pub const UNKNOWN_CHAR: u8 = b'N';

/// Length of the unknown-base spacer inserted between the forward sequence
/// and the reverse-complemented reverse sequence in concatenate mode.
pub const CONCAT_SPACER_LEN: usize = 10;

/// Scoring used when mismatches are tolerated in the overlap.
pub const SCORING_MILD: MergeScoring = MergeScoring {
    match_score: 4,
    mismatch: -5,
    gap: -8,
};

/// Scoring for zero mismatch tolerance. Mismatches and gaps score far below
/// the match reward, so a near-perfect overlap always beats any alignment
/// containing an error.
pub const SCORING_STRICT: MergeScoring = MergeScoring {
    match_score: 1,
    mismatch: -64,
    gap: -64,
};

pub const DEFAULT_MIN_OVERLAP: usize = 12;
pub const DEFAULT_MAX_MISMATCH: usize = 0;

pub const MERGE_TSV_SUFFIX: &str = ".merged.tsv";

pub const TS_DASHES_BLANK_COLONS_DOT_BLANK: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub const CLI_HEADINGS: [&str; 2] = ["Merge Parameters", "Output Options"];
