use crate::constants::*;
use fxhash::FxHashMap;
use serde::Deserialize;
use std::fmt;

/// One denoised cluster: its output sequence, the abundance of the reads
/// that were assigned to it, plus any extra metadata columns the denoiser
/// attached (birth statistics, p-values, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterRecord {
    pub sequence: String,
    pub abundance: usize,
    #[serde(flatten, default)]
    pub extra: FxHashMap<String, serde_json::Value>,
}

impl ClusterRecord {
    pub fn new(sequence: &str, abundance: usize) -> Self {
        ClusterRecord {
            sequence: sequence.to_string(),
            abundance,
            extra: FxHashMap::default(),
        }
    }
}

/// The denoised clustering of one strand of one sample: the cluster records
/// in index order, plus the map from dereplicated unique-sequence index to
/// cluster index. Entries of the map may be unassigned.
#[derive(Debug, Clone)]
pub struct DenoisedClusters {
    pub clusters: Vec<ClusterRecord>,
    pub cluster_map: Vec<Option<usize>>,
}

/// Raw-read ordinal -> dereplicated unique-sequence index.
pub type DerepMap = Vec<Option<usize>>;

/// All four inputs of one sample. The forward and reverse dereplication
/// maps must cover the same reads in the same order.
#[derive(Debug, Clone)]
pub struct SamplePair {
    pub name: String,
    pub forward: DenoisedClusters,
    pub reverse: DenoisedClusters,
    pub derep_forward: DerepMap,
    pub derep_reverse: DerepMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Forward,
    Reverse,
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "forward"),
            Strand::Reverse => write!(f, "reverse"),
        }
    }
}

/// Alignment scoring profile. Constructed per batch of pairings and passed
/// by value into every alignment call; never stored in shared state, so
/// concurrent samples cannot observe each other's profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeScoring {
    pub match_score: i32,
    pub mismatch: i32,
    pub gap: i32,
}

impl MergeScoring {
    /// Profile selection from the configured mismatch tolerance.
    pub fn for_tolerance(max_mismatch: usize) -> MergeScoring {
        if max_mismatch == 0 {
            SCORING_STRICT
        } else {
            SCORING_MILD
        }
    }
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Minimum number of matching overlap positions required to accept.
    pub min_overlap: usize,
    /// Maximum tolerated mismatches + indels in the overlap.
    pub max_mismatch: usize,
    /// Keep rejected pairings in the output table.
    pub return_rejects: bool,
    /// Metadata columns to copy from the parent cluster records.
    pub propagate_col: Vec<String>,
    /// Skip alignment and join the two sequences with an N spacer.
    pub just_concatenate: bool,
    /// Trim single-stranded overhangs off the consensus.
    pub trim_overhang: bool,
    /// Report per-sample merge summaries at info level.
    pub verbose: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            min_overlap: DEFAULT_MIN_OVERLAP,
            max_mismatch: DEFAULT_MAX_MISMATCH,
            return_rejects: false,
            propagate_col: Vec::new(),
            just_concatenate: false,
            trim_overhang: false,
            verbose: false,
        }
    }
}

/// One merged forward/reverse cluster pairing.
#[derive(Debug, Clone)]
pub struct MergedPair {
    /// Consensus sequence; empty when the pairing was rejected.
    pub sequence: String,
    /// Number of raw read pairs that realized this pairing.
    pub abundance: usize,
    pub forward: usize,
    pub reverse: usize,
    pub nmatch: usize,
    pub nmismatch: usize,
    pub nindel: usize,
    /// 1 when the forward parent is preferred, 2 for the reverse parent.
    /// Absent in concatenate mode.
    pub prefer: Option<u8>,
    pub accept: bool,
    /// Values of the propagated columns, parallel to `MergeTable::propagated`.
    pub propagated: Vec<String>,
}

/// Result table for one sample. The column schema (including the propagated
/// column headers) is present even when no pairing survived.
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    /// Propagated column headers, already `F.`/`R.`-prefixed, request order.
    pub propagated: Vec<String>,
    /// Rows sorted by abundance descending, discovery order on ties.
    pub rows: Vec<MergedPair>,
}

/// Per-sample results, or a single unwrapped table when the caller supplied
/// a single sample.
#[derive(Debug, Clone)]
pub enum MergeOutput {
    Single(String, MergeTable),
    Collection(Vec<(String, MergeTable)>),
}
