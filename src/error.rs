use crate::types::Strand;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal per-sample faults. A sample that raises one of these produces no
/// rows at all; other samples are unaffected.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("sample {sample}: {strand} dereplication map addresses {derep_max} unique sequences but the {strand} cluster map has {cluster_map_len} entries")]
    ShapeMismatch {
        sample: String,
        strand: Strand,
        derep_max: usize,
        cluster_map_len: usize,
    },

    #[error("sample {sample}: {strand} cluster map points at cluster {cluster_idx} but only {n_clusters} {strand} clusters exist")]
    ClusterOutOfRange {
        sample: String,
        strand: Strand,
        cluster_idx: usize,
        n_clusters: usize,
    },

    #[error("sample {sample}: forward dereplication map covers {forward_len} reads but the reverse map covers {reverse_len}")]
    LengthMismatch {
        sample: String,
        forward_len: usize,
        reverse_len: usize,
    },

    #[error("sample {sample}: {strand} {map} entry {index} is not a non-negative integer: {value}")]
    TypeMismatch {
        sample: String,
        strand: Strand,
        map: &'static str,
        index: usize,
        value: String,
    },

    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse sample file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
