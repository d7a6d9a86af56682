//! Input normalization. Callers may hand over an in-memory sample, a
//! collection, a sample file, or a directory of sample files; everything is
//! resolved once into the canonical per-sample collection before the core
//! logic runs.

use crate::error::MergeError;
use crate::types::{ClusterRecord, DenoisedClusters, SamplePair, Strand};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk form of one strand of a sample.
#[derive(Debug, Deserialize)]
pub struct StrandFile {
    pub clusters: Vec<ClusterRecord>,
    /// unique-sequence index -> cluster index; null for unassigned.
    pub cluster_map: Vec<Option<serde_json::Number>>,
    /// read ordinal -> unique-sequence index; null for unmapped.
    pub derep_map: Vec<Option<serde_json::Number>>,
}

#[derive(Debug, Deserialize)]
pub struct SampleFile {
    #[serde(default)]
    pub name: Option<String>,
    pub forward: StrandFile,
    pub reverse: StrandFile,
}

/// Tagged-variant input. Resolved exactly once; the core only ever sees the
/// normalized collection.
pub enum MergeInput {
    Single(SamplePair),
    Collection(Vec<SamplePair>),
    FilePath(PathBuf),
    DirectoryPath(PathBuf),
}

impl MergeInput {
    pub fn from_path(path: &Path) -> MergeInput {
        if path.is_dir() {
            MergeInput::DirectoryPath(path.to_path_buf())
        } else {
            MergeInput::FilePath(path.to_path_buf())
        }
    }

    /// True when the caller supplied exactly one sample, in which case the
    /// outward layer unwraps the single result.
    pub fn is_single(&self) -> bool {
        matches!(self, MergeInput::Single(_) | MergeInput::FilePath(_))
    }

    pub fn resolve(self) -> Result<Vec<SamplePair>, MergeError> {
        match self {
            MergeInput::Single(sample) => Ok(vec![sample]),
            MergeInput::Collection(samples) => Ok(samples),
            MergeInput::FilePath(path) => Ok(vec![load_sample_file(&path)?]),
            MergeInput::DirectoryPath(dir) => {
                let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
                    .map_err(|e| MergeError::Io {
                        path: dir.clone(),
                        source: e,
                    })?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
                    .collect();
                paths.sort();
                paths.iter().map(|p| load_sample_file(p)).collect()
            }
        }
    }
}

fn load_sample_file(path: &Path) -> Result<SamplePair, MergeError> {
    let text = fs::read_to_string(path).map_err(|e| MergeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let parsed: SampleFile = serde_json::from_str(&text).map_err(|e| MergeError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let name = parsed.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sample".to_string())
    });
    sample_from_file(name, parsed)
}

/// Convert the loosely-typed on-disk maps into index maps, rejecting
/// anything that is not a non-negative integer.
pub fn sample_from_file(name: String, file: SampleFile) -> Result<SamplePair, MergeError> {
    let forward = DenoisedClusters {
        cluster_map: convert_map(&name, Strand::Forward, "cluster map", file.forward.cluster_map)?,
        clusters: file.forward.clusters,
    };
    let reverse = DenoisedClusters {
        cluster_map: convert_map(&name, Strand::Reverse, "cluster map", file.reverse.cluster_map)?,
        clusters: file.reverse.clusters,
    };
    let derep_forward = convert_map(
        &name,
        Strand::Forward,
        "dereplication map",
        file.forward.derep_map,
    )?;
    let derep_reverse = convert_map(
        &name,
        Strand::Reverse,
        "dereplication map",
        file.reverse.derep_map,
    )?;
    Ok(SamplePair {
        name,
        forward,
        reverse,
        derep_forward,
        derep_reverse,
    })
}

fn convert_map(
    sample: &str,
    strand: Strand,
    map: &'static str,
    raw: Vec<Option<serde_json::Number>>,
) -> Result<Vec<Option<usize>>, MergeError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            None => Ok(None),
            Some(n) => match n.as_u64() {
                Some(v) => Ok(Some(v as usize)),
                None => Err(MergeError::TypeMismatch {
                    sample: sample.to_string(),
                    strand,
                    map,
                    index,
                    value: n.to_string(),
                }),
            },
        })
        .collect()
}
