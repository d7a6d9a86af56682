//! Reconciles the forward and reverse denoised clusterings of a sample
//! into merged consensus sequences: index composition, pair aggregation,
//! alignment, accept/reject classification and result assembly.

use crate::constants::*;
use crate::error::MergeError;
use crate::input::MergeInput;
use crate::nwalign::{eval_overlap, needleman_wunsch, pair_consensus};
use crate::types::*;
use crate::utils::reverse_complement;
use fxhash::FxHashMap;
use rayon::prelude::*;
use std::sync::Mutex;

/// Compose read ordinal -> cluster index for one strand by chaining the
/// dereplication map through the cluster map.
fn compose_cluster_indices(
    sample: &str,
    strand: Strand,
    derep_map: &[Option<usize>],
    cluster_map: &[Option<usize>],
    n_clusters: usize,
) -> Result<Vec<Option<usize>>, MergeError> {
    if let Some(derep_max) = derep_map.iter().flatten().copied().max() {
        if derep_max + 1 != cluster_map.len() {
            return Err(MergeError::ShapeMismatch {
                sample: sample.to_string(),
                strand,
                derep_max: derep_max + 1,
                cluster_map_len: cluster_map.len(),
            });
        }
    }
    if let Some(&bad) = cluster_map
        .iter()
        .flatten()
        .find(|&&idx| idx >= n_clusters)
    {
        return Err(MergeError::ClusterOutOfRange {
            sample: sample.to_string(),
            strand,
            cluster_idx: bad,
            n_clusters,
        });
    }
    Ok(derep_map
        .iter()
        .map(|unique| unique.and_then(|u| cluster_map[u]))
        .collect())
}

/// Unique (forward, reverse) cluster pairings in discovery order, with the
/// contingency counts recovering each pairing's abundance. Reads with a
/// missing index on either side are discarded here.
struct PairCounts {
    pairs: Vec<(usize, usize)>,
    counts: FxHashMap<(usize, usize), usize>,
    total_paired: usize,
}

fn aggregate_pairs(fwd_idx: &[Option<usize>], rev_idx: &[Option<usize>]) -> PairCounts {
    let mut counts = FxHashMap::default();
    let mut pairs = Vec::new();
    let mut total_paired = 0;
    for (f, r) in fwd_idx.iter().zip(rev_idx) {
        if let (Some(f), Some(r)) = (f, r) {
            let count = counts.entry((*f, *r)).or_insert(0usize);
            if *count == 0 {
                pairs.push((*f, *r));
            }
            *count += 1;
            total_paired += 1;
        }
    }
    PairCounts {
        pairs,
        counts,
        total_paired,
    }
}

struct PropagatedColumn {
    header: String,
    strand: Strand,
    name: String,
}

/// Requested metadata columns that actually exist on a parent side. Unknown
/// names are dropped without error.
fn propagated_columns(
    forward: &DenoisedClusters,
    reverse: &DenoisedClusters,
    requested: &[String],
) -> Vec<PropagatedColumn> {
    let mut cols = Vec::new();
    let has = |clusters: &[ClusterRecord], name: &str| {
        clusters.iter().any(|c| c.extra.contains_key(name))
    };
    for name in requested {
        if has(&forward.clusters, name) {
            cols.push(PropagatedColumn {
                header: format!("F.{}", name),
                strand: Strand::Forward,
                name: name.clone(),
            });
        }
        if has(&reverse.clusters, name) {
            cols.push(PropagatedColumn {
                header: format!("R.{}", name),
                strand: Strand::Reverse,
                name: name.clone(),
            });
        }
    }
    cols
}

fn column_value(record: &ClusterRecord, name: &str) -> String {
    match record.extra.get(name) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "NA".to_string(),
    }
}

/// Merge one pairing: concatenate, or align + classify.
fn merge_one_pairing(
    fcl: &ClusterRecord,
    rcl: &ClusterRecord,
    fi: usize,
    ri: usize,
    abundance: usize,
    scoring: &MergeScoring,
    opt: &MergeOptions,
) -> MergedPair {
    let rseq_rc = reverse_complement(rcl.sequence.as_bytes());

    if opt.just_concatenate {
        let mut seq = Vec::with_capacity(fcl.sequence.len() + CONCAT_SPACER_LEN + rseq_rc.len());
        seq.extend_from_slice(fcl.sequence.as_bytes());
        seq.extend(std::iter::repeat(UNKNOWN_CHAR).take(CONCAT_SPACER_LEN));
        seq.extend_from_slice(&rseq_rc);
        return MergedPair {
            sequence: String::from_utf8_lossy(&seq).into_owned(),
            abundance,
            forward: fi,
            reverse: ri,
            nmatch: 0,
            nmismatch: 0,
            nindel: 0,
            prefer: None,
            accept: true,
            propagated: Vec::new(),
        };
    }

    let (al_f, al_r) = needleman_wunsch(fcl.sequence.as_bytes(), &rseq_rc, scoring);
    let (nmatch, nmismatch, nindel) = eval_overlap(&al_f, &al_r);
    // Ties favor the forward parent.
    let prefer = if rcl.abundance > fcl.abundance { 2 } else { 1 };
    let accept = nmatch >= opt.min_overlap && nmismatch + nindel <= opt.max_mismatch;
    let cons = pair_consensus(&al_f, &al_r, prefer, opt.trim_overhang);
    MergedPair {
        sequence: String::from_utf8_lossy(&cons).into_owned(),
        abundance,
        forward: fi,
        reverse: ri,
        nmatch,
        nmismatch,
        nindel,
        prefer: Some(prefer),
        accept,
        propagated: Vec::new(),
    }
}

/// Merge one sample. Fatal validation faults abort the whole sample with no
/// partial rows; zero surviving pairings is a valid empty table carrying
/// the full column schema.
pub fn merge_sample(sample: &SamplePair, opt: &MergeOptions) -> Result<MergeTable, MergeError> {
    if sample.derep_forward.len() != sample.derep_reverse.len() {
        return Err(MergeError::LengthMismatch {
            sample: sample.name.clone(),
            forward_len: sample.derep_forward.len(),
            reverse_len: sample.derep_reverse.len(),
        });
    }
    let fwd_idx = compose_cluster_indices(
        &sample.name,
        Strand::Forward,
        &sample.derep_forward,
        &sample.forward.cluster_map,
        sample.forward.clusters.len(),
    )?;
    let rev_idx = compose_cluster_indices(
        &sample.name,
        Strand::Reverse,
        &sample.derep_reverse,
        &sample.reverse.cluster_map,
        sample.reverse.clusters.len(),
    )?;

    let agg = aggregate_pairs(&fwd_idx, &rev_idx);
    let columns = propagated_columns(&sample.forward, &sample.reverse, &opt.propagate_col);
    let headers: Vec<String> = columns.iter().map(|c| c.header.clone()).collect();

    if agg.pairs.is_empty() {
        let msg = format!(
            "Sample {}: no read pair had both strands resolved to a cluster",
            sample.name
        );
        if opt.verbose {
            log::info!("{}", msg);
        } else {
            log::debug!("{}", msg);
        }
        return Ok(MergeTable {
            propagated: headers,
            rows: Vec::new(),
        });
    }

    // Profile is a local value passed into every alignment call, so
    // concurrent samples never observe each other's scoring.
    let scoring = MergeScoring::for_tolerance(opt.max_mismatch);

    let merged = Mutex::new(Vec::with_capacity(agg.pairs.len()));
    agg.pairs.par_iter().enumerate().for_each(|(order, &(fi, ri))| {
        let fcl = &sample.forward.clusters[fi];
        let rcl = &sample.reverse.clusters[ri];
        let abundance = agg.counts[&(fi, ri)];
        let mut rec = merge_one_pairing(fcl, rcl, fi, ri, abundance, &scoring, opt);
        rec.propagated = columns
            .iter()
            .map(|col| match col.strand {
                Strand::Forward => column_value(fcl, &col.name),
                Strand::Reverse => column_value(rcl, &col.name),
            })
            .collect();
        merged.lock().unwrap().push((order, rec));
    });

    let mut merged = merged.into_inner().unwrap();
    merged.sort_by_key(|k| k.0);
    let mut rows: Vec<MergedPair> = merged.into_iter().map(|(_, rec)| rec).collect();

    // Rejected rows never carry a usable sequence.
    for row in rows.iter_mut() {
        if !row.accept {
            row.sequence.clear();
        }
    }

    // Stable sort: ties keep discovery order.
    rows.sort_by(|a, b| b.abundance.cmp(&a.abundance));

    let merged_reads: usize = rows.iter().filter(|r| r.accept).map(|r| r.abundance).sum();
    let merged_pairings = rows.iter().filter(|r| r.accept).count();
    let summary = format!(
        "Sample {}: {} paired-reads (in {} unique pairings) successfully merged out of {} (in {} pairings) input",
        sample.name,
        merged_reads,
        merged_pairings,
        agg.total_paired,
        rows.len()
    );
    if opt.verbose {
        log::info!("{}", summary);
    } else {
        log::debug!("{}", summary);
    }

    if !opt.return_rejects {
        rows.retain(|r| r.accept);
    }

    let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
    for row in rows.iter().filter(|r| !r.sequence.is_empty()) {
        *seen.entry(row.sequence.as_str()).or_insert(0) += 1;
    }
    let dup_groups = seen.values().filter(|&&c| c > 1).count();
    if dup_groups > 0 {
        log::info!(
            "Sample {}: {} merged sequence(s) are shared by distinct cluster pairings; rows retained as-is",
            sample.name,
            dup_groups
        );
    }

    Ok(MergeTable {
        propagated: headers,
        rows,
    })
}

/// Merge a collection of samples independently, preserving order and names.
pub fn merge_samples(
    samples: &[SamplePair],
    opt: &MergeOptions,
) -> Result<Vec<(String, MergeTable)>, MergeError> {
    samples
        .iter()
        .map(|s| merge_sample(s, opt).map(|t| (s.name.clone(), t)))
        .collect()
}

/// Outward-facing entry point: normalizes the input, runs the per-sample
/// core, and unwraps the single-sample case.
pub fn merge_pairs(input: MergeInput, opt: &MergeOptions) -> Result<MergeOutput, MergeError> {
    let single = input.is_single();
    let samples = input.resolve()?;
    let mut results = merge_samples(&samples, opt)?;
    if single && results.len() == 1 {
        let (name, table) = results.remove(0);
        Ok(MergeOutput::Single(name, table))
    } else {
        Ok(MergeOutput::Collection(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::reverse_complement;

    fn strand(seqs_and_abund: &[(&str, usize)], cluster_map: &[Option<usize>]) -> DenoisedClusters {
        DenoisedClusters {
            clusters: seqs_and_abund
                .iter()
                .map(|(s, a)| ClusterRecord::new(s, *a))
                .collect(),
            cluster_map: cluster_map.to_vec(),
        }
    }

    fn rc_string(seq: &str) -> String {
        String::from_utf8(reverse_complement(seq.as_bytes())).unwrap()
    }

    /// One forward cluster / one reverse cluster, identity derep and
    /// cluster maps over `n_reads` reads.
    fn simple_sample(fwd_seq: &str, rev_rc_seq: &str, n_reads: usize) -> SamplePair {
        let rev_seq = rc_string(rev_rc_seq);
        SamplePair {
            name: "s1".to_string(),
            forward: strand(&[(fwd_seq, 10)], &[Some(0)]),
            reverse: strand(&[(&rev_seq, 5)], &[Some(0)]),
            derep_forward: vec![Some(0); n_reads],
            derep_reverse: vec![Some(0); n_reads],
        }
    }

    #[test]
    fn perfect_overlap_merges() {
        let sample = simple_sample("ACGTACGT", "ACGTACGT", 20);
        let opt = MergeOptions {
            min_overlap: 8,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.sequence, "ACGTACGT");
        assert_eq!(row.abundance, 20);
        assert_eq!((row.nmatch, row.nmismatch, row.nindel), (8, 0, 0));
        assert_eq!(row.prefer, Some(1));
        assert!(row.accept);
    }

    #[test]
    fn induced_mismatch_rejected_at_zero_tolerance() {
        // One mismatch inside an otherwise perfect full-length overlap.
        let sample = simple_sample("ACGTACGT", "ACGAACGT", 4);
        let opt = MergeOptions {
            min_overlap: 8,
            max_mismatch: 0,
            return_rejects: true,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert!(!table.rows[0].accept);
        assert_eq!(table.rows[0].sequence, "");
    }

    #[test]
    fn tolerated_mismatch_accepted_with_preferred_base() {
        // One substitution inside a full-length overlap, one error allowed.
        // The more abundant reverse parent supplies the disputed base.
        let mut sample = simple_sample("AATTCCGGAACCGGTT", "AATTCCGAAACCGGTT", 4);
        sample.reverse.clusters[0].abundance = 100;
        let opt = MergeOptions {
            min_overlap: 12,
            max_mismatch: 1,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!((row.nmatch, row.nmismatch, row.nindel), (15, 1, 0));
        assert!(row.accept);
        assert_eq!(row.prefer, Some(2));
        assert_eq!(row.sequence, "AATTCCGAAACCGGTT");
    }

    #[test]
    fn rejects_dropped_unless_requested() {
        let sample = simple_sample("ACGTACGT", "ACGAACGT", 4);
        let opt = MergeOptions {
            min_overlap: 8,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert!(table.rows.is_empty());
    }

    #[test]
    fn concatenate_mode() {
        let sample = simple_sample("ACGTACGT", "TTTTCCCC", 3);
        let opt = MergeOptions {
            just_concatenate: true,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        let row = &table.rows[0];
        assert!(row.accept);
        assert_eq!(row.prefer, None);
        assert_eq!((row.nmatch, row.nmismatch, row.nindel), (0, 0, 0));
        assert_eq!(row.sequence, "ACGTACGTNNNNNNNNNNTTTTCCCC");
    }

    #[test]
    fn prefer_reverse_when_more_abundant() {
        let mut sample = simple_sample("ACGTACGT", "ACGTACGT", 2);
        sample.reverse.clusters[0].abundance = 100;
        let opt = MergeOptions {
            min_overlap: 8,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows[0].prefer, Some(2));
    }

    #[test]
    fn abundance_sums_to_resolved_reads() {
        // Two forward clusters, two reverse clusters, unassigned entries
        // sprinkled in. 0-0 twice, 1-1 three times, one read unresolved.
        let f0 = "AAAACCCCGGGGTTTT";
        let f1 = "TTTTGGGGCCCCAAAA";
        let r0 = rc_string(f0);
        let r1 = rc_string(f1);
        let sample = SamplePair {
            name: "s2".to_string(),
            forward: strand(&[(f0, 4), (f1, 3)], &[Some(0), Some(1)]),
            reverse: strand(&[(&r0, 4), (&r1, 3)], &[Some(0), Some(1)]),
            derep_forward: vec![Some(0), Some(0), Some(1), Some(1), Some(1), None],
            derep_reverse: vec![Some(0), Some(0), Some(1), Some(1), Some(1), Some(0)],
        };
        let opt = MergeOptions {
            min_overlap: 8,
            return_rejects: true,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        let total: usize = table.rows.iter().map(|r| r.abundance).sum();
        assert_eq!(total, 5);
        assert_eq!(table.rows.len(), 2);
        // Sorted by abundance descending: the 1-1 pairing first.
        assert_eq!(table.rows[0].abundance, 3);
        assert_eq!((table.rows[0].forward, table.rows[0].reverse), (1, 1));
        assert_eq!(table.rows[1].abundance, 2);
    }

    #[test]
    fn sort_is_idempotent() {
        let f0 = "AAAACCCCGGGGTTTT";
        let f1 = "TTTTGGGGCCCCAAAA";
        let r0 = rc_string(f0);
        let r1 = rc_string(f1);
        let sample = SamplePair {
            name: "s3".to_string(),
            forward: strand(&[(f0, 4), (f1, 3)], &[Some(0), Some(1)]),
            reverse: strand(&[(&r0, 4), (&r1, 3)], &[Some(0), Some(1)]),
            derep_forward: vec![Some(0), Some(1), Some(1)],
            derep_reverse: vec![Some(0), Some(1), Some(1)],
        };
        let opt = MergeOptions {
            min_overlap: 8,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        let abundances: Vec<usize> = table.rows.iter().map(|r| r.abundance).collect();
        let mut resorted = abundances.clone();
        resorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(abundances, resorted);
    }

    #[test]
    fn empty_pairings_give_empty_table_with_schema() {
        let sample = SamplePair {
            name: "s4".to_string(),
            forward: strand(&[("ACGT", 1)], &[Some(0)]),
            reverse: strand(&[("ACGT", 1)], &[Some(0)]),
            derep_forward: vec![Some(0), None],
            derep_reverse: vec![None, Some(0)],
        };
        let mut opt = MergeOptions::default();
        opt.propagate_col = vec!["birth_ham".to_string()];
        let table = merge_sample(&sample, &opt).unwrap();
        assert!(table.rows.is_empty());
        // Unknown column on both sides: dropped, not an error.
        assert!(table.propagated.is_empty());
    }

    #[test]
    fn propagate_existing_column() {
        let mut sample = simple_sample("ACGTACGT", "ACGTACGT", 2);
        sample.forward.clusters[0]
            .extra
            .insert("birth_ham".to_string(), serde_json::json!(2));
        let opt = MergeOptions {
            min_overlap: 8,
            propagate_col: vec!["birth_ham".to_string(), "nonexistent".to_string()],
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.propagated, vec!["F.birth_ham".to_string()]);
        assert_eq!(table.rows[0].propagated, vec!["2".to_string()]);
    }

    #[test]
    fn derep_length_mismatch_is_fatal() {
        let mut sample = simple_sample("ACGTACGT", "ACGTACGT", 2);
        sample.derep_reverse.push(Some(0));
        let err = merge_sample(&sample, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MergeError::LengthMismatch { .. }));
        assert!(err.to_string().contains("s1"));
    }

    #[test]
    fn derep_cluster_map_shape_mismatch_is_fatal() {
        let mut sample = simple_sample("ACGTACGT", "ACGTACGT", 2);
        // Derep map addresses unique index 3 but the cluster map has 1 entry.
        sample.derep_forward[1] = Some(3);
        let err = merge_sample(&sample, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, MergeError::ShapeMismatch { .. }));
        assert!(err.to_string().contains("forward"));
    }

    #[test]
    fn trim_overhang_strips_single_stranded_ends() {
        // Reverse read starts left of the forward read and the forward read
        // runs past the reverse 3' end.
        let sample = simple_sample("ACGTACGTACGTGGGG", "CCCCACGTACGTACGT", 2);
        let opt = MergeOptions {
            min_overlap: 12,
            trim_overhang: true,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows[0].sequence, "ACGTACGTACGT");
    }

    #[test]
    fn duplicate_sequences_kept_as_separate_rows() {
        // Two forward clusters with identical reads against one reverse
        // cluster produce two rows with the same consensus; they stay
        // separate with their own abundances.
        let seq = "ACGTAACCGGTTACGT";
        let rev = rc_string(seq);
        let sample = SamplePair {
            name: "s5".to_string(),
            forward: strand(&[(seq, 6), (seq, 2)], &[Some(0), Some(1)]),
            reverse: strand(&[(&rev, 5)], &[Some(0)]),
            derep_forward: vec![Some(0), Some(0), Some(1)],
            derep_reverse: vec![Some(0), Some(0), Some(0)],
        };
        let opt = MergeOptions {
            min_overlap: 12,
            ..Default::default()
        };
        let table = merge_sample(&sample, &opt).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].sequence, table.rows[1].sequence);
        assert_eq!(table.rows[0].abundance, 2);
        assert_eq!(table.rows[1].abundance, 1);
    }

    #[test]
    fn single_sample_output_unwrapped() {
        let sample = simple_sample("ACGTACGT", "ACGTACGT", 2);
        let opt = MergeOptions {
            min_overlap: 8,
            ..Default::default()
        };
        let out = merge_pairs(MergeInput::Single(sample), &opt).unwrap();
        match out {
            MergeOutput::Single(name, table) => {
                assert_eq!(name, "s1");
                assert_eq!(table.rows.len(), 1);
            }
            MergeOutput::Collection(_) => panic!("expected unwrapped single result"),
        }
    }
}
