//! Pairwise alignment primitives for read-pair merging: unbanded global
//! alignment with free end gaps, overlap evaluation, and consensus
//! construction from an aligned pair.

use crate::constants::GAP_CHAR;
use crate::types::MergeScoring;

/// Unbanded global alignment of two nucleotide sequences with free end
/// gaps, so flanking overhangs show up as leading/trailing gap runs instead
/// of being forced into the overlap. Returns the two gap-padded strings of
/// equal length.
pub fn needleman_wunsch(a: &[u8], b: &[u8], scoring: &MergeScoring) -> (Vec<u8>, Vec<u8>) {
    let n = a.len();
    let m = b.len();
    // score[i][j]: best score aligning a[..i] against b[..j]. First row and
    // column stay 0 (free leading gaps); trailing gaps are free via the
    // j == m / i == n cases below.
    let mut score = vec![vec![0i32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            let sub = if a[i - 1] == b[j - 1] {
                scoring.match_score
            } else {
                scoring.mismatch
            };
            let diag = score[i - 1][j - 1] + sub;
            let up = score[i - 1][j] + if j == m { 0 } else { scoring.gap };
            let left = score[i][j - 1] + if i == n { 0 } else { scoring.gap };
            score[i][j] = diag.max(up).max(left);
        }
    }

    let mut al_a = Vec::with_capacity(n + m);
    let mut al_b = Vec::with_capacity(n + m);
    let mut i = n;
    let mut j = m;
    while i > 0 && j > 0 {
        let sub = if a[i - 1] == b[j - 1] {
            scoring.match_score
        } else {
            scoring.mismatch
        };
        if score[i][j] == score[i - 1][j - 1] + sub {
            al_a.push(a[i - 1]);
            al_b.push(b[j - 1]);
            i -= 1;
            j -= 1;
        } else if score[i][j] == score[i - 1][j] + if j == m { 0 } else { scoring.gap } {
            al_a.push(a[i - 1]);
            al_b.push(GAP_CHAR);
            i -= 1;
        } else {
            al_a.push(GAP_CHAR);
            al_b.push(b[j - 1]);
            j -= 1;
        }
    }
    while i > 0 {
        al_a.push(a[i - 1]);
        al_b.push(GAP_CHAR);
        i -= 1;
    }
    while j > 0 {
        al_a.push(GAP_CHAR);
        al_b.push(b[j - 1]);
        j -= 1;
    }
    al_a.reverse();
    al_b.reverse();
    (al_a, al_b)
}

/// Columns spanned by the overlap: from the first to the last column where
/// both aligned strings carry a real character. None when the alignment is
/// fully staggered.
fn overlap_bounds(al_a: &[u8], al_b: &[u8]) -> Option<(usize, usize)> {
    let start = al_a
        .iter()
        .zip(al_b)
        .position(|(&x, &y)| x != GAP_CHAR && y != GAP_CHAR)?;
    let end = al_a
        .iter()
        .zip(al_b)
        .rposition(|(&x, &y)| x != GAP_CHAR && y != GAP_CHAR)?;
    Some((start, end))
}

/// Count (nmatch, nmismatch, nindel) within the overlap region of an
/// aligned pair. Flanking gap runs are not counted.
pub fn eval_overlap(al_a: &[u8], al_b: &[u8]) -> (usize, usize, usize) {
    let Some((start, end)) = overlap_bounds(al_a, al_b) else {
        return (0, 0, 0);
    };
    let mut nmatch = 0;
    let mut nmismatch = 0;
    let mut nindel = 0;
    for (&x, &y) in al_a[start..=end].iter().zip(&al_b[start..=end]) {
        if x == GAP_CHAR || y == GAP_CHAR {
            nindel += 1;
        } else if x == y {
            nmatch += 1;
        } else {
            nmismatch += 1;
        }
    }
    (nmatch, nmismatch, nindel)
}

/// Build the merged consensus from an aligned pair. Within the overlap the
/// preferred parent wins: its base at mismatches, and columns where it has
/// a gap are dropped. Flank characters belonging 5' to the forward read or
/// 3' to the reverse read are always kept; overhang flanks (the reverse
/// read extending left of the forward start, or the forward read extending
/// right of the reverse end) are kept only when `trim_overhang` is false.
pub fn pair_consensus(al_f: &[u8], al_r: &[u8], prefer: u8, trim_overhang: bool) -> Vec<u8> {
    let len = al_f.len();
    let (ostart, oend) = overlap_bounds(al_f, al_r).unwrap_or((len, len));
    let mut cons = Vec::with_capacity(len);
    for i in 0..len {
        let (cf, cr) = (al_f[i], al_r[i]);
        if i < ostart {
            // Left flank: at most one side has a character here.
            if cf != GAP_CHAR {
                cons.push(cf);
            } else if cr != GAP_CHAR && !trim_overhang {
                cons.push(cr);
            }
        } else if i > oend {
            if cr != GAP_CHAR {
                cons.push(cr);
            } else if cf != GAP_CHAR && !trim_overhang {
                cons.push(cf);
            }
        } else {
            let chosen = if prefer == 2 { cr } else { cf };
            if chosen != GAP_CHAR {
                cons.push(chosen);
            }
        }
    }
    cons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SCORING_MILD, SCORING_STRICT};

    #[test]
    fn align_identical() {
        let (a, b) = needleman_wunsch(b"ACGTACGT", b"ACGTACGT", &SCORING_STRICT);
        assert_eq!(a, b"ACGTACGT");
        assert_eq!(b, b"ACGTACGT");
        assert_eq!(eval_overlap(&a, &b), (8, 0, 0));
    }

    #[test]
    fn align_staggered_overlap() {
        // Forward = prefix + overlap, reverse-complemented reverse =
        // overlap + suffix. Free end gaps put the flanks outside the
        // overlap instead of forcing penalized gaps.
        let fwd = b"AAAATTACGTACGTACGT";
        let rev = b"ACGTACGTACGTGGCCGG";
        let (a, b) = needleman_wunsch(fwd, rev, &SCORING_MILD);
        assert_eq!(a.len(), b.len());
        assert_eq!(eval_overlap(&a, &b), (12, 0, 0));
        let cons = pair_consensus(&a, &b, 1, false);
        assert_eq!(cons, b"AAAATTACGTACGTACGTGGCCGG");
    }

    #[test]
    fn mismatch_counted_in_overlap() {
        // Same layout as above but one base of the forward overlap mutated
        // (T -> A). The mild profile still prefers the full 12-column
        // overlap carrying the mismatch.
        let fwd = b"AAAATTACGTACGAACGT";
        let rev = b"ACGTACGTACGTGGCCGG";
        let (a, b) = needleman_wunsch(fwd, rev, &SCORING_MILD);
        let (nmatch, nmismatch, nindel) = eval_overlap(&a, &b);
        assert_eq!((nmatch, nmismatch, nindel), (11, 1, 0));
    }

    #[test]
    fn overhang_trimming() {
        // Reverse extends left of the forward start, forward extends right
        // of the reverse end: both flanks are overhang.
        let fwd = b"ACGTACGTACGTGGGG";
        let rev = b"CCCCACGTACGTACGT";
        let (a, b) = needleman_wunsch(fwd, rev, &SCORING_MILD);
        assert_eq!(eval_overlap(&a, &b), (12, 0, 0));
        assert_eq!(pair_consensus(&a, &b, 1, true), b"ACGTACGTACGT");
        assert_eq!(pair_consensus(&a, &b, 1, false), b"CCCCACGTACGTACGTGGGG");
    }

    #[test]
    fn prefer_breaks_overlap_mismatch() {
        let al_f = b"ACGTACGT".to_vec();
        let al_r = b"ACGAACGT".to_vec();
        assert_eq!(pair_consensus(&al_f, &al_r, 1, false), b"ACGTACGT");
        assert_eq!(pair_consensus(&al_f, &al_r, 2, false), b"ACGAACGT");
    }

    #[test]
    fn preferred_gap_column_dropped() {
        // Indel inside the overlap: the preferred parent's gap column is
        // removed, its inserted base is kept.
        let al_f = b"ACG-ACGT".to_vec();
        let al_r = b"ACGTACGT".to_vec();
        assert_eq!(pair_consensus(&al_f, &al_r, 1, false), b"ACGACGT");
        assert_eq!(pair_consensus(&al_f, &al_r, 2, false), b"ACGTACGT");
        assert_eq!(eval_overlap(&al_f, &al_r), (7, 0, 1));
    }

    #[test]
    fn no_overlap_counts_zero() {
        let fwd = b"AAAAAAAAAA";
        let rev = b"CCCCCCCCCC";
        let (a, b) = needleman_wunsch(fwd, rev, &SCORING_STRICT);
        assert_eq!(eval_overlap(&a, &b), (0, 0, 0));
    }
}
