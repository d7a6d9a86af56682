use memory_stats::memory_stats;

pub fn log_memory_usage(info: bool, message: &str) {
    if let Some(usage) = memory_stats() {
        if info {
            log::info!(
                "{} --- Memory usage: {:.2} GB",
                message,
                usage.physical_mem as f64 / 1_000_000_000.
            );
        } else {
            log::debug!(
                "{} --- Memory usage: {:.2} GB",
                message,
                usage.physical_mem as f64 / 1_000_000_000.
            );
        }
    } else {
        log::info!("Memory usage: unknown (WARNING)");
    }
}

pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    let mut revcomp = Vec::with_capacity(seq.len());
    for &base in seq.iter().rev() {
        let comp_base = match base {
            b'A' | b'a' => b'T',
            b'T' | b't' => b'A',
            b'C' | b'c' => b'G',
            b'G' | b'g' => b'C',
            b'N' | b'n' => b'N',
            _ => b'N', // Handle unexpected characters
        };
        revcomp.push(comp_base);
    }
    revcomp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revcomp_basic() {
        assert_eq!(reverse_complement(b"ACGT"), b"ACGT");
        assert_eq!(reverse_complement(b"AAAA"), b"TTTT");
        assert_eq!(reverse_complement(b"GCTA"), b"TAGC");
        assert_eq!(reverse_complement(b"acgn"), b"NCGT");
    }
}
