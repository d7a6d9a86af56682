//! TSV emission of merge result tables. The fixed column schema is:
//! sequence, abundance, forward, reverse, nmatch, nmismatch, nindel,
//! prefer, accept, then one `F.<col>`/`R.<col>` column per propagated
//! field. The header is identical for empty and populated tables.

use crate::types::MergeTable;
use std::io::Write;
use std::path::Path;

pub const FIXED_COLUMNS: [&str; 9] = [
    "sequence",
    "abundance",
    "forward",
    "reverse",
    "nmatch",
    "nmismatch",
    "nindel",
    "prefer",
    "accept",
];

pub fn header_line(table: &MergeTable) -> String {
    let mut cols: Vec<&str> = FIXED_COLUMNS.to_vec();
    cols.extend(table.propagated.iter().map(|s| s.as_str()));
    cols.join("\t")
}

pub fn write_merge_tsv(table: &MergeTable, output_path: &Path) -> std::io::Result<()> {
    let mut writer = std::io::BufWriter::new(std::fs::File::create(output_path)?);
    writeln!(writer, "{}", header_line(table))?;
    for row in &table.rows {
        let prefer = match row.prefer {
            Some(p) => p.to_string(),
            None => "NA".to_string(),
        };
        let mut fields = vec![
            row.sequence.clone(),
            row.abundance.to_string(),
            row.forward.to_string(),
            row.reverse.to_string(),
            row.nmatch.to_string(),
            row.nmismatch.to_string(),
            row.nindel.to_string(),
            prefer,
            row.accept.to_string(),
        ];
        fields.extend(row.propagated.iter().cloned());
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    Ok(())
}
