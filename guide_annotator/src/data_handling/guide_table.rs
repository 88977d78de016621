use std::path::PathBuf;

use polars::prelude::*;
use tracing::{error, info, warn};

use crate::config::ColumnNames;
use crate::error::Result;
use crate::helper_functions::{bool_column, has_column, int_column, read_csv, string_column};
use crate::models::{Dataset, GuideRecord, Strand};

/// Guide table on disk, as written by library generation or another designer
pub struct GuideTable {
    pub path: PathBuf,
}

impl Dataset for GuideTable {
    fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading guides from {}", self.path.display());
        let df = match read_csv(&self.path) {
            Ok(df) => df,
            Err(e) => {
                error!("Failed to read guide CSV: {}", e);
                return Err(e);
            }
        };
        info!("{} guides loaded", df.height());
        Ok(df)
    }
}

/// Columns a guide table must carry before annotation starts
pub fn required_columns(columns: &ColumnNames) -> Vec<&str> {
    vec![
        columns.seq.as_str(),
        columns.frame.as_str(),
        columns.strand.as_str(),
        columns.gene_pos.as_str(),
        columns.window_start.as_str(),
        columns.window_end.as_str(),
    ]
}

/// Reads the annotation-relevant columns row by row.
///
/// Unknown strands are reported and left empty; those guides are passed
/// through unannotated. `exon` and `is_UTR` are optional.
pub fn records(df: &DataFrame, columns: &ColumnNames) -> Result<Vec<GuideRecord>> {
    let seqs = string_column(df, &columns.seq)?;
    let frames = int_column(df, &columns.frame)?;
    let strands = string_column(df, &columns.strand)?;
    let gene_pos = int_column(df, &columns.gene_pos)?;
    let window_start = int_column(df, &columns.window_start)?;
    let window_end = int_column(df, &columns.window_end)?;
    let exons = if has_column(df, &columns.exon) {
        int_column(df, &columns.exon)?
    } else {
        vec![None; df.height()]
    };
    let utr = if has_column(df, &columns.is_utr) {
        bool_column(df, &columns.is_utr)?
    } else {
        vec![false; df.height()]
    };

    let records = (0..df.height())
        .map(|i| {
            let sgrna_seq = seqs[i].clone().unwrap_or_default();
            let strand = match strands[i].as_deref().map(str::parse::<Strand>) {
                Some(Ok(strand)) => Some(strand),
                other => {
                    warn!(
                        "Guide {} (row {}): unusable strand {:?}",
                        sgrna_seq,
                        i,
                        other.and_then(|r| r.err()).map(|e| e.to_string())
                    );
                    None
                }
            };
            GuideRecord {
                sgrna_seq,
                starting_frame: frames[i],
                strand,
                gene_pos: gene_pos[i],
                window_start: window_start[i],
                window_end: window_end[i],
                exon: exons[i].and_then(|e| usize::try_from(e).ok()),
                is_utr: utr[i],
            }
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionAnchor;

    #[test]
    fn reads_records_with_optional_columns_missing() {
        let df = df!(
            "sgRNA_seq" => ["ATGCCCAAAGGGTTTCCCAA", "ACGTACGTACGTACGTACGT"],
            "starting_frame" => [0i64, 2],
            "sgRNA_strand" => ["sense", "sideways"],
            "gene_pos" => [0i64, -1],
            "windowstart_pos" => [Some(3i64), None],
            "windowend_pos" => [Some(7i64), None],
        )
        .unwrap();
        let records = records(&df, &ColumnNames::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].strand, Some(Strand::Sense));
        assert_eq!(records[0].anchor(), PositionAnchor::GenePos(0));
        assert_eq!(records[0].exon, None);
        assert!(!records[0].is_utr);
        assert_eq!(records[1].strand, None);
        assert_eq!(records[1].anchor(), PositionAnchor::Unanchored);
    }
}
