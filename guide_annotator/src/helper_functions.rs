use std::collections::HashMap;
use std::fs::{self, File};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::config::{ColumnNames, CODING_SEQ_COLUMN};
use crate::error::{AnnotatorError, Result};
use crate::genomic::rev_complement;
use crate::models::Strand;

pub fn read_csv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

/// Writes a DataFrame as a comma separated file with a header row,
/// creating the parent directory when needed.
pub fn write_csv(df: &mut DataFrame, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(file_path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    info!("{} rows written to {}", df.height(), file_path.display());
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    match names.iter().find(|name| !has_column(df, name)) {
        Some(missing) => Err(AnnotatorError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

/// String values of a column; nulls and non-string dtypes are cast first.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| AnnotatorError::MissingColumn(name.to_string()))?
        .cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Integer values of a column. Floats are truncated, unparsable strings become null.
pub fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let column = df
        .column(name)
        .map_err(|_| AnnotatorError::MissingColumn(name.to_string()))?
        .cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

/// Boolean values of a column, accepting `true`/`True`/`1` style strings
/// as written by other tools.
pub fn bool_column(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = df
        .column(name)
        .map_err(|_| AnnotatorError::MissingColumn(name.to_string()))?;
    let values: Vec<bool> = match column.dtype() {
        DataType::Boolean => column.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect(),
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| {
                v.map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                    .unwrap_or(false)
            })
            .collect(),
        _ => column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .map(|v| v.map(|i| i != 0).unwrap_or(false))
            .collect(),
    };
    Ok(values)
}

/// Fills `coding_seq` when the table lacks it: the guide itself for sense
/// guides, its reverse complement for antisense ones.
pub fn with_coding_seq(mut df: DataFrame, columns: &ColumnNames) -> Result<DataFrame> {
    if has_column(&df, CODING_SEQ_COLUMN) {
        return Ok(df);
    }
    let seqs = string_column(&df, &columns.seq)?;
    let strands = string_column(&df, &columns.strand)?;
    let coding: Vec<Option<String>> = seqs
        .iter()
        .zip(strands.iter())
        .map(|(seq, strand)| {
            let seq = seq.as_deref()?;
            match strand.as_deref()?.parse::<Strand>().ok()? {
                Strand::Sense => Some(seq.to_string()),
                Strand::Antisense => rev_complement(seq).ok(),
            }
        })
        .collect();
    df.with_column(Series::new(PlSmallStr::from(CODING_SEQ_COLUMN), coding))?;
    Ok(df)
}

/// Marks every element whose value occurs more than once, all copies included.
pub fn duplicated_mask<T: Eq + Hash>(values: &[T]) -> Vec<bool> {
    let mut counts: HashMap<&T, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    values.iter().map(|v| counts[v] > 1).collect()
}

/// Keeps rows whose mask entry is true.
pub fn filter_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    let mask = BooleanChunked::from_slice(PlSmallStr::from("keep"), keep);
    df.filter(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn duplicated_mask_flags_all_copies() {
        let values = vec!["a", "b", "a", "c", "b"];
        assert_eq!(duplicated_mask(&values), vec![true, true, true, false, true]);
        let empty: Vec<&str> = vec![];
        assert!(duplicated_mask(&empty).is_empty());
    }

    #[test]
    fn csv_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("guides.csv");
        let mut df = df!(
            "sgRNA_seq" => ["ACGT", "TTTT"],
            "gene_pos" => [3i64, -1],
            "is_UTR" => [true, false],
        )
        .unwrap();
        write_csv(&mut df, &path).unwrap();

        let back = read_csv(&path).unwrap();
        assert_eq!(back.height(), 2);
        require_columns(&back, &["sgRNA_seq", "gene_pos"]).unwrap();
        assert!(matches!(
            require_columns(&back, &["exon"]),
            Err(AnnotatorError::MissingColumn(c)) if c == "exon"
        ));
        assert_eq!(int_column(&back, "gene_pos").unwrap(), vec![Some(3), Some(-1)]);
        assert_eq!(bool_column(&back, "is_UTR").unwrap(), vec![true, false]);
        assert_eq!(
            string_column(&back, "sgRNA_seq").unwrap(),
            vec![Some("ACGT".to_string()), Some("TTTT".to_string())]
        );
    }

    #[test]
    fn bool_column_accepts_capitalised_strings() {
        let df = df!("is_UTR" => ["True", "False", "1"]).unwrap();
        assert_eq!(bool_column(&df, "is_UTR").unwrap(), vec![true, false, true]);
    }

    #[test]
    fn filter_rows_applies_mask() {
        let df = df!("x" => [1i64, 2, 3]).unwrap();
        let filtered = filter_rows(&df, &[true, false, true]).unwrap();
        assert_eq!(int_column(&filtered, "x").unwrap(), vec![Some(1), Some(3)]);
    }
}
