use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ColumnNames, CODING_SEQ_COLUMN};
use crate::data_handling::guide_table::GuideTable;
use crate::error::{AnnotatorError, Result};
use crate::genomic::rev_complement;
use crate::helper_functions::{filter_rows, string_column, with_coding_seq, write_csv};
use crate::models::Dataset;

pub const OCCURRENCE_COLUMN: &str = "ref_occurrences";

/// Counts how often each guide's coding sequence, or its reverse complement,
/// occurs in a reference genome.
pub struct OccurrenceCounter {
    ac: AhoCorasick,
    /// Guides each pattern belongs to
    pattern_guides: Vec<Vec<usize>>,
    max_len: usize,
    n_guides: usize,
}

impl OccurrenceCounter {
    pub fn new(coding_seqs: &[Option<String>]) -> Result<Self> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut patterns: Vec<String> = Vec::new();
        let mut pattern_guides: Vec<Vec<usize>> = Vec::new();

        for (guide, seq) in coding_seqs.iter().enumerate() {
            let Some(seq) = seq.as_deref().filter(|s| !s.is_empty()) else {
                continue;
            };
            let fwd = seq.to_ascii_uppercase();
            let rev = rev_complement(&fwd)?;
            let strands = if rev == fwd { vec![fwd] } else { vec![fwd, rev] };
            for pattern in strands {
                let id = *index.entry(pattern.clone()).or_insert_with(|| {
                    patterns.push(pattern);
                    pattern_guides.push(Vec::new());
                    patterns.len() - 1
                });
                pattern_guides[id].push(guide);
            }
        }
        if patterns.is_empty() {
            return Err(AnnotatorError::Matcher("no guide sequences to search for".to_string()));
        }

        let pattern_refs: Vec<&str> = patterns.iter().map(|s| s.as_str()).collect();
        let ac = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(&pattern_refs)
            .map_err(|e| AnnotatorError::Matcher(e.to_string()))?;
        let max_len = patterns.iter().map(|p| p.len()).max().unwrap_or(0);
        debug!("Matcher built from {} patterns", patterns.len());

        Ok(OccurrenceCounter {
            ac,
            pattern_guides,
            max_len,
            n_guides: coding_seqs.len(),
        })
    }

    /// Streams a FASTA line by line. The end of the previous line is carried
    /// over so matches spanning a line break are found, and each match is
    /// counted on the line it ends in. Headers and all-`N` lines break the
    /// carry.
    pub fn count<R: BufRead>(&self, reader: R) -> Result<Vec<u64>> {
        let mut counts = vec![0u64; self.n_guides];
        let mut buf: Vec<u8> = Vec::new();
        let carry = self.max_len.saturating_sub(1);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.starts_with('>') {
                debug!("Scanning {}", &line[1..]);
                buf.clear();
                continue;
            }
            if line.is_empty() {
                continue;
            }
            if line.bytes().all(|b| b == b'N' || b == b'n') {
                buf.clear();
                continue;
            }

            let tail_len = buf.len();
            buf.extend_from_slice(line.as_bytes());
            for mat in self.ac.find_overlapping_iter(&buf[..]) {
                if mat.end() > tail_len {
                    for &guide in &self.pattern_guides[mat.pattern().as_usize()] {
                        counts[guide] += 1;
                    }
                }
            }
            let keep_from = buf.len().saturating_sub(carry);
            buf.drain(..keep_from);
        }
        Ok(counts)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceCheckOptions {
    /// Remove guides found more than once
    pub delete_repeats: bool,
    pub output: Option<PathBuf>,
}

/// Appends `ref_occurrences` to a guide table held in memory. A missing
/// `coding_seq` column is derived from the guide sequence and strand.
pub fn check_frame(df: DataFrame, genome_fasta: &Path, options: &ReferenceCheckOptions) -> Result<DataFrame> {
    let df = with_coding_seq(df, &ColumnNames::default())?;
    let coding = string_column(&df, CODING_SEQ_COLUMN)?;
    let counter = OccurrenceCounter::new(&coding)?;

    info!("Scanning {} for {} guides", genome_fasta.display(), coding.len());
    let reader = BufReader::new(File::open(genome_fasta)?);
    let counts = counter.count(reader)?;

    let missing = counts.iter().filter(|c| **c == 0).count();
    if missing > 0 {
        warn!("{} guides were not found in the reference", missing);
    }
    let mut df = df;
    let occurrences: Vec<i64> = counts.iter().map(|c| *c as i64).collect();
    df.with_column(Series::new(PlSmallStr::from(OCCURRENCE_COLUMN), occurrences))?;

    if options.delete_repeats {
        let keep: Vec<bool> = counts.iter().map(|c| *c <= 1).collect();
        let before = df.height();
        df = filter_rows(&df, &keep)?;
        info!("{} guides occurring more than once were removed", before - df.height());
    }
    Ok(df)
}

/// Reads a guide CSV, counts reference occurrences and writes the result when an output path is set.
pub fn reference_check(guides_csv: &Path, genome_fasta: &Path, options: &ReferenceCheckOptions) -> Result<DataFrame> {
    let df = GuideTable {
        path: guides_csv.to_path_buf(),
    }
    .load()?;
    let mut df = check_frame(df, genome_fasta, options)?;
    if let Some(output) = &options.output {
        write_csv(&mut df, output)?;
    }
    Ok(df)
}
