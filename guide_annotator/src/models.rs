use std::fmt;
use std::str::FromStr;

use bio_seq::prelude::{Dna, Seq};
use polars::prelude::{DataFrame, PolarsResult};

use crate::error::{AnnotatorError, Result};
use crate::genomic::complement_base;

/// Orientation of a guide relative to the coding strand of its gene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Sense,
    Antisense,
}

impl Strand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Sense => "sense",
            Strand::Antisense => "antisense",
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strand {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "sense" => Ok(Strand::Sense),
            "antisense" => Ok(Strand::Antisense),
            other => Err(AnnotatorError::InvalidConfig(format!(
                "unknown guide strand `{}`",
                other
            ))),
        }
    }
}

/// Genomic strand the gene is transcribed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneStrand {
    #[default]
    Plus,
    Minus,
}

impl GeneStrand {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneStrand::Plus => "plus",
            GeneStrand::Minus => "minus",
        }
    }
}

/// A base editor's substitution, e.g. `C`→`T`, or a dual editor `AC`→`GT`
/// where each position forms its own base pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditChemistry {
    pub edit_from: String,
    pub edit_to: String,
}

impl EditChemistry {
    /// Validates and uppercases the chemistry.
    ///
    /// Both sides must be `A`/`C`/`G`/`T` only, of equal length 1 or 2.
    pub fn new(edit_from: &str, edit_to: &str) -> Result<Self> {
        let edit_from = edit_from.trim().to_ascii_uppercase();
        let edit_to = edit_to.trim().to_ascii_uppercase();

        if edit_from.len() != edit_to.len() || !(1..=2).contains(&edit_from.len()) {
            return Err(AnnotatorError::InvalidConfig(format!(
                "edit_from `{}` and edit_to `{}` must be of equal length 1 or 2",
                edit_from, edit_to
            )));
        }
        for bases in [&edit_from, &edit_to] {
            bases.parse::<Seq<Dna>>().map_err(|_| {
                AnnotatorError::InvalidConfig(format!("edit bases `{}` must be A, C, G or T", bases))
            })?;
        }
        Ok(EditChemistry { edit_from, edit_to })
    }

    /// Column prefix, e.g. `CtoT`
    pub fn prefix(&self) -> String {
        format!("{}to{}", self.edit_from, self.edit_to)
    }

    pub fn is_dual(&self) -> bool {
        self.edit_from.len() == 2
    }

    /// Base pairs as written, in guide orientation
    pub fn pairs(&self) -> Vec<(char, char)> {
        self.edit_from.chars().zip(self.edit_to.chars()).collect()
    }

    /// Base pairs as they appear on the coding strand. An antisense guide
    /// edits the complement of its own bases.
    pub fn for_strand(&self, strand: Strand) -> Vec<(char, char)> {
        match strand {
            Strand::Sense => self.pairs(),
            Strand::Antisense => self
                .pairs()
                .into_iter()
                .filter_map(|(from, to)| Some((complement_base(from)?, complement_base(to)?)))
                .collect(),
        }
    }
}

/// 1-indexed inclusive editing window within the protospacer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditingWindow {
    pub start: usize,
    pub end: usize,
}

impl EditingWindow {
    pub fn new(start: usize, end: usize, guide_len: usize) -> Result<Self> {
        if start < 1 || start > end || end > guide_len {
            return Err(AnnotatorError::InvalidConfig(format!(
                "editing window [{}, {}] must satisfy 1 <= start <= end <= {}",
                start, end, guide_len
            )));
        }
        Ok(EditingWindow { start, end })
    }

    pub fn width(&self) -> usize {
        self.end - self.start + 1
    }

    /// 0-indexed half open range of the window in guide orientation
    pub fn guide_range(&self) -> std::ops::Range<usize> {
        self.start - 1..self.end
    }

    /// Gene coordinates of the window bounds for a guide anchored at `gene_pos`
    pub fn gene_bounds(&self, gene_pos: i64, strand: Strand) -> (i64, i64) {
        let (lo, hi) = (self.start as i64, self.end as i64);
        match strand {
            Strand::Sense => (gene_pos + lo - 1, gene_pos + hi - 1),
            Strand::Antisense => (gene_pos - lo + 1, gene_pos - hi + 1),
        }
    }
}

/// Where a guide sits on the CDS, as far as the guide table tells us
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionAnchor {
    /// Gene coordinate of the guide's first protospacer base (rightmost on the
    /// forward strand for antisense guides)
    GenePos(i64),
    /// Gene coordinate of the window's first base in guide orientation
    WindowStart(i64),
    /// Controls and other guides with no position
    Unanchored,
}

/// One row of the guide table, reduced to what annotation reads
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuideRecord {
    pub sgrna_seq: String,
    pub starting_frame: Option<i64>,
    pub strand: Option<Strand>,
    pub gene_pos: Option<i64>,
    pub window_start: Option<i64>,
    pub window_end: Option<i64>,
    pub exon: Option<usize>,
    pub is_utr: bool,
}

impl GuideRecord {
    /// `gene_pos` wins when it is a real position; guides whose nominal
    /// position falls before the CDS (`-1` and below) fall back to the window
    /// start. Controls carry neither.
    pub fn anchor(&self) -> PositionAnchor {
        match (self.gene_pos, self.window_start) {
            (Some(p), _) if p >= 0 => PositionAnchor::GenePos(p),
            (_, Some(w)) => PositionAnchor::WindowStart(w),
            _ => PositionAnchor::Unanchored,
        }
    }
}

/// Classification label of a mutation set or a whole guide
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MutType {
    SpliceAcceptor,
    SpliceDonor,
    Nonsense,
    Missense,
    Silent,
    Utr,
    Intron,
    NoMutation,
}

impl MutType {
    pub fn label(&self) -> &'static str {
        match self {
            MutType::SpliceAcceptor => "Splice-acceptor",
            MutType::SpliceDonor => "Splice-donor",
            MutType::Nonsense => "Nonsense",
            MutType::Missense => "Missense",
            MutType::Silent => "Silent",
            MutType::Utr => "UTR",
            MutType::Intron => "Intron",
            MutType::NoMutation => "No Mutation",
        }
    }
}

impl fmt::Display for MutType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the editing window falls relative to exon boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOverlap {
    Exon,
    Intron,
    ExonIntron,
}

impl WindowOverlap {
    pub fn label(&self) -> &'static str {
        match self {
            WindowOverlap::Exon => "Exon",
            WindowOverlap::Intron => "Intron",
            WindowOverlap::ExonIntron => "Exon/Intron",
        }
    }
}

/// Anything that can be loaded as a guide table
pub trait Dataset {
    fn load(&self) -> PolarsResult<DataFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chemistry_is_validated_and_uppercased() {
        let chem = EditChemistry::new("c", "t").unwrap();
        assert_eq!(chem.prefix(), "CtoT");
        assert!(!chem.is_dual());

        assert!(EditChemistry::new("C", "TT").is_err());
        assert!(EditChemistry::new("CAT", "TGC").is_err());
        assert!(EditChemistry::new("X", "T").is_err());
        assert!(EditChemistry::new("", "").is_err());
    }

    #[test]
    fn antisense_chemistry_is_complemented() {
        let dual = EditChemistry::new("AC", "GT").unwrap();
        assert!(dual.is_dual());
        assert_eq!(dual.for_strand(Strand::Sense), vec![('A', 'G'), ('C', 'T')]);
        assert_eq!(dual.for_strand(Strand::Antisense), vec![('T', 'C'), ('G', 'A')]);
    }

    #[test]
    fn window_bounds_are_checked() {
        assert!(EditingWindow::new(4, 8, 20).is_ok());
        assert!(EditingWindow::new(0, 8, 20).is_err());
        assert!(EditingWindow::new(9, 8, 20).is_err());
        assert!(EditingWindow::new(4, 21, 20).is_err());
        assert_eq!(EditingWindow::new(20, 20, 20).unwrap().width(), 1);
    }

    #[test]
    fn window_gene_bounds_follow_strand() {
        let window = EditingWindow::new(4, 8, 20).unwrap();
        assert_eq!(window.gene_bounds(100, Strand::Sense), (103, 107));
        assert_eq!(window.gene_bounds(100, Strand::Antisense), (97, 93));
    }

    #[test]
    fn anchor_prefers_non_negative_gene_pos() {
        let mut guide = GuideRecord {
            gene_pos: Some(12),
            window_start: Some(15),
            ..GuideRecord::default()
        };
        assert_eq!(guide.anchor(), PositionAnchor::GenePos(12));
        guide.gene_pos = Some(-1);
        assert_eq!(guide.anchor(), PositionAnchor::WindowStart(15));
        guide.window_start = None;
        assert_eq!(guide.anchor(), PositionAnchor::Unanchored);
    }

    #[test]
    fn strand_parsing() {
        assert_eq!("sense".parse::<Strand>().unwrap(), Strand::Sense);
        assert_eq!(" antisense".parse::<Strand>().unwrap(), Strand::Antisense);
        assert!("+".parse::<Strand>().is_err());
    }

    #[test]
    fn mut_type_labels_sort_alphabetically_by_label() {
        let mut labels = vec![MutType::Silent.label(), MutType::Missense.label(), MutType::Nonsense.label()];
        labels.sort();
        assert_eq!(labels, vec!["Missense", "Nonsense", "Silent"]);
    }
}
