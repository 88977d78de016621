//! Maps a guide's editing window onto the coding strand.
//!
//! Everything here works in coding orientation: the protospacer itself for
//! sense guides, its reverse complement for antisense guides. Coding index `j`
//! counts from the 5' end of that sequence, so gene coordinates always grow
//! with `j` whatever the guide strand.

use crate::error::{AnnotatorError, Result};
use crate::gene::Locus;
use crate::genomic::{dna_to_aa, rev_complement};
use crate::models::{EditingWindow, PositionAnchor, Strand, WindowOverlap};

/// Placeholder for bases outside the protospacer that no gene model supplies
const UNKNOWN_BASE: char = 'n';

#[derive(Debug, Clone, PartialEq)]
pub struct CodingWindow {
    pub coding_seq: String,
    pub strand: Strand,
    /// First coding index of the editing window
    pub start: usize,
    /// Last coding index of the editing window, inclusive
    pub end: usize,
    /// Reading frame of coding index 0, when the guide has a frame
    phase0: Option<i64>,
    /// Gene coordinate of coding index 0, when the guide is anchored
    origin: Option<i64>,
}

/// Frame-aligned stretch of coding sequence around the editing window
#[derive(Debug, Clone, PartialEq)]
pub struct CodonWindow {
    /// Coding index of the first base; may fall outside the protospacer
    pub start: i64,
    pub dna: String,
    pub residues: String,
    /// Offset of the editing window inside `dna`
    pub target_offset: usize,
    pub target_len: usize,
    /// Gene coordinate of `dna[0]`
    pub origin: Option<i64>,
}

impl CodonWindow {
    pub fn target_range(&self) -> std::ops::Range<usize> {
        self.target_offset..self.target_offset + self.target_len
    }
}

/// Gene coordinate of coding index 0 for each of the four anchor cases.
pub fn coding_origin(
    anchor: PositionAnchor,
    strand: Strand,
    window: EditingWindow,
    guide_len: usize,
) -> Option<i64> {
    let lo = window.start as i64;
    let last = guide_len as i64 - 1;
    match (anchor, strand) {
        (PositionAnchor::GenePos(p), Strand::Sense) => Some(p),
        (PositionAnchor::GenePos(p), Strand::Antisense) => Some(p - last),
        (PositionAnchor::WindowStart(w), Strand::Sense) => Some(w - (lo - 1)),
        (PositionAnchor::WindowStart(w), Strand::Antisense) => Some(w + (lo - 1) - last),
        (PositionAnchor::Unanchored, _) => None,
    }
}

/// Editing window as inclusive coding indices.
pub fn coding_range(window: EditingWindow, strand: Strand, guide_len: usize) -> (usize, usize) {
    match strand {
        Strand::Sense => (window.start - 1, window.end - 1),
        Strand::Antisense => (guide_len - window.end, guide_len - window.start),
    }
}

impl CodingWindow {
    /// # Arguments
    ///
    /// * `sgrna_seq` - protospacer in guide orientation, case marking exon vs intron
    /// * `frame` - reading frame of the guide's first base
    /// * `anchor` - gene position source, see [`coding_origin`]
    pub fn resolve(
        sgrna_seq: &str,
        strand: Strand,
        window: EditingWindow,
        frame: Option<i64>,
        anchor: PositionAnchor,
    ) -> Result<Self> {
        let guide_len = sgrna_seq.len();
        if guide_len < window.end {
            return Err(AnnotatorError::InvalidSequence(format!(
                "guide `{}` is shorter than the editing window end {}",
                sgrna_seq, window.end
            )));
        }
        let coding_seq = match strand {
            Strand::Sense if sgrna_seq.bytes().all(|b| b"ACGTNacgtn".contains(&b)) => {
                sgrna_seq.to_string()
            }
            Strand::Sense => return Err(AnnotatorError::InvalidSequence(sgrna_seq.to_string())),
            Strand::Antisense => rev_complement(sgrna_seq)?,
        };
        let (start, end) = coding_range(window, strand, guide_len);
        let last = guide_len as i64 - 1;
        let phase0 = frame.map(|f| match strand {
            Strand::Sense => f.rem_euclid(3),
            Strand::Antisense => (f - last).rem_euclid(3),
        });
        Ok(CodingWindow {
            coding_seq,
            strand,
            start,
            end,
            phase0,
            origin: coding_origin(anchor, strand, window, guide_len),
        })
    }

    pub fn guide_len(&self) -> usize {
        self.coding_seq.len()
    }

    /// Window bases on the coding strand, `None` when none of them is exonic
    pub fn target_cds(&self) -> Option<&str> {
        let target = &self.coding_seq[self.start..=self.end];
        if target.bytes().any(|b| b.is_ascii_uppercase()) {
            Some(target)
        } else {
            None
        }
    }

    pub fn overlap(&self) -> WindowOverlap {
        let target = &self.coding_seq[self.start..=self.end];
        let upper = target.bytes().any(|b| b.is_ascii_uppercase());
        let lower = target.bytes().any(|b| b.is_ascii_lowercase());
        match (upper, lower) {
            (true, false) => WindowOverlap::Exon,
            (false, _) => WindowOverlap::Intron,
            (true, true) => WindowOverlap::ExonIntron,
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.origin.is_some()
    }

    pub fn gene_coord(&self, j: i64) -> Option<i64> {
        self.origin.map(|o| o + j)
    }

    pub fn phase(&self, j: i64) -> Option<i64> {
        self.phase0.map(|p| (p + j).rem_euclid(3))
    }

    /// 1-indexed residue containing coding index `j`
    pub fn protein_position(&self, j: i64) -> Option<i64> {
        self.gene_coord(j).map(|g| g.div_euclid(3) + 1)
    }

    /// Residue under the centre of the editing window
    pub fn centre_position(&self) -> Option<i64> {
        self.protein_position(((self.start + self.end) / 2) as i64)
    }

    /// Smallest frame-aligned run of whole codons containing the editing window.
    ///
    /// Bases past either end of the protospacer are read from `locus` when the
    /// guide is anchored and its record is known, otherwise they are `n`.
    /// Returns `None` when the window has no exonic base or the guide has no frame.
    pub fn codon_window(&self, locus: Option<&Locus>, exon: Option<usize>) -> Option<CodonWindow> {
        self.target_cds()?;
        let (a, b) = (self.start as i64, self.end as i64);
        let start = a - self.phase(a)?;
        let stop = b - self.phase(b)? + 3;
        let guide_len = self.guide_len() as i64;
        let bytes = self.coding_seq.as_bytes();

        let dna: String = (start..stop)
            .map(|j| {
                if (0..guide_len).contains(&j) {
                    bytes[j as usize] as char
                } else {
                    match (locus, exon, self.gene_coord(j)) {
                        (Some(locus), Some(exon), Some(g)) => {
                            locus.base_at(exon, g).unwrap_or(UNKNOWN_BASE)
                        }
                        _ => UNKNOWN_BASE,
                    }
                }
            })
            .collect();
        let residues = dna_to_aa(&dna, false).ok()?;

        Some(CodonWindow {
            start,
            residues,
            target_offset: (a - start) as usize,
            target_len: self.end - self.start + 1,
            origin: self.gene_coord(start),
            dna,
        })
    }
}
