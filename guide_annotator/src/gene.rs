//! Gene model read from an exon FASTA.
//!
//! Each record holds one exon in UPPERCASE flanked by the same number of
//! lowercase intron bases on both sides. Gene positions are 0-indexed CDS
//! coordinates; flank bases continue the numbering of their exon, so the
//! upstream flank of the first exon has negative positions.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{AnnotatorError, Result};
use crate::genomic::{dna_to_aa, rev_complement, ProteinReference, STOP};
use crate::models::{GeneStrand, Strand};

#[derive(Debug, Clone, PartialEq)]
pub struct Exon {
    pub index: usize,
    /// Record as written, flanks included
    pub raw: String,
    /// CDS coordinate of the first exon base
    pub cds_offset: i64,
    pub exon_len: usize,
    pub genomic_start: Option<i64>,
    pub genomic_end: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Locus {
    pub chrom: Option<String>,
    pub strand: GeneStrand,
    /// Intron bases on each side of every exon
    pub flank: usize,
    pub exons: Vec<Exon>,
}

/// One length-`n` slice of the locus on either strand, PAM included
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGuide {
    pub seq: String,
    /// Reading frame (0, 1, 2) of the first base
    pub frame: i64,
    pub gene_pos: i64,
    pub chr_pos: Option<i64>,
    pub exon: usize,
    pub strand: Strand,
}

impl CandidateGuide {
    /// Protospacer and PAM of the candidate
    pub fn split(&self, guide_len: usize) -> (&str, &str) {
        self.seq.split_at(guide_len.min(self.seq.len()))
    }
}

struct Header {
    chrom: Option<String>,
    start: Option<i64>,
    end: Option<i64>,
    strand: Option<GeneStrand>,
}

fn parse_header(header: &str, range_re: &Regex, strand_re: &Regex) -> Header {
    let range = range_re.captures(header);
    let strand = strand_re
        .captures(header)
        .map(|c| if &c[1] == "-" { GeneStrand::Minus } else { GeneStrand::Plus });
    Header {
        chrom: range.as_ref().map(|c| c[1].to_string()),
        start: range.as_ref().and_then(|c| c[2].parse().ok()),
        end: range.as_ref().and_then(|c| c[3].parse().ok()),
        strand,
    }
}

/// Lowercase bases before and after the uppercase exon.
fn flank_lengths(raw: &str, exon: usize) -> Result<(usize, usize)> {
    let bytes = raw.as_bytes();
    let first = bytes.iter().position(|b| b.is_ascii_uppercase());
    let last = bytes.iter().rposition(|b| b.is_ascii_uppercase());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => {
            return Err(AnnotatorError::InvalidSequence(format!(
                "record {} has no uppercase exon bases",
                exon
            )))
        }
    };
    if bytes[first..=last].iter().any(|b| b.is_ascii_lowercase()) {
        return Err(AnnotatorError::InvalidSequence(format!(
            "record {} has lowercase bases inside its exon",
            exon
        )));
    }
    Ok((first, bytes.len() - last - 1))
}

impl Locus {
    pub fn from_fasta(path: &Path) -> Result<Self> {
        info!("Reading gene from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let range_re = Regex::new(r"(?:^|\s|range=)([A-Za-z0-9_.]+):(\d+)-(\d+)")
            .map_err(|e| AnnotatorError::InvalidConfig(e.to_string()))?;
        let strand_re = Regex::new(r"strand=([+-])")
            .map_err(|e| AnnotatorError::InvalidConfig(e.to_string()))?;

        let mut records: Vec<(String, String)> = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if let Some(header) = line.strip_prefix('>') {
                records.push((header.to_string(), String::new()));
            } else if let Some((_, seq)) = records.last_mut() {
                seq.push_str(line);
            }
        }

        let mut locus = Locus::default();
        let mut cds_offset = 0i64;
        for (index, (header, raw)) in records.into_iter().enumerate() {
            if !raw.bytes().all(|b| b"ACGTNacgtn".contains(&b)) {
                return Err(AnnotatorError::InvalidSequence(format!(
                    "record {} contains characters other than ACGTN",
                    index
                )));
            }
            let (upstream, downstream) = flank_lengths(&raw, index)?;
            if upstream != downstream {
                return Err(AnnotatorError::InconsistentFlank {
                    exon: index,
                    expected: upstream,
                    found: downstream,
                });
            }
            if index == 0 {
                locus.flank = upstream;
            } else if upstream != locus.flank {
                return Err(AnnotatorError::InconsistentFlank {
                    exon: index,
                    expected: locus.flank,
                    found: upstream,
                });
            }

            let header = parse_header(&header, &range_re, &strand_re);
            if locus.chrom.is_none() {
                locus.chrom = header.chrom;
            }
            if let Some(strand) = header.strand {
                if index == 0 {
                    locus.strand = strand;
                }
            }

            let exon_len = raw.len() - 2 * upstream;
            debug!("Exon {}: {} bp, CDS offset {}", index, exon_len, cds_offset);
            locus.exons.push(Exon {
                index,
                raw,
                cds_offset,
                exon_len,
                genomic_start: header.start,
                genomic_end: header.end,
            });
            cds_offset += exon_len as i64;
        }
        info!(
            "Parsed {} exons, {} coding bases, {} bp flanks",
            locus.exons.len(),
            locus.cds_len(),
            locus.flank
        );
        Ok(locus)
    }

    /// Spliced coding sequence
    pub fn cds(&self) -> String {
        let f = self.flank;
        self.exons
            .iter()
            .map(|e| &e.raw[f..f + e.exon_len])
            .collect()
    }

    /// Translation of the spliced CDS; bases past the last whole codon are ignored
    pub fn translate(&self) -> Result<String> {
        let cds = self.cds();
        let whole = cds.len() - cds.len() % 3;
        dna_to_aa(&cds[..whole], true)
    }

    /// Checks the translated CDS against a reference protein, final stop
    /// codon excluded. Disagreements are logged, not raised.
    pub fn matches_protein(&self, protein: &ProteinReference) -> Result<bool> {
        let translated = self.translate()?;
        let translated = translated.strip_suffix(STOP).unwrap_or(&translated);
        let mismatch = translated.chars().enumerate().find(|&(i, aa)| {
            protein.residue(i as i64 + 1).map(|r| r.to_ascii_uppercase()) != Some(aa)
        });
        if let Some((i, aa)) = mismatch {
            warn!(
                "Gene translates to {} at residue {} but the protein has {}",
                aa,
                i + 1,
                protein.residue(i as i64 + 1).unwrap_or('-')
            );
            return Ok(false);
        }
        if translated.len() != protein.len() {
            warn!(
                "Gene translates to {} residues but the protein has {}",
                translated.len(),
                protein.len()
            );
            return Ok(false);
        }
        info!("Gene translation matches the {} aa protein", protein.len());
        Ok(true)
    }

    pub fn cds_len(&self) -> usize {
        self.exons.iter().map(|e| e.exon_len).sum()
    }

    /// Base of the spliced CDS at a gene position
    pub fn cds_base(&self, gene_pos: i64) -> Option<char> {
        let exon = self
            .exons
            .iter()
            .find(|e| gene_pos >= e.cds_offset && gene_pos < e.cds_offset + e.exon_len as i64)?;
        self.base_at(exon.index, gene_pos)
    }

    /// Raw base of record `exon` at a gene position, flanks included
    pub fn base_at(&self, exon: usize, gene_pos: i64) -> Option<char> {
        let record = self.exons.get(exon)?;
        let idx = gene_pos - record.cds_offset + self.flank as i64;
        if idx < 0 {
            return None;
        }
        record.raw.as_bytes().get(idx as usize).map(|&b| b as char)
    }

    /// Genomic coordinate of a raw index within a record
    pub fn chr_pos(&self, exon: usize, raw_index: usize) -> Option<i64> {
        let record = self.exons.get(exon)?;
        match self.strand {
            GeneStrand::Plus => record.genomic_start.map(|s| s + raw_index as i64),
            GeneStrand::Minus => record.genomic_end.map(|e| e - raw_index as i64),
        }
    }

    /// True when gene positions `[lo, hi]` reach into the 5' flank of the first
    /// exon or the 3' flank of the last one.
    pub fn is_utr(&self, exon: usize, lo: i64, hi: i64) -> bool {
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let last = self.exons.len().saturating_sub(1);
        (exon == 0 && lo < 0) || (exon == last && hi >= self.cds_len() as i64)
    }

    /// Every length-`n` slice of every record, forward strand first, then the
    /// reverse complements in the same order.
    pub fn candidate_guides(&self, n: usize) -> Result<Vec<CandidateGuide>> {
        let mut forward = Vec::new();
        let mut reverse = Vec::new();
        for exon in &self.exons {
            if exon.raw.len() < n || n == 0 {
                continue;
            }
            for ind in 0..=exon.raw.len() - n {
                let seq = &exon.raw[ind..ind + n];
                let gene_pos = exon.cds_offset + ind as i64 - self.flank as i64;
                forward.push(CandidateGuide {
                    seq: seq.to_string(),
                    frame: gene_pos.rem_euclid(3),
                    gene_pos,
                    chr_pos: self.chr_pos(exon.index, ind),
                    exon: exon.index,
                    strand: Strand::Sense,
                });
                let rev_pos = gene_pos + n as i64 - 1;
                reverse.push(CandidateGuide {
                    seq: rev_complement(seq)?,
                    frame: rev_pos.rem_euclid(3),
                    gene_pos: rev_pos,
                    chr_pos: self.chr_pos(exon.index, ind + n - 1),
                    exon: exon.index,
                    strand: Strand::Antisense,
                });
            }
        }
        debug!("{} forward and {} reverse candidates", forward.len(), reverse.len());
        forward.extend(reverse);
        Ok(forward)
    }
}
