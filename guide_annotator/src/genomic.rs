use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use tracing::debug;

use crate::error::{AnnotatorError, Result};

/// Amino acids for every codon, indexed by `16*b1 + 4*b2 + b3` with A=0, C=1, G=2, T=3.
/// Stop codons translate to `.`.
const CODON_TABLE: &[u8; 64] =
    b"KNKNTTTTRSRSIIMIQHQHPPPPRRRRLLLLEDEDAAAAGGGGVVVV.Y.YSSSS.CWCLFLF";

/// Residue written for codons that cannot be translated (intronic or unknown bases)
pub const NONCODING: char = '_';

/// Residue written for stop codons
pub const STOP: char = '.';

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Translates a single codon. Only uppercase `ACGT` codons translate;
/// anything else (lowercase intron bases, `n` padding) yields `None`.
pub fn translate_codon(codon: &[u8]) -> Option<char> {
    if codon.len() != 3 {
        return None;
    }
    let idx = base_index(codon[0])? * 16 + base_index(codon[1])? * 4 + base_index(codon[2])?;
    Some(CODON_TABLE[idx] as char)
}

/// Complement of one base, preserving case.
pub fn complement_base(base: char) -> Option<char> {
    match base {
        'A' => Some('T'),
        'T' => Some('A'),
        'G' => Some('C'),
        'C' => Some('G'),
        'a' => Some('t'),
        't' => Some('a'),
        'g' => Some('c'),
        'c' => Some('g'),
        'n' => Some('n'),
        'N' => Some('N'),
        _ => None,
    }
}

pub fn complement(seq: &str) -> Result<String> {
    seq.chars()
        .map(complement_base)
        .collect::<Option<String>>()
        .ok_or_else(|| AnnotatorError::InvalidSequence(seq.to_string()))
}

/// Reverse complement of a mixed-case DNA sequence. Case marks exon vs intron
/// and is carried through unchanged.
pub fn rev_complement(seq: &str) -> Result<String> {
    seq.chars()
        .rev()
        .map(complement_base)
        .collect::<Option<String>>()
        .ok_or_else(|| AnnotatorError::InvalidSequence(seq.to_string()))
}

/// Translates a DNA sequence into residues.
///
/// # Arguments
///
/// * `seq` - DNA whose length is a multiple of 3
/// * `upper` - uppercase every codon before translating; when false, codons
///   holding any lowercase base become [`NONCODING`]
pub fn dna_to_aa(seq: &str, upper: bool) -> Result<String> {
    if seq.len() % 3 != 0 || !seq.bytes().all(|b| b"ACGTNacgtn".contains(&b)) {
        return Err(AnnotatorError::InvalidSequence(seq.to_string()));
    }
    let residues = seq
        .as_bytes()
        .chunks(3)
        .map(|codon| {
            if upper {
                translate_codon(&codon.to_ascii_uppercase()).unwrap_or(NONCODING)
            } else {
                translate_codon(codon).unwrap_or(NONCODING)
            }
        })
        .collect();
    Ok(residues)
}

/// Cas enzymes with a predetermined PAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasType {
    Sp,
    SpG,
    SpRY,
    SpRYHighEfficiency,
    SpRYLowEfficiency,
}

impl CasType {
    pub const ALL: [CasType; 5] = [
        CasType::Sp,
        CasType::SpG,
        CasType::SpRY,
        CasType::SpRYHighEfficiency,
        CasType::SpRYLowEfficiency,
    ];

    pub fn pam(&self) -> &'static str {
        match self {
            CasType::Sp => "NGG",
            CasType::SpG => "NGN",
            CasType::SpRY => "NNN",
            CasType::SpRYHighEfficiency => "NRN",
            CasType::SpRYLowEfficiency => "NYN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CasType::Sp => "Sp",
            CasType::SpG => "SpG",
            CasType::SpRY => "SpRY",
            CasType::SpRYHighEfficiency => "SpRY_highefficiency",
            CasType::SpRYLowEfficiency => "SpRY_lowefficiency",
        }
    }
}

impl fmt::Display for CasType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CasType {
    type Err = AnnotatorError;

    fn from_str(s: &str) -> Result<Self> {
        CasType::ALL
            .iter()
            .find(|cas| cas.name() == s)
            .copied()
            .ok_or_else(|| {
                let options: Vec<&str> = CasType::ALL.iter().map(|c| c.name()).collect();
                AnnotatorError::InvalidConfig(format!(
                    "improper cas type `{}`, the options are {:?}",
                    s, options
                ))
            })
    }
}

/// Compiles a PAM written with `ACGTRYN` into an anchored, case-insensitive regex.
pub fn process_pam(pam: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(pam.len() * 12);
    for base in pam.chars() {
        let class = match base.to_ascii_uppercase() {
            'G' => "[gG]{1}",
            'C' => "[cC]{1}",
            'T' => "[tT]{1}",
            'A' => "[aA]{1}",
            'Y' => "[cCtT]{1}",
            'R' => "[aAgG]{1}",
            'N' => "[acgtACGT]{1}",
            _ => {
                return Err(AnnotatorError::InvalidConfig(format!(
                    "PAM `{}` may only contain ACGTRYN",
                    pam
                )))
            }
        };
        pattern.push_str(class);
    }
    debug!("PAM {} compiled to {}", pam, pattern);
    Regex::new(&format!("^({})$", pattern))
        .map_err(|e| AnnotatorError::InvalidConfig(format!("PAM `{}`: {}", pam, e)))
}

/// Reference protein used to cross-check annotated residues.
///
/// Positions are 1-indexed; the position right after the last residue reads
/// as a stop so mutations of the terminal codon can be checked too.
#[derive(Debug, Clone, PartialEq)]
pub struct ProteinReference {
    residues: Vec<char>,
}

impl ProteinReference {
    pub fn from_fasta(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Reads the first record of a protein FASTA.
    pub fn parse(content: &str) -> Self {
        let mut residues = Vec::new();
        let mut seen_header = false;
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('>') {
                if seen_header {
                    break;
                }
                seen_header = true;
                continue;
            }
            residues.extend(line.chars());
        }
        ProteinReference { residues }
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn residue(&self, position: i64) -> Option<char> {
        if position < 1 {
            return None;
        }
        let idx = (position - 1) as usize;
        match idx.cmp(&self.residues.len()) {
            std::cmp::Ordering::Less => Some(self.residues[idx]),
            std::cmp::Ordering::Equal => Some(STOP),
            std::cmp::Ordering::Greater => None,
        }
    }
}
