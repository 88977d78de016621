use tracing::warn;

use crate::error::Result;
use crate::gene::Locus;
use crate::genomic::{ProteinReference, NONCODING, STOP};

use super::translate::translate_window;

/// Ordered, de-duplicated mutation sets reachable by one guide.
///
/// Each set is the `/`-joined list of residue changes caused by one edit
/// combination (e.g. `P2S/P2L`); an empty set is a combination that changes
/// bases without changing any residue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationCatalog {
    pub sets: Vec<String>,
}

/// `X<pos>Y` parsed back into its parts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MutationToken {
    pub from: char,
    pub position: i64,
    pub to: char,
}

impl MutationToken {
    pub fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        let from = chars.next()?;
        let to = chars.next_back()?;
        let position = chars.as_str().parse().ok()?;
        Some(MutationToken { from, position, to })
    }

    pub fn is_nonsense(&self) -> bool {
        self.to == STOP
    }
}

impl MutationCatalog {
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Non-empty sets joined with `;`, `None` when there are none
    pub fn mutations(&self) -> Option<String> {
        let sets: Vec<&str> = self
            .sets
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_str())
            .collect();
        if sets.is_empty() {
            None
        } else {
            Some(sets.join(";"))
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = MutationToken> + '_ {
        self.sets
            .iter()
            .flat_map(|set| set.split('/'))
            .filter_map(MutationToken::parse)
    }

    /// Mean nonsense position if any stop is gained, otherwise the mean of
    /// the distinct mutated positions.
    pub fn representative_position(&self) -> Option<f64> {
        let mut nonsense: Vec<i64> = self.tokens().filter(|t| t.is_nonsense()).map(|t| t.position).collect();
        let positions = if nonsense.is_empty() {
            let mut all: Vec<i64> = self.tokens().map(|t| t.position).collect();
            all.sort_unstable();
            all.dedup();
            all
        } else {
            nonsense.sort_unstable();
            nonsense.dedup();
            nonsense
        };
        if positions.is_empty() {
            return None;
        }
        Some(positions.iter().sum::<i64>() as f64 / positions.len() as f64)
    }
}

/// Diffs edited codon windows against the original one.
pub struct MutationFormatter<'a> {
    /// Gene coordinate of the first base of every window
    pub origin: i64,
    pub locus: Option<&'a Locus>,
    pub protein: Option<&'a ProteinReference>,
}

impl MutationFormatter<'_> {
    fn codon_position(&self, codon: usize) -> i64 {
        (self.origin + 3 * codon as i64).div_euclid(3) + 1
    }

    /// Warns for every translated residue that disagrees with the reference protein.
    fn check_reference(&self, residues: &str, guide: &str) {
        let Some(protein) = self.protein else { return };
        for (i, aa) in residues.chars().enumerate() {
            if aa == NONCODING {
                continue;
            }
            let position = self.codon_position(i);
            match protein.residue(position) {
                Some(expected) if expected != aa => warn!(
                    "Guide {}: residue {} translates to {} but the reference protein has {}",
                    guide, position, aa, expected
                ),
                None => warn!(
                    "Guide {}: residue {} is outside the reference protein ({} aa)",
                    guide, position, protein.len()
                ),
                _ => {}
            }
        }
    }

    /// # Arguments
    ///
    /// * `original` - unedited codon window
    /// * `combinations` - every enumerated window; entries equal to `original` are skipped
    /// * `guide` - guide sequence, used in warnings only
    pub fn catalog(&self, original: &str, combinations: &[String], guide: &str) -> Result<MutationCatalog> {
        let origin = Some(self.origin);
        let (orig_dna, orig_aa) = translate_window(original, origin, self.locus)?;
        self.check_reference(&orig_aa, guide);
        let orig_codons: Vec<&[u8]> = orig_dna.as_bytes().chunks(3).collect();
        let orig_aa: Vec<char> = orig_aa.chars().collect();

        let mut catalog = MutationCatalog::default();
        for combination in combinations.iter().filter(|c| c.as_str() != original) {
            let (mut_dna, mut_aa) = translate_window(combination, origin, self.locus)?;
            let mut tokens: Vec<String> = Vec::new();
            // an edit that only touches unreadable codons has no known effect
            let mut readable = false;
            for (i, (mut_codon, mut_residue)) in mut_dna.as_bytes().chunks(3).zip(mut_aa.chars()).enumerate() {
                let (orig_codon, orig_residue) = (orig_codons[i], orig_aa[i]);
                if orig_codon.eq_ignore_ascii_case(mut_codon)
                    || orig_residue == NONCODING
                    || mut_residue == NONCODING
                {
                    continue;
                }
                readable = true;
                if orig_residue == mut_residue {
                    continue;
                }
                let token = format!("{}{}{}", orig_residue, self.codon_position(i), mut_residue);
                if !tokens.contains(&token) {
                    tokens.push(token);
                }
            }
            let set = tokens.join("/");
            if readable && !catalog.sets.contains(&set) {
                catalog.sets.push(set);
            }
        }
        Ok(catalog)
    }
}
