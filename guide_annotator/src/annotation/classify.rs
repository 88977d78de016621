use regex::Regex;

use crate::error::{AnnotatorError, Result};
use crate::models::MutType;

use super::mutations::MutationCatalog;
use super::window::CodingWindow;

/// Canonical splice dinucleotides as they read on the coding strand: the
/// donor `gt` right after an exon's last base, the acceptor `ag` right
/// before an exon's first base.
#[derive(Debug, Clone)]
pub struct SpliceMotifs {
    donor: Regex,
    acceptor: Regex,
}

impl SpliceMotifs {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| AnnotatorError::InvalidConfig(e.to_string()))
        };
        Ok(SpliceMotifs {
            donor: compile("[ACGT]gt")?,
            acceptor: compile("ag[ACGT]")?,
        })
    }

    /// Coding indices of intact acceptor dinucleotides
    fn acceptor_sites(&self, coding_seq: &str) -> Vec<usize> {
        self.acceptor.find_iter(coding_seq).map(|m| m.start()).collect()
    }

    /// Coding indices of intact donor dinucleotides
    fn donor_sites(&self, coding_seq: &str) -> Vec<usize> {
        self.donor.find_iter(coding_seq).map(|m| m.start() + 1).collect()
    }
}

/// Checks whether the guide can destroy a splice dinucleotide.
///
/// A site counts when one of its two bases lies in the editing window and is
/// an editable base for the chemistry on the coding strand. For anchored
/// guides the junction must be internal: acceptors upstream of the first
/// exon and donors downstream of the last (when the CDS length is known)
/// are transcript ends, not splice sites. Acceptors are checked first.
///
/// # Arguments
///
/// * `coding_from` - edit_from bases in coding orientation
/// * `cds_len` - spliced CDS length, when a gene model is loaded
pub fn splice_site(
    coding: &CodingWindow,
    coding_from: &[char],
    motifs: &SpliceMotifs,
    cds_len: Option<usize>,
) -> Option<MutType> {
    let bytes = coding.coding_seq.as_bytes();
    let editable = |pos: usize| {
        (coding.start..=coding.end).contains(&pos)
            && coding_from
                .iter()
                .any(|from| from.to_ascii_lowercase() as u8 == bytes[pos])
    };
    let hit = |site: usize| editable(site) || editable(site + 1);

    let acceptor = motifs.acceptor_sites(&coding.coding_seq).into_iter().any(|site| {
        hit(site) && coding.gene_coord(site as i64).map_or(true, |g| g >= 0)
    });
    if acceptor {
        return Some(MutType::SpliceAcceptor);
    }
    let donor = motifs.donor_sites(&coding.coding_seq).into_iter().any(|site| {
        hit(site)
            && match (coding.gene_coord(site as i64), cds_len) {
                (Some(g), Some(len)) => g < len as i64,
                _ => true,
            }
    });
    if donor {
        return Some(MutType::SpliceDonor);
    }
    None
}

/// Label of a single mutation set
pub fn set_label(set: &str) -> MutType {
    if set.is_empty() {
        MutType::Silent
    } else if set.split('/').any(|token| token.ends_with('.')) {
        MutType::Nonsense
    } else {
        MutType::Missense
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Every label the guide reaches, sorted by label
    pub muttypes: Vec<MutType>,
    pub muttype: MutType,
}

impl Classification {
    pub fn muttypes_column(&self) -> String {
        self.muttypes
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Picks one label per guide, first match wins: splice site, nonsense,
/// missense, silent, then UTR/intron when the raw window holds a lowercase
/// editable base, else no mutation.
pub fn classify(
    catalog: &MutationCatalog,
    splice: Option<MutType>,
    intronic_edit: bool,
    is_utr: bool,
) -> Classification {
    let mut muttypes: Vec<MutType> = catalog.sets.iter().map(|s| set_label(s)).collect();

    let muttype = if let Some(splice) = splice {
        splice
    } else if muttypes.contains(&MutType::Nonsense) {
        MutType::Nonsense
    } else if muttypes.contains(&MutType::Missense) {
        MutType::Missense
    } else if muttypes.contains(&MutType::Silent) {
        MutType::Silent
    } else if intronic_edit && is_utr {
        MutType::Utr
    } else if intronic_edit {
        MutType::Intron
    } else {
        MutType::NoMutation
    };

    muttypes.push(muttype);
    muttypes.sort_by_key(|t| t.label());
    muttypes.dedup();
    Classification { muttypes, muttype }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EditingWindow, PositionAnchor, Strand};

    fn catalog(sets: &[&str]) -> MutationCatalog {
        MutationCatalog {
            sets: sets.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn resolve(seq: &str, strand: Strand, anchor: PositionAnchor) -> CodingWindow {
        let window = EditingWindow::new(4, 8, 20).unwrap();
        CodingWindow::resolve(seq, strand, window, Some(0), anchor).unwrap()
    }

    #[test]
    fn priority_order() {
        assert_eq!(classify(&catalog(&["P2L", "Q3."]), None, false, false).muttype, MutType::Nonsense);
        assert_eq!(classify(&catalog(&["P2L", ""]), None, false, false).muttype, MutType::Missense);
        assert_eq!(classify(&catalog(&[""]), None, true, true).muttype, MutType::Silent);
        assert_eq!(classify(&catalog(&[]), None, true, true).muttype, MutType::Utr);
        assert_eq!(classify(&catalog(&[]), None, true, false).muttype, MutType::Intron);
        assert_eq!(classify(&catalog(&[]), None, false, false).muttype, MutType::NoMutation);
        assert_eq!(
            classify(&catalog(&["Q3."]), Some(MutType::SpliceDonor), false, false).muttype,
            MutType::SpliceDonor
        );
    }

    #[test]
    fn muttypes_are_sorted_and_unique() {
        let result = classify(&catalog(&["", "Q3./P2L", "P2L", "P2S"]), None, false, false);
        assert_eq!(result.muttypes_column(), "Missense;Nonsense;Silent");
        let none = classify(&catalog(&[]), None, false, false);
        assert_eq!(none.muttypes_column(), "No Mutation");
    }

    #[test]
    fn donor_reached_by_coding_strand_edits() {
        // coding strand: exon ends at index 5, donor gt at 6..=7 falls in the window 3..=7
        let coding = resolve("ATGCCAgtaagtcatcgatc", Strand::Sense, PositionAnchor::GenePos(0));
        let motifs = SpliceMotifs::new().unwrap();
        // sense C->T can't touch g or t
        assert_eq!(splice_site(&coding, &['C'], &motifs, None), None);
        // A->G on the antisense strand reads as T->C on the coding strand
        assert_eq!(splice_site(&coding, &['T'], &motifs, None), Some(MutType::SpliceDonor));
        // the last exon's end is not a splice donor
        assert_eq!(splice_site(&coding, &['T'], &motifs, Some(6)), None);
        assert_eq!(splice_site(&coding, &['G'], &motifs, Some(100)), Some(MutType::SpliceDonor));
    }

    #[test]
    fn acceptor_needs_an_internal_junction() {
        let motifs = SpliceMotifs::new().unwrap();
        // acceptor ag at 5..=6, exon starts at 7
        let seq = "tttctagGCCATGAAACCCG";
        let internal = resolve(seq, Strand::Sense, PositionAnchor::GenePos(40));
        assert_eq!(splice_site(&internal, &['A'], &motifs, None), Some(MutType::SpliceAcceptor));
        assert_eq!(splice_site(&internal, &['G'], &motifs, None), Some(MutType::SpliceAcceptor));
        assert_eq!(splice_site(&internal, &['C'], &motifs, None), None);

        // same sequence in front of the first exon
        let first_exon = resolve(seq, Strand::Sense, PositionAnchor::GenePos(-7));
        assert_eq!(splice_site(&first_exon, &['A'], &motifs, None), None);

        // unanchored guides only need the motif
        let control = resolve(seq, Strand::Sense, PositionAnchor::Unanchored);
        assert_eq!(splice_site(&control, &['A'], &motifs, None), Some(MutType::SpliceAcceptor));
    }

    #[test]
    fn motif_outside_the_window_is_ignored() {
        let motifs = SpliceMotifs::new().unwrap();
        let coding = resolve("ATGCCATGGCAAAGgtaagt", Strand::Sense, PositionAnchor::GenePos(0));
        assert_eq!(splice_site(&coding, &['G', 'T'], &motifs, None), None);
    }
}
