use std::path::{Path, PathBuf};

use polars::prelude::*;
use regex::Regex;
use tracing::{debug, info};

use crate::config::{Domain, RunConfig, GUIDE_LENGTH};
use crate::error::Result;
use crate::gene::{CandidateGuide, Locus};
use crate::genomic::rev_complement;
use crate::helper_functions::{duplicated_mask, write_csv};
use crate::models::{EditChemistry, EditingWindow, Strand};

pub const NO_DOMAIN: &str = "No Domain";

/// Settings for turning a gene into a guide library
#[derive(Debug, Clone)]
pub struct LibraryOptions {
    pub gene_name: String,
    pub chemistry: EditChemistry,
    pub window: EditingWindow,
    pub pam: String,
    pub pam_regex: Regex,
    pub exclude_introns: bool,
    pub exclude_nontargeting: bool,
    pub excluded_motifs: Vec<String>,
    pub domains: Vec<Domain>,
    pub output: Option<PathBuf>,
}

impl LibraryOptions {
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let validated = config.validate()?;
        Ok(LibraryOptions {
            gene_name: config.gene_name.clone(),
            chemistry: validated.chemistry,
            window: validated.window,
            pam: validated.pam,
            pam_regex: validated.pam_regex,
            exclude_introns: config.exclude_introns,
            exclude_nontargeting: config.exclude_nontargeting,
            excluded_motifs: config.excluded_motifs.clone(),
            domains: config.domains.clone(),
            output: None,
        })
    }
}

/// Keeps a candidate when its PAM matches and, if required, its editing
/// window holds an editable base (exonic only when introns are excluded).
pub fn filter_guide(
    candidate: &CandidateGuide,
    pam_regex: &Regex,
    chemistry: &EditChemistry,
    window: EditingWindow,
    exclude_introns: bool,
    exclude_nontargeting: bool,
) -> bool {
    let (sgrna, pam) = candidate.split(GUIDE_LENGTH);
    if !pam_regex.is_match(pam) {
        return false;
    }
    if !exclude_nontargeting {
        return true;
    }
    let Some(bases) = sgrna.get(window.guide_range()) else {
        return false;
    };
    chemistry.edit_from.chars().any(|from| {
        if exclude_introns {
            bases.contains(from)
        } else {
            bases.contains(from) || bases.contains(from.to_ascii_lowercase())
        }
    })
}

/// Drops every candidate whose sequence appears more than once.
pub fn filter_repeats(candidates: Vec<CandidateGuide>) -> Vec<CandidateGuide> {
    let seqs: Vec<&str> = candidates.iter().map(|c| c.seq.as_str()).collect();
    let duplicated = duplicated_mask(&seqs);
    candidates
        .into_iter()
        .zip(duplicated)
        .filter(|(_, dup)| !dup)
        .map(|(c, _)| c)
        .collect()
}

/// Drops candidates whose protospacer contains any of `motifs`, ignoring case.
pub fn filter_motifs(candidates: Vec<CandidateGuide>, motifs: &[String]) -> Vec<CandidateGuide> {
    let motifs: Vec<String> = motifs.iter().map(|m| m.to_ascii_uppercase()).collect();
    candidates
        .into_iter()
        .filter(|c| {
            let (sgrna, _) = c.split(GUIDE_LENGTH);
            let sgrna = sgrna.to_ascii_uppercase();
            !motifs.iter().any(|m| !m.is_empty() && sgrna.contains(m.as_str()))
        })
        .collect()
}

/// Name of the first domain whose residue range holds `gene_pos`
fn domain_of(domains: &[Domain], gene_pos: i64) -> String {
    let residue = gene_pos.div_euclid(3) + 1;
    domains
        .iter()
        .find(|d| d.start <= residue && residue <= d.end)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| NO_DOMAIN.to_string())
}

/// Builds the library table from an already parsed locus.
pub fn library_frame(locus: &Locus, options: &LibraryOptions) -> Result<DataFrame> {
    let n = GUIDE_LENGTH + options.pam.len();
    let (forward, reverse): (Vec<CandidateGuide>, Vec<CandidateGuide>) = locus
        .candidate_guides(n)?
        .into_iter()
        .filter(|c| {
            filter_guide(
                c,
                &options.pam_regex,
                &options.chemistry,
                options.window,
                options.exclude_introns,
                options.exclude_nontargeting,
            )
        })
        .partition(|c| c.strand == Strand::Sense);
    debug!("{} forward and {} reverse candidates pass the PAM filter", forward.len(), reverse.len());

    let mut guides = filter_repeats(forward);
    guides.extend(filter_repeats(reverse));
    let guides = filter_motifs(guides, &options.excluded_motifs);

    // repeats across strands
    let sgrnas: Vec<&str> = guides.iter().map(|g| g.split(GUIDE_LENGTH).0).collect();
    let duplicated = duplicated_mask(&sgrnas);
    let guides: Vec<&CandidateGuide> = guides
        .iter()
        .zip(duplicated)
        .filter(|(_, dup)| !dup)
        .map(|(g, _)| g)
        .collect();

    let mut sgrna_seq = Vec::with_capacity(guides.len());
    let mut pam_seq = Vec::with_capacity(guides.len());
    let mut coding_seq = Vec::with_capacity(guides.len());
    let mut window_start = Vec::with_capacity(guides.len());
    let mut window_end = Vec::with_capacity(guides.len());
    let mut is_utr = Vec::with_capacity(guides.len());
    for g in &guides {
        let (sgrna, pam) = g.split(GUIDE_LENGTH);
        sgrna_seq.push(sgrna.to_string());
        pam_seq.push(pam.to_string());
        coding_seq.push(match g.strand {
            Strand::Sense => sgrna.to_string(),
            Strand::Antisense => rev_complement(sgrna)?,
        });
        let (start, end) = options.window.gene_bounds(g.gene_pos, g.strand);
        window_start.push(start);
        window_end.push(end);
        is_utr.push(locus.is_utr(g.exon, start, end));
    }

    let column = |name: &str| PlSmallStr::from(name);
    let df = DataFrame::new(vec![
        Series::new(column("sgRNA_seq"), sgrna_seq).into(),
        Series::new(column("PAM_seq"), pam_seq).into(),
        Series::new(column("starting_frame"), guides.iter().map(|g| g.frame).collect::<Vec<i64>>()).into(),
        Series::new(column("gene_pos"), guides.iter().map(|g| g.gene_pos).collect::<Vec<i64>>()).into(),
        Series::new(column("chr_pos"), guides.iter().map(|g| g.chr_pos).collect::<Vec<Option<i64>>>()).into(),
        Series::new(column("exon"), guides.iter().map(|g| g.exon as i64).collect::<Vec<i64>>()).into(),
        Series::new(column("coding_seq"), coding_seq).into(),
        Series::new(
            column("sgRNA_strand"),
            guides.iter().map(|g| g.strand.as_str()).collect::<Vec<&str>>(),
        )
        .into(),
        Series::new(column("gene_strand"), vec![locus.strand.as_str(); guides.len()]).into(),
        Series::new(column("gene"), vec![options.gene_name.as_str(); guides.len()]).into(),
        Series::new(
            column("domain"),
            guides
                .iter()
                .map(|g| domain_of(&options.domains, g.gene_pos))
                .collect::<Vec<String>>(),
        )
        .into(),
        Series::new(column("windowstart_pos"), window_start).into(),
        Series::new(column("windowend_pos"), window_end).into(),
        Series::new(column("is_UTR"), is_utr).into(),
    ])?;
    Ok(df)
}

/// Reads a gene FASTA and writes the filtered guide library when an output path is set.
pub fn generate_library(gene_fasta: &Path, options: &LibraryOptions) -> Result<DataFrame> {
    let locus = Locus::from_fasta(gene_fasta)?;
    let mut df = library_frame(&locus, options)?;
    info!("{} guides were generated for PAM {}", df.height(), options.pam);
    if let Some(output) = &options.output {
        write_csv(&mut df, output)?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomic::process_pam;
    use crate::helper_functions::{bool_column, int_column, string_column};

    fn candidate(seq: &str) -> CandidateGuide {
        CandidateGuide {
            seq: seq.to_string(),
            frame: 0,
            gene_pos: 0,
            chr_pos: None,
            exon: 0,
            strand: Strand::Sense,
        }
    }

    fn ct() -> EditChemistry {
        EditChemistry::new("C", "T").unwrap()
    }

    fn window() -> EditingWindow {
        EditingWindow::new(4, 8, 20).unwrap()
    }

    #[test]
    fn pam_and_editable_base_filters() {
        let ngg = process_pam("NGG").unwrap();
        let exonic = candidate("ATGCAAAAGGGTTTAAAGGGTGG");
        assert!(filter_guide(&exonic, &ngg, &ct(), window(), true, true));

        let wrong_pam = candidate("ATGCAAAAGGGTTTAAAGGGTGA");
        assert!(!filter_guide(&wrong_pam, &ngg, &ct(), window(), true, true));

        let intronic = candidate("ATGcAAAAGGGTTTAAAGGGTGG");
        assert!(!filter_guide(&intronic, &ngg, &ct(), window(), true, true));
        assert!(filter_guide(&intronic, &ngg, &ct(), window(), false, true));

        let no_c = candidate("ATGAAAAAGGGTTTAAAGGGTGG");
        assert!(!filter_guide(&no_c, &ngg, &ct(), window(), true, true));
        assert!(filter_guide(&no_c, &ngg, &ct(), window(), true, false));
    }

    #[test]
    fn repeats_are_removed_entirely() {
        let kept = filter_repeats(vec![candidate("AAA"), candidate("CCC"), candidate("AAA")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].seq, "CCC");
    }

    #[test]
    fn motif_filter_ignores_case() {
        let kept = filter_motifs(
            vec![
                candidate("ACGttttACGTACGTACGTACAGG"),
                candidate("ACGTACGTACGTACGTACGTAGG"),
            ],
            &["TTTT".to_string()],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].seq, "ACGTACGTACGTACGTACGTAGG");
    }

    #[test]
    fn domains_are_residue_ranges() {
        let domains = vec![
            Domain { name: "N-term".to_string(), start: 1, end: 10 },
            Domain { name: "kinase".to_string(), start: 11, end: 40 },
        ];
        assert_eq!(domain_of(&domains, 0), "N-term");
        assert_eq!(domain_of(&domains, 30), "kinase");
        assert_eq!(domain_of(&domains, 120), NO_DOMAIN);
        assert_eq!(domain_of(&[], 0), NO_DOMAIN);
    }

    #[test]
    fn library_from_locus() {
        // one exon, 5 bp flanks; TGG follows the first 20 exon bases
        let fasta = ">chr7:1001-1036 strand=+\naaaatATGCCCAAACCCGATCGAAGTGGAAAcgtaa\n";
        let locus = Locus::parse(fasta).unwrap();
        let options = LibraryOptions {
            gene_name: "TEST".to_string(),
            chemistry: ct(),
            window: window(),
            pam: "NGG".to_string(),
            pam_regex: process_pam("NGG").unwrap(),
            exclude_introns: true,
            exclude_nontargeting: true,
            excluded_motifs: vec!["TTTT".to_string()],
            domains: Vec::new(),
            output: None,
        };
        let df = library_frame(&locus, &options).unwrap();
        assert_eq!(df.width(), 14);
        assert!(df.height() >= 1);

        let seqs = string_column(&df, "sgRNA_seq").unwrap();
        let strands = string_column(&df, "sgRNA_strand").unwrap();
        let row = seqs
            .iter()
            .position(|s| s.as_deref() == Some("ATGCCCAAACCCGATCGAAG"))
            .unwrap();
        assert_eq!(strands[row].as_deref(), Some("sense"));
        assert_eq!(int_column(&df, "gene_pos").unwrap()[row], Some(0));
        assert_eq!(int_column(&df, "chr_pos").unwrap()[row], Some(1006));
        assert_eq!(int_column(&df, "windowstart_pos").unwrap()[row], Some(3));
        assert_eq!(int_column(&df, "windowend_pos").unwrap()[row], Some(7));
        assert!(!bool_column(&df, "is_UTR").unwrap()[row]);
        assert_eq!(string_column(&df, "domain").unwrap()[row].as_deref(), Some(NO_DOMAIN));
        assert_eq!(string_column(&df, "gene").unwrap()[row].as_deref(), Some("TEST"));
    }
}
