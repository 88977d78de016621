//! Base-editing outcome annotation.
//!
//! For every guide the editing window is mapped onto the coding strand, every
//! combination of edits inside it is enumerated and translated, and the
//! resulting residue changes are written back as columns prefixed with the
//! chemistry, e.g. `CtoT_mutations`.

pub mod classify;
pub mod combinations;
pub mod mutations;
pub mod translate;
pub mod window;

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ColumnNames, RunConfig, GUIDE_ID_COLUMN, GUIDE_LENGTH};
use crate::data_handling::guide_table::{records, required_columns, GuideTable};
use crate::error::Result;
use crate::gene::Locus;
use crate::genomic::ProteinReference;
use crate::helper_functions::{
    duplicated_mask, filter_rows, has_column, require_columns, string_column, with_coding_seq, write_csv,
};
use crate::models::{Dataset, EditChemistry, EditingWindow, GuideRecord, MutType, PositionAnchor, Strand};

use classify::{classify, splice_site, SpliceMotifs};
use combinations::enumerate_edits;
use mutations::{MutationCatalog, MutationFormatter};
use window::CodingWindow;

pub use crate::config::CODING_SEQ_COLUMN;

/// Everything a single guide's annotation reads; shared across worker threads.
pub struct AnnotationContext<'a> {
    pub chemistry: &'a EditChemistry,
    pub window: EditingWindow,
    pub locus: Option<&'a Locus>,
    pub protein: Option<&'a ProteinReference>,
    motifs: SpliceMotifs,
}

impl<'a> AnnotationContext<'a> {
    pub fn new(
        chemistry: &'a EditChemistry,
        window: EditingWindow,
        locus: Option<&'a Locus>,
        protein: Option<&'a ProteinReference>,
    ) -> Result<Self> {
        Ok(AnnotationContext {
            chemistry,
            window,
            locus,
            protein,
            motifs: SpliceMotifs::new()?,
        })
    }

    fn cds_len(&self) -> Option<usize> {
        self.locus.map(|l| l.cds_len())
    }
}

/// Values appended to the guide table for one guide
#[derive(Debug, Clone, PartialEq)]
pub struct GuideAnnotation {
    pub win_overlap: Option<String>,
    pub edit_count: i64,
    pub mutations: Option<String>,
    pub muttypes: String,
    pub muttype: String,
    pub pos: Option<f64>,
}

impl GuideAnnotation {
    fn unannotated(edit_count: i64) -> Self {
        GuideAnnotation {
            win_overlap: None,
            edit_count,
            mutations: None,
            muttypes: MutType::NoMutation.label().to_string(),
            muttype: MutType::NoMutation.label().to_string(),
            pos: None,
        }
    }
}

/// Number of `edit_from` bases (exonic only) in the raw editing window
fn edit_count(guide: &GuideRecord, ctx: &AnnotationContext) -> i64 {
    let window = guide
        .sgrna_seq
        .get(ctx.window.guide_range())
        .unwrap_or_default();
    ctx.chemistry
        .edit_from
        .chars()
        .map(|from| window.matches(from).count() as i64)
        .sum()
}

/// Lowercase `edit_from` base in the raw editing window
fn has_intronic_edit(guide: &GuideRecord, ctx: &AnnotationContext) -> bool {
    let window = guide
        .sgrna_seq
        .get(ctx.window.guide_range())
        .unwrap_or_default();
    ctx.chemistry
        .edit_from
        .chars()
        .any(|from| window.contains(from.to_ascii_lowercase()))
}

/// Warns when the frame or window columns disagree with the chosen anchor.
fn check_anchors(guide: &GuideRecord, strand: Strand, window: EditingWindow) {
    let guide_len = guide.sgrna_seq.len() as i64;
    let first_base = match (guide.anchor(), strand) {
        (PositionAnchor::GenePos(p), _) => p,
        (PositionAnchor::WindowStart(w), Strand::Sense) => w - (window.start as i64 - 1),
        (PositionAnchor::WindowStart(w), Strand::Antisense) => w + (window.start as i64 - 1),
        (PositionAnchor::Unanchored, _) => return,
    };
    if let Some(frame) = guide.starting_frame {
        if first_base.rem_euclid(3) != frame {
            warn!(
                "Guide {}: starting frame {} does not match position {}",
                guide.sgrna_seq, frame, first_base
            );
        }
    }
    let (start, end) = window.gene_bounds(first_base, strand);
    let mismatch = |column: Option<i64>, expected: i64| column.map_or(false, |c| c != expected);
    if mismatch(guide.window_start, start) || mismatch(guide.window_end, end) {
        warn!(
            "Guide {}: window columns {:?}..{:?} disagree with position {} (expected {}..{})",
            guide.sgrna_seq, guide.window_start, guide.window_end, first_base, start, end
        );
    }
    if guide_len != GUIDE_LENGTH as i64 {
        debug!("Guide {} is {} nt long", guide.sgrna_seq, guide_len);
    }
}

/// True when the guide names an exon the loaded gene model does not have.
fn exon_out_of_range(guide: &GuideRecord, ctx: &AnnotationContext) -> bool {
    match (ctx.locus, guide.exon) {
        (Some(locus), Some(exon)) => exon >= locus.exons.len(),
        _ => false,
    }
}

/// Annotates one guide. Never fails: inconsistencies are logged and the
/// guide is passed through with whatever could be determined.
pub fn annotate_guide(guide: &GuideRecord, ctx: &AnnotationContext) -> GuideAnnotation {
    let count = edit_count(guide, ctx);
    let Some(strand) = guide.strand else {
        return GuideAnnotation::unannotated(count);
    };
    let coding = match CodingWindow::resolve(
        &guide.sgrna_seq,
        strand,
        ctx.window,
        guide.starting_frame,
        guide.anchor(),
    ) {
        Ok(coding) => coding,
        Err(e) => {
            warn!("Guide {} skipped: {}", guide.sgrna_seq, e);
            return GuideAnnotation::unannotated(count);
        }
    };
    check_anchors(guide, strand, ctx.window);
    if exon_out_of_range(guide, ctx) {
        warn!(
            "Guide {}: exon {} is not in the gene model ({} exons), codons are not extended",
            guide.sgrna_seq,
            guide.exon.unwrap_or_default(),
            ctx.locus.map_or(0, |l| l.exons.len())
        );
    }

    let pairs = ctx.chemistry.for_strand(strand);
    let coding_from: Vec<char> = pairs.iter().map(|(from, _)| *from).collect();
    let splice = splice_site(&coding, &coding_from, &ctx.motifs, ctx.cds_len());

    let mut catalog = MutationCatalog::default();
    if coding.target_cds().is_some() {
        match (coding.codon_window(ctx.locus, guide.exon), guide.starting_frame) {
            (Some(codons), _) => match codons.origin {
                Some(origin) => {
                    let combinations = enumerate_edits(&codons.dna, codons.target_range(), &pairs);
                    let formatter = MutationFormatter {
                        origin,
                        locus: ctx.locus,
                        protein: ctx.protein,
                    };
                    match formatter.catalog(&codons.dna, &combinations, &guide.sgrna_seq) {
                        Ok(found) => catalog = found,
                        Err(e) => warn!("Guide {}: could not translate window: {}", guide.sgrna_seq, e),
                    }
                }
                None => debug!("Guide {} has no position, residues not annotated", guide.sgrna_seq),
            },
            (None, None) => warn!("Guide {} has no starting frame", guide.sgrna_seq),
            (None, Some(_)) => {}
        }
    }

    let classification = classify(&catalog, splice, has_intronic_edit(guide, ctx), guide.is_utr);
    let pos = catalog.representative_position().or_else(|| {
        coding
            .target_cds()
            .and(coding.centre_position())
            .map(|p| p as f64)
    });
    GuideAnnotation {
        win_overlap: Some(coding.overlap().label().to_string()),
        edit_count: count,
        mutations: catalog.mutations(),
        muttypes: classification.muttypes_column(),
        muttype: classification.muttype.label().to_string(),
        pos,
    }
}

/// Numbers the guides `sgRNA_0`, `sgRNA_1`, ... in a leading column unless
/// the table already names them.
fn with_guide_ids(mut df: DataFrame) -> Result<DataFrame> {
    if has_column(&df, GUIDE_ID_COLUMN) {
        return Ok(df);
    }
    let ids: Vec<String> = (0..df.height()).map(|i| format!("sgRNA_{}", i)).collect();
    df.insert_column(0, Series::new(PlSmallStr::from(GUIDE_ID_COLUMN), ids))?;
    Ok(df)
}

/// Drops every guide whose coding sequence occurs more than once.
fn drop_duplicate_targets(df: DataFrame) -> Result<DataFrame> {
    let coding = string_column(&df, CODING_SEQ_COLUMN)?;
    let duplicated = duplicated_mask(&coding);
    let dropped = duplicated.iter().filter(|d| **d).count();
    if dropped == 0 {
        return Ok(df);
    }
    warn!("{} guides share a coding sequence with another guide and were removed", dropped);
    let keep: Vec<bool> = duplicated.iter().map(|d| !d).collect();
    Ok(filter_rows(&df, &keep)?)
}

/// Annotates a guide table in memory for one chemistry.
///
/// Can be called repeatedly on its own output to stack several chemistries.
pub fn annotate_frame(df: DataFrame, ctx: &AnnotationContext, columns: &ColumnNames) -> Result<DataFrame> {
    require_columns(&df, &required_columns(columns))?;
    let df = with_guide_ids(df)?;
    let df = with_coding_seq(df, columns)?;
    let mut df = drop_duplicate_targets(df)?;

    let guides = records(&df, columns)?;
    let pre = ctx.chemistry.prefix();
    info!("Annotating {} guides for {}", guides.len(), pre);

    let annotations: Vec<GuideAnnotation> = guides.par_iter().map(|g| annotate_guide(g, ctx)).collect();

    let win_overlap: Vec<Option<String>> = annotations.iter().map(|a| a.win_overlap.clone()).collect();
    let counts: Vec<i64> = annotations.iter().map(|a| a.edit_count).collect();
    let mutations: Vec<Option<String>> = annotations.iter().map(|a| a.mutations.clone()).collect();
    let muttypes: Vec<String> = annotations.iter().map(|a| a.muttypes.clone()).collect();
    let muttype: Vec<String> = annotations.iter().map(|a| a.muttype.clone()).collect();
    let pos: Vec<Option<f64>> = annotations.iter().map(|a| a.pos).collect();

    df.with_column(Series::new(PlSmallStr::from(format!("{}_win_overlap", pre)), win_overlap))?;
    df.with_column(Series::new(
        PlSmallStr::from(format!("{}_{}_count", pre, ctx.chemistry.edit_from)),
        counts,
    ))?;
    df.with_column(Series::new(PlSmallStr::from(format!("{}_mutations", pre)), mutations))?;
    df.with_column(Series::new(PlSmallStr::from(format!("{}_muttypes", pre)), muttypes))?;
    df.with_column(Series::new(PlSmallStr::from(format!("{}_muttype", pre)), muttype))?;
    df.with_column(Series::new(PlSmallStr::from(format!("{}_pos", pre)), pos))?;

    let annotated = annotations.iter().filter(|a| a.mutations.is_some()).count();
    info!("Guides annotated for {}: {} of {} predict residue changes", pre, annotated, df.height());
    Ok(df)
}

/// File-level inputs of [`annotate`]
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub chemistry: EditChemistry,
    pub window: EditingWindow,
    pub columns: ColumnNames,
    pub gene_fasta: Option<PathBuf>,
    pub protein_fasta: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

impl AnnotateOptions {
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let validated = config.validate()?;
        Ok(AnnotateOptions {
            chemistry: validated.chemistry,
            window: validated.window,
            columns: config.columns.clone(),
            gene_fasta: None,
            protein_fasta: None,
            output: None,
        })
    }
}

/// Compares the gene model's translation with the protein FASTA once, before
/// any guide is annotated. A mismatch only warns.
pub fn check_gene_against_protein(locus: Option<&Locus>, protein: Option<&ProteinReference>) -> Result<bool> {
    match (locus, protein) {
        (Some(locus), Some(protein)) => {
            let matches = locus.matches_protein(protein)?;
            if !matches {
                warn!("Gene and protein FASTA disagree, predicted residues may not match the protein");
            }
            Ok(matches)
        }
        _ => Ok(true),
    }
}

/// Reads a guide CSV, annotates it and writes the result when an output path is set.
pub fn annotate(guides_csv: &Path, options: &AnnotateOptions) -> Result<DataFrame> {
    let locus = options.gene_fasta.as_deref().map(Locus::from_fasta).transpose()?;
    let protein = options
        .protein_fasta
        .as_deref()
        .map(ProteinReference::from_fasta)
        .transpose()?;
    check_gene_against_protein(locus.as_ref(), protein.as_ref())?;
    let ctx = AnnotationContext::new(&options.chemistry, options.window, locus.as_ref(), protein.as_ref())?;

    let df = GuideTable {
        path: guides_csv.to_path_buf(),
    }
    .load()?;
    let mut df = annotate_frame(df, &ctx, &options.columns)?;
    if let Some(output) = &options.output {
        write_csv(&mut df, output)?;
    }
    Ok(df)
}
