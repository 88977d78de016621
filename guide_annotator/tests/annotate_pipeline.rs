use std::fs;
use std::path::Path;

use polars::prelude::*;
use tempfile::tempdir;

use guide_annotator::annotation::{
    annotate, annotate_frame, check_gene_against_protein, AnnotateOptions, AnnotationContext,
};
use guide_annotator::config::{ColumnNames, RunConfig};
use guide_annotator::data_handling::guide_library::{generate_library, LibraryOptions};
use guide_annotator::data_handling::reference_check::{check_frame, ReferenceCheckOptions, OCCURRENCE_COLUMN};
use guide_annotator::gene::Locus;
use guide_annotator::genomic::ProteinReference;
use guide_annotator::helper_functions::{has_column, int_column, string_column};
use guide_annotator::models::EditChemistry;

const EXON_1: &str = "gaattcgaacgatcagATGCCCAAGCgtaagtcatcgattgg";
const EXON_2: &str = "ttctctttcccctcagAGCTGGAAATAAgtgagtacctgaccaa";

/// Sense guide whose window ends one base into the first intron; its last
/// exonic codon `C|AG` is only complete in the spliced CDS.
const BOUNDARY_GUIDE: &str = "CCCAAGCgtaagtcatcgat";

fn write_gene(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("gene.fa");
    let fasta = format!(
        ">hg38 range=chr7:1001-1042 strand=+\n{}\n>hg38 range=chr7:2001-2044 strand=+\n{}\n",
        EXON_1, EXON_2
    );
    fs::write(&path, fasta).unwrap();
    path
}

fn row_of(df: &DataFrame, seq: &str) -> usize {
    string_column(df, "sgRNA_seq")
        .unwrap()
        .iter()
        .position(|s| s.as_deref() == Some(seq))
        .unwrap_or_else(|| panic!("{} not in table", seq))
}

fn library(dir: &Path) -> (DataFrame, std::path::PathBuf) {
    let gene = write_gene(dir);
    let config = RunConfig {
        gene_name: "TEST1".to_string(),
        ..RunConfig::default()
    };
    let mut options = LibraryOptions::from_config(&config).unwrap();
    let out = dir.join("library").join("library.csv");
    options.output = Some(out.clone());
    (generate_library(&gene, &options).unwrap(), out)
}

#[test]
fn library_is_written_with_expected_columns() {
    let dir = tempdir().unwrap();
    let (df, out) = library(dir.path());
    assert!(out.exists());
    for column in [
        "sgRNA_seq",
        "PAM_seq",
        "starting_frame",
        "gene_pos",
        "chr_pos",
        "exon",
        "coding_seq",
        "sgRNA_strand",
        "gene_strand",
        "gene",
        "domain",
        "windowstart_pos",
        "windowend_pos",
        "is_UTR",
    ] {
        assert!(has_column(&df, column), "missing {}", column);
    }

    let row = row_of(&df, BOUNDARY_GUIDE);
    assert_eq!(int_column(&df, "gene_pos").unwrap()[row], Some(3));
    assert_eq!(int_column(&df, "starting_frame").unwrap()[row], Some(0));
    assert_eq!(int_column(&df, "windowstart_pos").unwrap()[row], Some(6));
    assert_eq!(int_column(&df, "windowend_pos").unwrap()[row], Some(10));
    assert_eq!(int_column(&df, "chr_pos").unwrap()[row], Some(1020));
    assert_eq!(string_column(&df, "PAM_seq").unwrap()[row].as_deref(), Some("tgg"));
}

#[test]
fn boundary_codon_is_completed_from_the_next_exon() {
    let dir = tempdir().unwrap();
    let (_, library_csv) = library(dir.path());
    let config = RunConfig::default();

    let mut options = AnnotateOptions::from_config(&config).unwrap();
    options.gene_fasta = Some(write_gene(dir.path()));
    options.output = Some(dir.path().join("annotated.csv"));
    let df = annotate(&library_csv, &options).unwrap();
    assert!(dir.path().join("annotated.csv").exists());

    let row = row_of(&df, BOUNDARY_GUIDE);
    // CAG (Q4) becomes TAG
    assert_eq!(string_column(&df, "CtoT_mutations").unwrap()[row].as_deref(), Some("Q4."));
    assert_eq!(string_column(&df, "CtoT_muttype").unwrap()[row].as_deref(), Some("Nonsense"));
    assert_eq!(string_column(&df, "CtoT_win_overlap").unwrap()[row].as_deref(), Some("Exon/Intron"));
    assert_eq!(int_column(&df, "CtoT_C_count").unwrap()[row], Some(1));
    assert_eq!(df.column("CtoT_pos").unwrap().f64().unwrap().get(row), Some(4.0));

    // without the gene model the split codon cannot be read, so its only
    // edit has no known effect rather than a silent one
    let unstitched = AnnotateOptions::from_config(&config).unwrap();
    let df = annotate(&library_csv, &unstitched).unwrap();
    let row = row_of(&df, BOUNDARY_GUIDE);
    assert_eq!(string_column(&df, "CtoT_muttype").unwrap()[row].as_deref(), Some("No Mutation"));
    assert_eq!(string_column(&df, "CtoT_muttypes").unwrap()[row].as_deref(), Some("No Mutation"));
    assert_eq!(string_column(&df, "CtoT_mutations").unwrap()[row], None);
}

#[test]
fn gene_model_is_checked_against_the_protein() {
    let dir = tempdir().unwrap();
    let locus = Locus::from_fasta(&write_gene(dir.path())).unwrap();
    assert_eq!(locus.translate().unwrap(), "MPKQLEI");

    let protein = ProteinReference::parse(">sp|TEST1\nMPKQLEI\n");
    assert!(check_gene_against_protein(Some(&locus), Some(&protein)).unwrap());
    let other = ProteinReference::parse(">sp|TEST1\nMPKQLEV\n");
    assert!(!check_gene_against_protein(Some(&locus), Some(&other)).unwrap());
    assert!(check_gene_against_protein(Some(&locus), None).unwrap());

    // a disagreeing protein only warns, annotation still runs
    let (_, library_csv) = library(dir.path());
    let protein_path = dir.path().join("protein.fa");
    fs::write(&protein_path, ">sp|TEST1\nMPKQLEV\n").unwrap();
    let mut options = AnnotateOptions::from_config(&RunConfig::default()).unwrap();
    options.gene_fasta = Some(write_gene(dir.path()));
    options.protein_fasta = Some(protein_path);
    let df = annotate(&library_csv, &options).unwrap();
    let row = row_of(&df, BOUNDARY_GUIDE);
    assert_eq!(string_column(&df, "CtoT_muttype").unwrap()[row].as_deref(), Some("Nonsense"));
}

#[test]
fn chemistries_stack_on_one_table() {
    let dir = tempdir().unwrap();
    let (df, _) = library(dir.path());
    let locus = Locus::from_fasta(&write_gene(dir.path())).unwrap();
    let window = RunConfig::default().validate().unwrap().window;
    let columns = ColumnNames::default();
    let height = df.height();

    let ct = EditChemistry::new("C", "T").unwrap();
    let ctx = AnnotationContext::new(&ct, window, Some(&locus), None).unwrap();
    let df = annotate_frame(df, &ctx, &columns).unwrap();

    let ag = EditChemistry::new("A", "G").unwrap();
    let ctx = AnnotationContext::new(&ag, window, Some(&locus), None).unwrap();
    let df = annotate_frame(df, &ctx, &columns).unwrap();

    assert_eq!(df.height(), height);
    for column in ["CtoT_muttype", "CtoT_C_count", "AtoG_muttype", "AtoG_A_count", "AtoG_pos"] {
        assert!(has_column(&df, column), "missing {}", column);
    }
    let row = row_of(&df, BOUNDARY_GUIDE);
    // window AAGCg: two A's, A->G on AAG gives GAG (E) or AGG (R)
    assert_eq!(int_column(&df, "AtoG_A_count").unwrap()[row], Some(2));
    assert_eq!(string_column(&df, "AtoG_muttype").unwrap()[row].as_deref(), Some("Missense"));
}

#[test]
fn reference_occurrences_span_line_breaks() {
    let dir = tempdir().unwrap();
    let (df, _) = library(dir.path());

    let genome: String = format!("{}{}", EXON_1, EXON_2)
        .as_bytes()
        .chunks(25)
        .map(|c| format!("{}\n", String::from_utf8_lossy(c)))
        .collect();
    let genome_path = dir.path().join("genome.fa");
    fs::write(&genome_path, format!(">chr7\n{}>chrUn\nNNNNNNNNNN\n", genome)).unwrap();

    let df = check_frame(df, &genome_path, &ReferenceCheckOptions::default()).unwrap();
    let row = row_of(&df, BOUNDARY_GUIDE);
    assert_eq!(int_column(&df, OCCURRENCE_COLUMN).unwrap()[row], Some(1));
    assert!(int_column(&df, OCCURRENCE_COLUMN)
        .unwrap()
        .iter()
        .all(|c| c.unwrap_or(0) >= 1));
}
