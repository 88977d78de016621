mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use guide_annotator::annotation::{
    annotate, annotate_frame, check_gene_against_protein, AnnotateOptions, AnnotationContext,
};
use guide_annotator::config::{ColumnNames, RunConfig};
use guide_annotator::data_handling::guide_library::{generate_library, library_frame, LibraryOptions};
use guide_annotator::data_handling::reference_check::{check_frame, reference_check, ReferenceCheckOptions};
use guide_annotator::gene::Locus;
use guide_annotator::genomic::ProteinReference;
use guide_annotator::helper_functions::write_csv;

use crate::cli::{Args, Command};

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_json(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    args.overrides.apply(&mut config);
    // fail before any file is read
    config.validate().context("invalid configuration")?;
    if let Some(path) = &args.write_config {
        config.write_json(path)?;
    }
    Ok(config)
}

fn design(
    config: &RunConfig,
    gene_fasta: &Path,
    genome_fasta: Option<&Path>,
    protein_fasta: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let locus = Locus::from_fasta(gene_fasta)
        .with_context(|| format!("failed to read gene {}", gene_fasta.display()))?;
    let library = LibraryOptions::from_config(config)?;
    let mut df = library_frame(&locus, &library)?;
    info!("{} guides were generated for PAM {}", df.height(), library.pam);
    write_csv(&mut df, &out_dir.join("library.csv"))?;

    if let Some(genome) = genome_fasta {
        let options = ReferenceCheckOptions {
            delete_repeats: config.delete_repeats,
            output: None,
        };
        df = check_frame(df, genome, &options)
            .with_context(|| format!("reference check against {} failed", genome.display()))?;
    }

    let protein = protein_fasta.map(ProteinReference::from_fasta).transpose()?;
    check_gene_against_protein(Some(&locus), protein.as_ref())?;
    let ctx = AnnotationContext::new(&library.chemistry, library.window, Some(&locus), protein.as_ref())?;
    let mut df = annotate_frame(df, &ctx, &ColumnNames::default())?;
    write_csv(&mut df, &out_dir.join("annotated.csv"))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&args)?;

    match &args.command {
        Command::Generate { gene_fasta, output } => {
            let mut options = LibraryOptions::from_config(&config)?;
            options.output = Some(output.clone());
            generate_library(gene_fasta, &options)
                .with_context(|| format!("library generation from {} failed", gene_fasta.display()))?;
        }
        Command::Check {
            guides,
            genome_fasta,
            output,
        } => {
            let options = ReferenceCheckOptions {
                delete_repeats: config.delete_repeats,
                output: Some(output.clone()),
            };
            reference_check(guides, genome_fasta, &options)
                .with_context(|| format!("reference check of {} failed", guides.display()))?;
        }
        Command::Annotate {
            guides,
            gene_fasta,
            protein_fasta,
            output,
        } => {
            let mut options = AnnotateOptions::from_config(&config)?;
            options.gene_fasta = gene_fasta.clone();
            options.protein_fasta = protein_fasta.clone();
            options.output = Some(output.clone());
            annotate(guides, &options).with_context(|| format!("annotation of {} failed", guides.display()))?;
        }
        Command::Design {
            gene_fasta,
            genome_fasta,
            protein_fasta,
            out_dir,
        } => {
            design(
                &config,
                gene_fasta,
                genome_fasta.as_deref(),
                protein_fasta.as_deref(),
                out_dir,
            )?;
        }
    }
    info!("guide_annotator: done");
    Ok(())
}
