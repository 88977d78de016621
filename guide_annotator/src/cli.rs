use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use guide_annotator::config::RunConfig;

#[derive(Parser, Debug)]
#[command(
    name = "guide_annotator",
    about = "Design base-editor tiling libraries and annotate their predicted protein changes",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON run configuration; flags below override it
    #[arg(short = 'c', long = "config", value_name = "JSON", global = true)]
    pub config: Option<PathBuf>,

    /// Write the effective configuration to this path
    #[arg(long = "write-config", value_name = "JSON", global = true)]
    pub write_config: Option<PathBuf>,

    /// Set logging level to WARN
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Tile a gene with guides and write the filtered library
    Generate {
        /// Exon FASTA with lowercase intron flanks
        gene_fasta: PathBuf,

        #[arg(short = 'o', long = "out", value_name = "CSV")]
        output: PathBuf,
    },
    /// Count how often each guide occurs in a reference genome
    Check {
        /// Guide table; `coding_seq` is derived from the guide and strand when absent
        guides: PathBuf,

        #[arg(short = 'S', long = "genome", value_name = "FASTA")]
        genome_fasta: PathBuf,

        #[arg(short = 'o', long = "out", value_name = "CSV")]
        output: PathBuf,
    },
    /// Predict the protein changes of every guide in a table
    Annotate {
        guides: PathBuf,

        /// Gene FASTA used to extend codons past the protospacer
        #[arg(short = 'G', long = "gene", value_name = "FASTA")]
        gene_fasta: Option<PathBuf>,

        /// Protein FASTA to check predicted residues against
        #[arg(short = 'P', long = "protein", value_name = "FASTA")]
        protein_fasta: Option<PathBuf>,

        #[arg(short = 'o', long = "out", value_name = "CSV")]
        output: PathBuf,
    },
    /// Generate, optionally check against a genome, then annotate
    Design {
        gene_fasta: PathBuf,

        #[arg(short = 'S', long = "genome", value_name = "FASTA")]
        genome_fasta: Option<PathBuf>,

        #[arg(short = 'P', long = "protein", value_name = "FASTA")]
        protein_fasta: Option<PathBuf>,

        /// Directory for the library and annotated tables
        #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
        out_dir: PathBuf,
    },
}

/// Flags taking precedence over the configuration file
#[derive(ClapArgs, Debug, Default)]
pub struct Overrides {
    #[arg(long, global = true)]
    pub gene_name: Option<String>,

    /// Sp, SpG, SpRY, SpRY_highefficiency or SpRY_lowefficiency
    #[arg(long, global = true)]
    pub cas_type: Option<String>,

    /// Custom PAM in IUPAC letters (ACGTRYN); replaces the cas type's PAM
    #[arg(long, global = true)]
    pub pam: Option<String>,

    #[arg(long, global = true)]
    pub edit_from: Option<String>,

    #[arg(long, global = true)]
    pub edit_to: Option<String>,

    /// Editing window, 1-indexed inclusive, e.g. `--window 4 8`
    #[arg(long, num_args = 2, value_names = ["START", "END"], global = true)]
    pub window: Option<Vec<usize>>,

    /// Keep guides whose only editable bases are intronic
    #[arg(long, global = true)]
    pub include_introns: bool,

    /// Keep guides without an editable base in the window
    #[arg(long, global = true)]
    pub include_nontargeting: bool,

    /// Remove guides found more than once in the genome
    #[arg(long, global = true)]
    pub delete_repeats: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(name) = &self.gene_name {
            config.gene_name = name.clone();
        }
        if let Some(cas) = &self.cas_type {
            config.cas_type = cas.clone();
        }
        if let Some(pam) = &self.pam {
            config.pam = Some(pam.clone());
        }
        if let Some(from) = &self.edit_from {
            config.edit_from = from.clone();
        }
        if let Some(to) = &self.edit_to {
            config.edit_to = to.clone();
        }
        if let Some([start, end]) = self.window.as_deref() {
            config.window = [*start, *end];
        }
        if self.include_introns {
            config.exclude_introns = false;
        }
        if self.include_nontargeting {
            config.exclude_nontargeting = false;
        }
        if self.delete_repeats {
            config.delete_repeats = true;
        }
    }
}
