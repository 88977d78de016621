use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AnnotatorError, Result};
use crate::genomic::{process_pam, CasType};
use crate::models::{EditChemistry, EditingWindow};

/// Protospacer length every window and guide table assumes
pub const GUIDE_LENGTH: usize = 20;

/// Guide sequence in coding orientation, derived when a table lacks it
pub const CODING_SEQ_COLUMN: &str = "coding_seq";

/// Guide identifier, numbered `sgRNA_<row>` when a table lacks it
pub const GUIDE_ID_COLUMN: &str = "sgRNA_ID";

/// Guide table column names, overridable for tables written by other tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub seq: String,
    pub frame: String,
    pub strand: String,
    pub gene_pos: String,
    pub window_start: String,
    pub window_end: String,
    pub exon: String,
    pub is_utr: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            seq: "sgRNA_seq".to_string(),
            frame: "starting_frame".to_string(),
            strand: "sgRNA_strand".to_string(),
            gene_pos: "gene_pos".to_string(),
            window_start: "windowstart_pos".to_string(),
            window_end: "windowend_pos".to_string(),
            exon: "exon".to_string(),
            is_utr: "is_UTR".to_string(),
        }
    }
}

/// Named residue range, 1-indexed and inclusive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub gene_name: String,
    pub cas_type: String,
    /// Custom PAM, takes precedence over `cas_type`
    pub pam: Option<String>,
    pub edit_from: String,
    pub edit_to: String,
    pub window: [usize; 2],
    pub exclude_introns: bool,
    pub exclude_nontargeting: bool,
    pub excluded_motifs: Vec<String>,
    pub domains: Vec<Domain>,
    /// Drop guides found more than once in the reference genome
    pub delete_repeats: bool,
    pub columns: ColumnNames,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            gene_name: String::new(),
            cas_type: "Sp".to_string(),
            pam: None,
            edit_from: "C".to_string(),
            edit_to: "T".to_string(),
            window: [4, 8],
            exclude_introns: true,
            exclude_nontargeting: true,
            excluded_motifs: vec!["TTTT".to_string()],
            domains: Vec::new(),
            delete_repeats: false,
            columns: ColumnNames::default(),
        }
    }
}

/// Checked configuration: chemistry, window and PAM compiled once before any row is read
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub chemistry: EditChemistry,
    pub window: EditingWindow,
    pub pam: String,
    pub pam_regex: Regex,
}

impl RunConfig {
    pub fn from_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: RunConfig = serde_json::from_reader(reader)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    /// PAM used for filtering: the custom PAM when set, else the cas type's.
    pub fn resolved_pam(&self) -> Result<String> {
        match &self.pam {
            Some(pam) if !pam.is_empty() => Ok(pam.to_ascii_uppercase()),
            _ => Ok(self.cas_type.parse::<CasType>()?.pam().to_string()),
        }
    }

    pub fn validate(&self) -> Result<ValidatedConfig> {
        let chemistry = EditChemistry::new(&self.edit_from, &self.edit_to)?;
        let window = EditingWindow::new(self.window[0], self.window[1], GUIDE_LENGTH)?;
        let pam = self.resolved_pam()?;
        let pam_regex = process_pam(&pam)?;
        for domain in &self.domains {
            if domain.start > domain.end {
                return Err(AnnotatorError::InvalidConfig(format!(
                    "domain `{}` starts after it ends ({} > {})",
                    domain.name, domain.start, domain.end
                )));
            }
        }
        Ok(ValidatedConfig {
            chemistry,
            window,
            pam,
            pam_regex,
        })
    }
}
