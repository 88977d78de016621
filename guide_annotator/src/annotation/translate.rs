use crate::error::Result;
use crate::gene::Locus;
use crate::genomic::dna_to_aa;

/// Replaces the intron bases of codons that straddle an exon boundary with
/// the spliced CDS bases at the same gene coordinates.
///
/// A lowercase prefix sits in the upstream flank of its exon, so its gene
/// coordinates land on the tail of the previous exon; a lowercase suffix lands
/// on the head of the next one. Coordinates outside the CDS keep their
/// lowercase base and the codon stays untranslatable. Codons that are
/// entirely upper or entirely lower case are left alone.
///
/// # Arguments
///
/// * `dna` - codon-aligned window in coding orientation
/// * `origin` - gene coordinate of `dna[0]`
pub fn stitch_codons(dna: &str, origin: Option<i64>, locus: Option<&Locus>) -> String {
    let (origin, locus) = match (origin, locus) {
        (Some(o), Some(l)) => (o, l),
        _ => return dna.to_string(),
    };
    let mut out = String::with_capacity(dna.len());
    for (c, codon) in dna.as_bytes().chunks(3).enumerate() {
        let mixed = codon.iter().any(u8::is_ascii_uppercase) && codon.iter().any(u8::is_ascii_lowercase);
        for (k, &base) in codon.iter().enumerate() {
            let base = base as char;
            if mixed && base.is_ascii_lowercase() {
                let g = origin + (3 * c + k) as i64;
                match locus.cds_base(g) {
                    Some(spliced) => out.push(spliced.to_ascii_uppercase()),
                    None => out.push(base),
                }
            } else {
                out.push(base);
            }
        }
    }
    out
}

/// Stitches then translates a codon window; unresolved codons read as `_`.
pub fn translate_window(dna: &str, origin: Option<i64>, locus: Option<&Locus>) -> Result<(String, String)> {
    let stitched = stitch_codons(dna, origin, locus);
    let residues = dna_to_aa(&stitched, false)?;
    Ok((stitched, residues))
}
