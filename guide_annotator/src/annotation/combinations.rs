use std::collections::HashSet;
use std::ops::Range;

/// Indices inside `range` holding an exonic `from` base.
pub fn eligible_positions(seq: &str, range: Range<usize>, from: char) -> Vec<usize> {
    seq.char_indices()
        .filter(|(i, base)| range.contains(i) && *base == from)
        .map(|(i, _)| i)
        .collect()
}

/// Every subset of `positions` edited to `to`, in bit-mask order.
/// The empty subset comes first and reproduces `seq`.
fn apply_subsets(seq: &str, positions: &[usize], to: char) -> Vec<String> {
    let base: Vec<char> = seq.chars().collect();
    (0u64..1 << positions.len())
        .map(|mask| {
            let mut edited = base.clone();
            for (bit, &pos) in positions.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    edited[pos] = to;
                }
            }
            edited.into_iter().collect()
        })
        .collect()
}

/// Enumerates all sequences reachable by editing any subset of the eligible
/// bases inside `range`.
///
/// Eligibility is decided once on the unedited sequence for every base pair.
/// With two pairs (dual editors) each subset of the first pair is combined
/// with each subset of the second, applied on top. The result is ordered,
/// free of duplicates, and always starts with `seq` itself.
pub fn enumerate_edits(seq: &str, range: Range<usize>, pairs: &[(char, char)]) -> Vec<String> {
    let mut combos = vec![seq.to_string()];
    for &(from, to) in pairs {
        let positions = eligible_positions(seq, range.clone(), from);
        combos = combos
            .iter()
            .flat_map(|combo| apply_subsets(combo, &positions, to))
            .collect();
    }

    let mut seen = HashSet::new();
    combos.retain(|combo| seen.insert(combo.clone()));
    combos
}
