//! Criticality resolution
//!
//! Leaf answers resolve a severity score from their selected option, answered
//! option or numeric value; container answers (grid, multi-choice) roll up
//! the worst case over their children. The "with repairs" variant collapses
//! repaired subtrees to zero.

/// A numeric criticality band: [valor_minimo, valor_maximo] → criticidad.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub valor_minimo: f64,
    pub valor_maximo: f64,
    pub criticidad: i64,
}

/// Resolve a numeric value against a question's bands.
///
/// Intervals are inclusive at both edges. When bands overlap, the first
/// matching band in slice order (stored insertion order) wins. A value no
/// band covers resolves to 0, not an error.
pub fn band_criticality(bands: &[Band], value: f64) -> i64 {
    bands
        .iter()
        .find(|b| b.valor_minimo <= value && value <= b.valor_maximo)
        .map(|b| b.criticidad)
        .unwrap_or(0)
}

/// Criticality of a multi-choice member: the answered option's weight when
/// the option is selected, 0 otherwise.
pub fn member_criticality(option_criticality: i64, selected: bool) -> i64 {
    if selected {
        option_criticality
    } else {
        0
    }
}

/// Worst case over child scores. An empty container scores 0.
pub fn rollup<I: IntoIterator<Item = i64>>(children: I) -> i64 {
    children.into_iter().max().unwrap_or(0)
}

/// With-repairs collapse: a repaired answer contributes 0.
pub fn with_repairs(repaired: bool, score: i64) -> i64 {
    if repaired {
        0
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> Vec<Band> {
        vec![
            Band { valor_minimo: 0.0, valor_maximo: 10.0, criticidad: 1 },
            Band { valor_minimo: 10.0, valor_maximo: 20.0, criticidad: 5 },
        ]
    }

    #[test]
    fn band_lookup_is_inclusive_at_both_edges() {
        let bands = bands();
        assert_eq!(band_criticality(&bands, 0.0), 1);
        assert_eq!(band_criticality(&bands, 20.0), 5);
    }

    #[test]
    fn overlapping_boundary_resolves_to_first_band() {
        // 10 is covered by both bands; stored order decides, deterministically
        assert_eq!(band_criticality(&bands(), 10.0), 1);
    }

    #[test]
    fn uncovered_value_resolves_to_zero() {
        assert_eq!(band_criticality(&bands(), 25.0), 0);
        assert_eq!(band_criticality(&bands(), -0.1), 0);
        assert_eq!(band_criticality(&[], 5.0), 0);
    }

    #[test]
    fn rollup_is_max_over_children() {
        assert_eq!(rollup([1, 5, 3]), 5);
        assert_eq!(rollup([]), 0);
    }

    #[test]
    fn unselected_member_scores_zero() {
        assert_eq!(member_criticality(7, true), 7);
        assert_eq!(member_criticality(7, false), 0);
    }

    #[test]
    fn repaired_answer_collapses_to_zero() {
        assert_eq!(with_repairs(true, 9), 0);
        assert_eq!(with_repairs(false, 9), 9);
    }
}
