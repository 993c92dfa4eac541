//! Cyclomatic complexity, ranks and the maintainability index.
//!
//! All functions here are pure over values already extracted by
//! [`crate::indexer::symbols`].

use crate::models::{
    ComplexityRank, ControlFlowShape, Declaration, FileComplexity, FunctionComplexity,
    HalsteadCounts, RawMetrics,
};

pub fn cyclomatic(shape: &ControlFlowShape) -> u32 {
    1 + shape.decision_points()
}

pub fn rank(complexity: u32) -> ComplexityRank {
    match complexity {
        0..=5 => ComplexityRank::A,
        6..=10 => ComplexityRank::B,
        11..=20 => ComplexityRank::C,
        21..=30 => ComplexityRank::D,
        _ => ComplexityRank::F,
    }
}

/// Maintainability index on the 0-100 scale.
///
/// `volume` is the Halstead volume, `complexity` the total cyclomatic
/// complexity, `lloc` the logical line count and `comment_percent` the share
/// of comment lines in percent.
pub fn maintainability_index(volume: f64, complexity: u32, lloc: u32, comment_percent: f64) -> f64 {
    if volume <= 0.0 || lloc == 0 {
        return 100.0;
    }
    let volume_scale = volume.ln();
    let lloc_scale = (lloc as f64).ln();
    let comment_scale = (2.46 * comment_percent.to_radians()).sqrt();
    let unnormalized = 171.0 - 5.2 * volume_scale - 0.23 * complexity as f64 - 16.2 * lloc_scale
        + 50.0 * comment_scale.sin();
    (unnormalized * 100.0 / 171.0).clamp(0.0, 100.0)
}

pub fn maintainability_rank(index: f64) -> &'static str {
    if index > 19.0 {
        "A"
    } else if index > 9.0 {
        "B"
    } else {
        "C"
    }
}

/// Docstring lines count as comments.
pub fn comment_percent(metrics: &RawMetrics) -> f64 {
    if metrics.sloc == 0 {
        return 0.0;
    }
    (metrics.comments + metrics.multi) as f64 * 100.0 / metrics.sloc as f64
}

/// Score every function of a file and aggregate.
///
/// Aggregates cover functions and methods. Module-level decision points only
/// feed the maintainability index.
pub fn score_file(
    declarations: &[Declaration],
    metrics: &RawMetrics,
    halstead: &HalsteadCounts,
    module_decisions: u32,
) -> FileComplexity {
    let functions: Vec<FunctionComplexity> = declarations
        .iter()
        .filter_map(Declaration::as_function)
        .map(|f| {
            let cc = cyclomatic(&f.shape);
            FunctionComplexity {
                name: f.name.clone(),
                qualified_name: f.qualified_name.clone(),
                line: f.start_line,
                cyclomatic: cc,
                rank: rank(cc),
            }
        })
        .collect();

    let total: u32 = functions.iter().map(|f| f.cyclomatic).sum();
    let max = functions.iter().map(|f| f.cyclomatic).max().unwrap_or(0);
    let average = if functions.is_empty() {
        0.0
    } else {
        total as f64 / functions.len() as f64
    };
    let volume = halstead.volume();
    let index = maintainability_index(
        volume,
        total + module_decisions,
        metrics.lloc,
        comment_percent(metrics),
    );

    FileComplexity {
        functions,
        total,
        average,
        max,
        maintainability_index: index,
        maintainability_rank: maintainability_rank(index).to_string(),
        halstead_volume: volume,
        halstead_difficulty: halstead.difficulty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::parser::parse_python;
    use crate::indexer::symbols::extract_file;

    #[test]
    fn test_rank_boundaries() {
        assert_eq!(rank(1), ComplexityRank::A);
        assert_eq!(rank(5), ComplexityRank::A);
        assert_eq!(rank(6), ComplexityRank::B);
        assert_eq!(rank(10), ComplexityRank::B);
        assert_eq!(rank(11), ComplexityRank::C);
        assert_eq!(rank(20), ComplexityRank::C);
        assert_eq!(rank(21), ComplexityRank::D);
        assert_eq!(rank(30), ComplexityRank::D);
        assert_eq!(rank(31), ComplexityRank::F);
    }

    #[test]
    fn test_cyclomatic_is_one_plus_decisions() {
        let shape = ControlFlowShape {
            branches: 2,
            bool_terms: 1,
            handlers: 1,
            ..Default::default()
        };
        assert_eq!(cyclomatic(&shape), 5);
        assert_eq!(cyclomatic(&ControlFlowShape::default()), 1);
    }

    #[test]
    fn test_maintainability_index_reference_value() {
        let mi = maintainability_index(100.0, 5, 20, 0.0);
        assert!((mi - 56.943).abs() < 0.01, "{mi}");
        assert_eq!(maintainability_rank(mi), "A");
    }

    #[test]
    fn test_maintainability_index_is_bounded() {
        assert_eq!(maintainability_index(0.0, 3, 10, 0.0), 100.0);
        assert_eq!(maintainability_index(50.0, 3, 0, 0.0), 100.0);
        assert_eq!(maintainability_index(1e12, 500, 100_000, 0.0), 0.0);
        assert_eq!(maintainability_rank(15.0), "B");
        assert_eq!(maintainability_rank(9.0), "C");
    }

    #[test]
    fn test_empty_file_scores_full_maintainability() {
        let unit = parse_python(String::new()).ok().unwrap();
        let extracted = extract_file(&unit, "empty");
        let score = score_file(
            &extracted.declarations,
            &extracted.metrics,
            &extracted.halstead,
            extracted.module_decisions,
        );
        assert_eq!(score.maintainability_index, 100.0);
        assert_eq!(score.total, 0);
        assert_eq!(score.average, 0.0);
    }

    #[test]
    fn test_score_file_aggregates_functions() {
        let source = "\
def a(x):
    if x:
        return 1
    return 0

class K:
    def b(self, y):
        return y and self or None
";
        let unit = parse_python(source.to_string()).ok().unwrap();
        let extracted = extract_file(&unit, "m");
        let score = score_file(
            &extracted.declarations,
            &extracted.metrics,
            &extracted.halstead,
            extracted.module_decisions,
        );
        assert_eq!(score.functions.len(), 2);
        assert_eq!(score.total, 5);
        assert_eq!(score.max, 3);
        assert!((score.average - 2.5).abs() < 1e-9);
        assert!(score.maintainability_index > 0.0 && score.maintainability_index <= 100.0);
    }
}
