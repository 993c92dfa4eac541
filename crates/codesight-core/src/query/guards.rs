//! Shared guardrails for budgets, traversal limits and scan caps.

// Scan guards
pub const DEFAULT_MAX_SCAN_FILES: usize = 5000;
pub const MAX_SCAN_FILES: usize = 50_000;

// Dependency graph guards
pub const DEFAULT_CRITICAL_CYCLE_LENGTH: usize = 3;
pub const DEFAULT_HOTSPOT_PERCENTILE: f64 = 0.9;
pub const DEFAULT_FOCUS_DEPTH: i64 = 5;
pub const MAX_FOCUS_DEPTH: i64 = 10;
pub const MAX_CYCLES: usize = 1000;

// Context guards
pub const MAX_TASK_LENGTH: usize = 512;
pub const DEFAULT_CONTEXT_TOKEN_BUDGET: i64 = 8000;
pub const MIN_CONTEXT_TOKEN_BUDGET: i64 = 0;
pub const MAX_CONTEXT_TOKEN_BUDGET: i64 = 200_000;
pub const DEPTH_STRATEGY_HOPS: usize = 2;
pub const MAX_RELATED_TESTS: usize = 20;

// Report guards
pub const MAX_TOP_DECLARATIONS: usize = 20;
pub const MAX_LAYER_SAMPLE: usize = 10;

pub fn clamp_int(value: i64, minimum: i64, maximum: i64) -> i64 {
    value.max(minimum).min(maximum)
}

pub fn clamp_depth(value: i64, maximum: i64) -> i64 {
    clamp_int(value, 1, maximum)
}

pub fn clamp_budget(value: i64) -> usize {
    clamp_int(value, MIN_CONTEXT_TOKEN_BUDGET, MAX_CONTEXT_TOKEN_BUDGET) as usize
}

pub fn clamp_scan_files(value: usize) -> usize {
    value.clamp(1, MAX_SCAN_FILES)
}

/// Trim and cap a task description on a character boundary.
pub fn truncate_task(task: &str) -> String {
    let stripped = task.trim();
    if stripped.len() <= MAX_TASK_LENGTH {
        return stripped.to_string();
    }
    let mut end = MAX_TASK_LENGTH;
    while !stripped.is_char_boundary(end) {
        end -= 1;
    }
    stripped[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_budget() {
        assert_eq!(clamp_budget(500), 500);
        assert_eq!(clamp_budget(10_000_000), MAX_CONTEXT_TOKEN_BUDGET as usize);
        assert_eq!(clamp_budget(0), 0);
    }

    #[test]
    fn test_clamp_depth() {
        assert_eq!(clamp_depth(0, MAX_FOCUS_DEPTH), 1);
        assert_eq!(clamp_depth(3, MAX_FOCUS_DEPTH), 3);
        assert_eq!(clamp_depth(42, MAX_FOCUS_DEPTH), MAX_FOCUS_DEPTH);
    }

    #[test]
    fn test_truncate_task_respects_char_boundaries() {
        let long = "é".repeat(MAX_TASK_LENGTH);
        let truncated = truncate_task(&long);
        assert!(truncated.len() <= MAX_TASK_LENGTH);
        assert!(truncated.chars().all(|c| c == 'é'));
        assert_eq!(truncate_task("  fix bug  "), "fix bug");
    }
}
