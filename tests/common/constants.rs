#![allow(dead_code)]

//! Shared constants for end-to-end tests

use std::time::Duration;

// ============================================================================
// Source Log Content
// ============================================================================

pub const DATE_1: &str = "2024-01-01";
pub const DATE_2: &str = "2024-01-02";

/// Lines of the default source log, in file order.
pub const SOURCE_LINES: &[&str] = &[
    "2024-01-01 10:00:00 INFO  RecipeController - Executed: getAllRecipes()",
    "2024-01-02 09:12:44 WARN  CacheService - Cache is full, removing eldest entry",
    "2024-01-01 10:00:05 ERROR ReviewService - Review 7 not found",
    "2024-01-03 18:30:00 INFO  CuisineController - Executed: getCuisine(3)",
    "2024-01-02 23:59:59 INFO  IngredientService - Executed: save()",
];

// ============================================================================
// Timing
// ============================================================================

/// How often tests poll for a job to finish
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Upper bound for a single job to reach a terminal state in tests
pub const JOB_TIMEOUT: Duration = Duration::from_secs(10);
