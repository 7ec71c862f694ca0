//! Helpers shared by the wx-grid test suites: grid generators, catalog
//! fixtures and a skip macro for database-backed tests.
//!
//! Pull it in as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Environment variable naming the PostgreSQL instance used by
/// integration tests.
pub const TEST_DATABASE_ENV: &str = "TEST_DATABASE_URL";

/// The test database URL, if one is configured.
pub fn test_database_url() -> Option<String> {
    std::env::var(TEST_DATABASE_ENV)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Evaluates to the test database URL, or prints a notice and returns
/// from the enclosing test when `TEST_DATABASE_URL` is unset.
///
/// ```ignore
/// #[tokio::test]
/// async fn test_against_postgres() {
///     let url = test_utils::require_database!();
///     let pool = PgPool::connect(&url).await.unwrap();
/// }
/// ```
#[macro_export]
macro_rules! require_database {
    () => {{
        match $crate::test_database_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "SKIPPED: {} not set. Point it at a scratch PostgreSQL database to run this test.",
                    $crate::TEST_DATABASE_ENV
                );
                return;
            }
        }
    }};
}

/// Assert two numbers differ by at most `epsilon`, compared as `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (left, right) = ($left as f64, $right as f64);
        let epsilon = $epsilon as f64;
        if (left - right).abs() > epsilon {
            panic!(
                "values differ by more than {}: left {:?}, right {:?}",
                epsilon, left, right
            );
        }
    }};
}
