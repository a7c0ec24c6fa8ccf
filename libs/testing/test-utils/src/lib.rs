//! Shared test utilities for domain testing
//!
//! - `TestMongo`: MongoDB container with automatic cleanup (feature: "mongodb")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestMongo};
//!
//! #[tokio::test]
//! async fn my_mongo_test() {
//!     let mongo = TestMongo::new().await;
//!     let db = mongo.database("my_test");
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let id = builder.media_id(1);
//!     let vector = builder.embedding(8, 1);
//! }
//! ```

#[cfg(feature = "mongodb")]
mod mongo;

#[cfg(feature = "mongodb")]
pub use mongo::TestMongo;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_ingest_page");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Positive media id, distinct per `n` within a builder
    pub fn media_id(&self, n: u32) -> i64 {
        ((self.seed % 1_000_000) as i64) * 1_000 + i64::from(n) + 1
    }

    /// Generate a unique name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("my_test");
    /// let title = builder.name("anime", "main");
    /// assert!(title.starts_with("test-anime-"));
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }

    /// Deterministic non-zero vector of length `dimension`
    pub fn embedding(&self, dimension: usize, n: u32) -> Vec<f32> {
        let mut state = self.seed ^ (u64::from(n) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        (0..dimension)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 2_000) as f32 / 1_000.0) - 1.0 + 0.0005
            })
            .collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert that scores never increase along the slice
    pub fn assert_non_increasing(scores: &[f32], context: &str) {
        for pair in scores.windows(2) {
            assert!(
                pair[0] >= pair[1],
                "{}: scores not sorted descending: {:?}",
                context,
                scores
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.media_id(3), builder2.media_id(3));
        assert_eq!(builder1.embedding(16, 2), builder2.embedding(16, 2));
        assert_eq!(
            builder1.name("anime", "test"),
            builder2.name("anime", "test")
        );
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.embedding(8, 0), builder2.embedding(8, 0));
    }

    #[test]
    fn test_media_ids_are_distinct_and_positive() {
        let builder = TestDataBuilder::from_test_name("ids");
        assert_ne!(builder.media_id(0), builder.media_id(1));
        assert!(builder.media_id(0) > 0);
    }

    #[test]
    fn test_embedding_has_requested_dimension() {
        let builder = TestDataBuilder::new(7);
        let vector = builder.embedding(3072, 0);
        assert_eq!(vector.len(), 3072);
        assert!(vector.iter().any(|v| *v != 0.0));
    }

    #[test]
    #[should_panic(expected = "scores not sorted")]
    fn test_assert_non_increasing_panics() {
        assertions::assert_non_increasing(&[0.1, 0.5], "ranking");
    }
}
