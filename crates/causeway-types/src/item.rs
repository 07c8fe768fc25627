//! Catalog items and their ratings.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::ItemId;

// ============================================================================
// Rating
// ============================================================================

/// A user's rating of an item, on the `0.0..=5.0` scale.
///
/// Ratings are validated at the boundary (client parsing, catalog loading);
/// everything past that point can assume a finite in-range value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Rating(f32);

impl Rating {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 5.0;

    pub fn new(value: f32) -> Result<Self, InvalidRating> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidRating(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for Rating {
    type Error = InvalidRating;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for f32 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// A rating outside `0.0..=5.0` or not a number.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("invalid rating {0} (expected a value between 0.0 and 5.0)")]
pub struct InvalidRating(pub f32);

// ============================================================================
// Item
// ============================================================================

/// Catalog metadata of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    /// Release year, when the catalog title carries one.
    pub year: Option<u16>,
    pub genres: Vec<String>,
}

impl Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.year {
            Some(year) => write!(f, "{} ({year})", self.title),
            None => write!(f, "{}", self.title),
        }
    }
}

// ============================================================================
// Rating Distribution
// ============================================================================

/// How many users gave each distinct rating to an item.
///
/// Buckets are sorted by ascending rating and never hold a zero count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingDistribution {
    buckets: Vec<(Rating, u32)>,
}

impl RatingDistribution {
    /// Builds the distribution of a set of individual ratings.
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let mut values: Vec<Rating> = ratings.into_iter().collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut buckets: Vec<(Rating, u32)> = Vec::new();
        for rating in values {
            match buckets.last_mut() {
                Some((last, count)) if last.0.to_bits() == rating.0.to_bits() => *count += 1,
                _ => buckets.push((rating, 1)),
            }
        }

        Self { buckets }
    }

    /// `(rating, count)` pairs in ascending rating order.
    pub fn buckets(&self) -> &[(Rating, u32)] {
        &self.buckets
    }

    /// Number of users who gave exactly `rating`.
    pub fn count_for(&self, rating: Rating) -> u32 {
        self.buckets
            .iter()
            .find(|(r, _)| r.0.to_bits() == rating.0.to_bits())
            .map_or(0, |(_, count)| *count)
    }

    /// Total number of ratings.
    pub fn total(&self) -> u32 {
        self.buckets.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Mean rating weighted by bucket counts, or `None` with no ratings.
    pub fn average(&self) -> Option<f32> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted: f32 = self
            .buckets
            .iter()
            .map(|(rating, count)| rating.0 * (*count as f32))
            .sum();
        Some(weighted / total as f32)
    }
}

// ============================================================================
// Item Details (query result)
// ============================================================================

/// Result of a query: item metadata, its rating distribution, and the
/// requesting user's own rating.
///
/// An item the replica knows nothing about yields empty details
/// (`item == None`, empty distribution), not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub item: Option<Item>,
    pub distribution: RatingDistribution,
    /// `None` when no user was given or the user has not rated the item.
    pub user_rating: Option<Rating>,
}

impl ItemDetails {
    /// Details for an item with no metadata and no ratings.
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when the replica has neither metadata nor ratings for the item.
    pub fn is_absent(&self) -> bool {
        self.item.is_none() && self.distribution.is_empty()
    }
}
