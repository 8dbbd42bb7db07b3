use crate::error::{Error, Result};
use crate::models::RatingEntry;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

/// A score in `1..=10`. Construct through [`Rating::new`] so out-of-range values
/// never reach the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: i64) -> Result<Self> {
        if (MIN_RATING as i64..=MAX_RATING as i64).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(Error::invalid(format!(
                "rating must be between {} and {}, got {}",
                MIN_RATING, MAX_RATING, value
            )))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingUpdate {
    pub ratings: Vec<RatingEntry>,
    pub aggregate: f64,
}

/// Merge `user_id`'s score into `entries`: replace in place if the user already
/// rated, append otherwise. The aggregate is the unrounded mean after the merge.
pub fn merge_rating(entries: &[RatingEntry], user_id: &str, rating: Rating) -> RatingUpdate {
    let mut ratings = entries.to_vec();
    match ratings.iter_mut().find(|e| e.user_id == user_id) {
        Some(existing) => existing.rating = rating.value(),
        None => ratings.push(RatingEntry {
            user_id: user_id.to_string(),
            rating: rating.value(),
        }),
    }
    let aggregate = mean(&ratings);
    RatingUpdate { ratings, aggregate }
}

pub fn mean(entries: &[RatingEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let total: u64 = entries.iter().map(|e| e.rating as u64).sum();
    total as f64 / entries.len() as f64
}

pub fn user_rating(entries: &[RatingEntry], user_id: &str) -> Option<u8> {
    entries
        .iter()
        .find(|e| e.user_id == user_id)
        .map(|e| e.rating)
}
