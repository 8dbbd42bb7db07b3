//! Read-only views over the loaded catalog: search, dashboards and recommendations.
use chrono::Datelike;
use std::collections::{HashMap, HashSet};

use crate::models::ContentItem;
use crate::rating;
use crate::utils::size_label_to_gb;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_content: usize,
    pub storage_gb: f64,
    pub average_rating: f64,
}

/// Case-insensitive title match; an empty query matches everything.
pub fn search<'a>(items: &'a [ContentItem], query: &str) -> Vec<&'a ContentItem> {
    let needle = query.trim().to_lowercase();
    items
        .iter()
        .filter(|item| needle.is_empty() || item.title().to_lowercase().contains(&needle))
        .collect()
}

/// Newest uploads first; items without a date sort last.
pub fn recent_uploads(items: &[ContentItem], limit: usize) -> Vec<&ContentItem> {
    let mut sorted: Vec<&ContentItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.info().upload_date.cmp(&a.info().upload_date));
    sorted.truncate(limit);
    sorted
}

/// Unwatched items in the most-watched genre. Without history, the head of the catalog.
pub fn recommendations<'a>(
    catalog: &'a [ContentItem],
    watched: &[&ContentItem],
    limit: usize,
) -> Vec<&'a ContentItem> {
    if watched.is_empty() {
        return catalog.iter().take(limit).collect();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for genre in watched.iter().flat_map(|item| item.info().genres.iter()) {
        match counts.iter_mut().find(|(g, _)| *g == genre.as_str()) {
            Some((_, n)) => *n += 1,
            None => counts.push((genre, 1)),
        }
    }
    let mut favorite: Option<(&str, usize)> = None;
    for (genre, n) in counts {
        if favorite.map_or(true, |(_, best)| n > best) {
            favorite = Some((genre, n));
        }
    }
    let Some((favorite, _)) = favorite else {
        return Vec::new();
    };

    let watched_ids: HashSet<_> = watched.iter().map(|item| item.id()).collect();
    catalog
        .iter()
        .filter(|item| !watched_ids.contains(&item.id()))
        .filter(|item| item.info().genres.iter().any(|g| g == favorite))
        .take(limit)
        .collect()
}

pub fn dashboard_stats(items: &[ContentItem]) -> DashboardStats {
    let storage_gb = items
        .iter()
        .flat_map(|item| item.file_sizes())
        .map(size_label_to_gb)
        .sum();
    let average_rating = if items.is_empty() {
        0.0
    } else {
        items.iter().map(|item| item.info().rating).sum::<f64>() / items.len() as f64
    };
    DashboardStats {
        total_content: items.len(),
        storage_gb,
        average_rating,
    }
}

/// Titles per genre, most common first.
pub fn genre_breakdown(items: &[ContentItem]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for genre in items.iter().flat_map(|item| item.info().genres.iter()) {
        *counts.entry(genre.as_str()).or_default() += 1;
    }
    let mut out: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(g, n)| (g.to_string(), n))
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

/// Upload counts for each month (Jan..Dec) of `year`.
pub fn monthly_uploads(items: &[ContentItem], year: i32) -> [usize; 12] {
    let mut months = [0usize; 12];
    for date in items.iter().filter_map(|item| item.info().upload_date) {
        if date.year() == year {
            months[date.month0() as usize] += 1;
        }
    }
    months
}

/// The aggregate a user sees for an item, with their own score when they rated it.
pub fn rating_summary(item: &ContentItem, user_id: Option<&str>) -> (f64, Option<u8>) {
    let info = item.info();
    let own = user_id.and_then(|id| rating::user_rating(&info.ratings, id));
    (info.rating, own)
}
