use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{CastMember, ContentId, ContentItem, Episode, RatingEntry, Season};

const DEFAULT_EPISODE_DURATION: &str = "45m";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieUpload {
    pub title: String,
    pub poster_url: String,
    pub duration: String,
    pub genres: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowUpload {
    pub title: String,
    pub poster_url: String,
    pub genres: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
    pub seasons: Vec<Season>,
}

/// What the admin upload form submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentUpload {
    Movie(MovieUpload),
    Show(ShowUpload),
}

impl ContentUpload {
    fn common(&self) -> (&str, &str, &str) {
        match self {
            ContentUpload::Movie(m) => (&m.title, &m.description, &m.poster_url),
            ContentUpload::Show(s) => (&s.title, &s.description, &s.poster_url),
        }
    }

    pub fn title(&self) -> &str {
        self.common().0
    }

    pub fn poster_url(&self) -> &str {
        self.common().2
    }

    fn release_year_mut(&mut self) -> &mut Option<i32> {
        match self {
            ContentUpload::Movie(m) => &mut m.release_year,
            ContentUpload::Show(s) => &mut s.release_year,
        }
    }

    pub fn validate(&self, is_new: bool) -> Result<()> {
        let (title, description, poster) = self.common();
        if title.trim().is_empty() || description.trim().is_empty() || poster.trim().is_empty()
        {
            return Err(Error::invalid(
                "Please fill out title, description, and select a poster.",
            ));
        }
        match self {
            ContentUpload::Movie(m) => {
                let has_file = m.file_name.as_deref().is_some_and(|n| !n.is_empty());
                if is_new && !has_file {
                    return Err(Error::invalid(
                        "Please select a movie file for the new upload.",
                    ));
                }
            }
            ContentUpload::Show(s) => {
                let incomplete = s.seasons.iter().flat_map(|season| &season.episodes).any(|e| {
                    e.title.trim().is_empty() || e.file_name.as_deref().map_or(true, str::is_empty)
                });
                if incomplete {
                    return Err(Error::invalid(
                        "Please ensure all episodes have a title and a file selected.",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Row written to the `content` table on save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ContentId>,
    #[serde(flatten)]
    pub upload: ContentUpload,
    pub hero_url: String,
    pub cast: Vec<CastMember>,
    pub upload_date: DateTime<Utc>,
    pub rating: f64,
    pub ratings: Vec<RatingEntry>,
}

impl ContentRecord {
    /// New items start unrated; an edit keeps the existing scores and cast.
    pub fn new(mut upload: ContentUpload, existing: Option<&ContentItem>, now: DateTime<Utc>) -> Self {
        let existing_info = existing.map(|item| item.info());
        let current: Option<i32> = *upload.release_year_mut();
        let year = current
            .or_else(|| existing_info.and_then(|i| i.release_year))
            .unwrap_or_else(|| now.year());
        *upload.release_year_mut() = Some(year);

        let hero_url = upload.poster_url().to_string();
        Self {
            id: existing.map(|item| item.id()),
            hero_url,
            cast: existing_info.map(|i| i.cast.clone()).unwrap_or_default(),
            upload_date: now,
            rating: existing_info.map(|i| i.rating).unwrap_or(0.0),
            ratings: existing_info.map(|i| i.ratings.clone()).unwrap_or_default(),
            upload,
        }
    }
}

pub fn split_genres(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn next_season_number(seasons: &[Season]) -> u32 {
    seasons
        .iter()
        .map(|s| s.season_number)
        .max()
        .map_or(1, |n| n + 1)
}

/// Blank episode appended to `season` in the upload form.
pub fn new_episode(season: &Season) -> Episode {
    Episode {
        id: format!("s{}e{}", season.season_number, season.episodes.len() + 1),
        title: String::new(),
        duration: DEFAULT_EPISODE_DURATION.to_string(),
        file_name: None,
        file_size: None,
        file_url: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn movie_upload() -> MovieUpload {
        MovieUpload {
            title: "Heat".to_string(),
            poster_url: "https://img/heat.jpg".to_string(),
            duration: "2h 50m".to_string(),
            genres: vec!["Crime".to_string()],
            description: "LA standoff".to_string(),
            release_year: None,
            file_name: Some("heat.mp4".to_string()),
            file_size: Some("1.2 GB".to_string()),
            trailer_url: None,
            file_url: Some("https://cdn/heat.mp4".to_string()),
        }
    }

    fn season(number: u32, episodes: Vec<Episode>) -> Season {
        Season {
            id: number as i64,
            season_number: number,
            episodes,
        }
    }

    #[test]
    fn requires_title_description_and_poster() {
        let mut m = movie_upload();
        m.description = "  ".to_string();
        let err = ContentUpload::Movie(m).validate(true).unwrap_err();
        assert!(err.to_string().contains("title, description"));
    }

    #[test]
    fn new_movie_needs_a_file_but_edit_does_not() {
        let mut m = movie_upload();
        m.file_name = None;
        let upload = ContentUpload::Movie(m);
        assert!(upload.validate(true).is_err());
        assert!(upload.validate(false).is_ok());
    }

    #[test]
    fn every_episode_needs_title_and_file() {
        let mut ep = new_episode(&season(1, vec![]));
        ep.title = "Pilot".to_string();
        let show = ShowUpload {
            title: "Dark".to_string(),
            poster_url: "p".to_string(),
            genres: vec![],
            description: "d".to_string(),
            release_year: None,
            trailer_url: None,
            seasons: vec![season(1, vec![ep.clone()])],
        };
        assert!(ContentUpload::Show(show.clone()).validate(true).is_err());

        let mut ok = show;
        ok.seasons[0].episodes[0].file_name = Some("pilot.mp4".to_string());
        assert!(ContentUpload::Show(ok).validate(true).is_ok());
    }

    #[test]
    fn record_for_new_item_starts_unrated_with_hero_from_poster() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let record = ContentRecord::new(ContentUpload::Movie(movie_upload()), None, now);
        assert_eq!(record.id, None);
        assert_eq!(record.hero_url, "https://img/heat.jpg");
        assert!(record.ratings.is_empty());

        let row = serde_json::to_value(&record).unwrap();
        assert_eq!(row["type"], "movie");
        assert_eq!(row["release_year"], 2025);
        assert_eq!(row["rating"], 0.0);
        assert!(row.get("id").is_none());
        assert!(row.get("seasons").is_none());
    }

    #[test]
    fn record_for_edit_keeps_id_and_ratings() {
        let existing: ContentItem = serde_json::from_value(json!({
            "id": 12,
            "type": "movie",
            "title": "Heat",
            "rating": 9.0,
            "ratings": [{ "userId": "u1", "rating": 9 }],
            "release_year": 1995
        }))
        .unwrap();
        let record = ContentRecord::new(
            ContentUpload::Movie(movie_upload()),
            Some(&existing),
            Utc::now(),
        );
        assert_eq!(record.id, Some(12));
        assert_eq!(record.rating, 9.0);
        assert_eq!(record.ratings.len(), 1);
        let row = serde_json::to_value(&record).unwrap();
        assert_eq!(row["id"], 12);
        assert_eq!(row["release_year"], 1995);
    }

    #[test]
    fn form_helpers() {
        assert_eq!(split_genres("Drama, Sci-Fi,, "), vec!["Drama", "Sci-Fi"]);
        assert_eq!(next_season_number(&[]), 1);
        let seasons = vec![season(1, vec![]), season(3, vec![])];
        assert_eq!(next_season_number(&seasons), 4);

        let s2 = season(2, vec![new_episode(&season(2, vec![]))]);
        let ep = new_episode(&s2);
        assert_eq!(ep.id, "s2e2");
        assert_eq!(ep.duration, "45m");
    }
}
