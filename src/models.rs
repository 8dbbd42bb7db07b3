use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type ContentId = i64;

/// Backend rows may carry `null` for list columns; treat those as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub image_url: String,
}

/// One user's score for one item, stored inside the `ratings` JSON column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingEntry {
    pub user_id: String,
    pub rating: u8,
}

/// Seasons and episodes live inside the `seasons` JSON column, keyed the way the
/// client writes them (camelCase), unlike the snake_case table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: i64,
    pub season_number: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: Vec<Episode>,
}

/// Fields shared by every kind of catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: ContentId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub poster_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hero_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ratings: Vec<RatingEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cast: Vec<CastMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(flatten)]
    pub info: ContentInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TvShow {
    #[serde(flatten)]
    pub info: ContentInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub seasons: Vec<Season>,
}

impl TvShow {
    pub fn season(&self, season_number: u32) -> Option<&Season> {
        self.seasons
            .iter()
            .find(|s| s.season_number == season_number)
    }

    pub fn episode(&self, episode_id: &str) -> Option<&Episode> {
        self.seasons
            .iter()
            .flat_map(|s| s.episodes.iter())
            .find(|e| e.id == episode_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Movie(Movie),
    Show(TvShow),
}

impl ContentItem {
    pub fn info(&self) -> &ContentInfo {
        match self {
            ContentItem::Movie(m) => &m.info,
            ContentItem::Show(s) => &s.info,
        }
    }

    pub fn info_mut(&mut self) -> &mut ContentInfo {
        match self {
            ContentItem::Movie(m) => &mut m.info,
            ContentItem::Show(s) => &mut s.info,
        }
    }

    pub fn id(&self) -> ContentId {
        self.info().id
    }

    pub fn title(&self) -> &str {
        &self.info().title
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ContentItem::Movie(_) => "movie",
            ContentItem::Show(_) => "show",
        }
    }

    /// File sizes as entered on upload: the movie file, or every episode file.
    pub fn file_sizes(&self) -> Vec<&str> {
        match self {
            ContentItem::Movie(m) => m.file_size.as_deref().into_iter().collect(),
            ContentItem::Show(s) => s
                .seasons
                .iter()
                .flat_map(|season| season.episodes.iter())
                .filter_map(|e| e.file_size.as_deref())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub username: String,
    pub profile_image_url: Option<String>,
}

/// Row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_movie_row_and_ignores_show_columns() {
        let row = json!({
            "id": 7,
            "type": "movie",
            "title": "Arrival",
            "poster_url": "p.jpg",
            "hero_url": "h.jpg",
            "rating": 8.5,
            "ratings": [{ "userId": "u1", "rating": 8 }, { "userId": "u2", "rating": 9 }],
            "genres": ["Sci-Fi"],
            "description": "Linguist meets heptapods",
            "cast": null,
            "duration": "1h 56m",
            "file_name": "arrival.mp4",
            "file_size": "1.4 GB",
            "file_url": "https://cdn/arrival.mp4",
            "seasons": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "upload_date": "2024-05-01T10:00:00Z"
        });
        let item: ContentItem = serde_json::from_value(row).expect("movie row");
        let ContentItem::Movie(movie) = &item else {
            panic!("expected movie, got {:?}", item);
        };
        assert_eq!(movie.info.id, 7);
        assert_eq!(movie.info.ratings.len(), 2);
        assert!(movie.info.cast.is_empty());
        assert_eq!(movie.file_name.as_deref(), Some("arrival.mp4"));
        assert_eq!(item.file_sizes(), vec!["1.4 GB"]);
    }

    #[test]
    fn decodes_show_row_with_nested_episodes() {
        let row = json!({
            "id": 9,
            "type": "show",
            "title": "Dark",
            "genres": ["Mystery"],
            "duration": null,
            "seasons": [{
                "id": 1,
                "seasonNumber": 1,
                "episodes": [
                    { "id": "s1e1", "title": "Secrets", "duration": "51m", "fileSize": "500 MB" },
                    { "id": "s1e2", "title": "Lies", "duration": "44m" }
                ]
            }]
        });
        let item: ContentItem = serde_json::from_value(row).expect("show row");
        let ContentItem::Show(show) = &item else {
            panic!("expected show");
        };
        assert_eq!(show.season(1).map(|s| s.episodes.len()), Some(2));
        assert_eq!(show.episode("s1e2").map(|e| e.title.as_str()), Some("Lies"));
        assert_eq!(item.file_sizes(), vec!["500 MB"]);
        assert_eq!(item.kind(), "show");
    }

    #[test]
    fn serializes_with_type_tag_and_camel_case_ratings() {
        let item = ContentItem::Movie(Movie {
            info: ContentInfo {
                id: 1,
                title: "Heat".to_string(),
                poster_url: String::new(),
                hero_url: String::new(),
                rating: 7.0,
                ratings: vec![RatingEntry {
                    user_id: "u1".to_string(),
                    rating: 7,
                }],
                genres: vec![],
                description: String::new(),
                cast: vec![],
                release_year: None,
                upload_date: None,
                trailer_url: None,
            },
            duration: "2h 50m".to_string(),
            file_name: None,
            file_size: None,
            file_url: None,
        });
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "movie");
        assert_eq!(value["ratings"][0]["userId"], "u1");
        assert!(value.get("seasons").is_none());
    }
}
