//! Wire shapes for the external release API (spec §4.6, §6). Field names
//! follow Discogs' own release/search JSON; only what the metadata service
//! needs is modeled.

use serde::Deserialize;

use crate::models::{ExternalReleaseRef, TrackRef};

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsSearchResponse {
    #[serde(default)]
    pub results: Vec<DiscogsSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsSearchResult {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(rename = "resource_url")]
    pub resource_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsRelease {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<DiscogsArtist>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub tracklist: Vec<DiscogsTrack>,
    #[serde(default)]
    pub images: Vec<DiscogsImage>,
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsTrack {
    pub position: Option<String>,
    pub title: String,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsImage {
    #[serde(rename = "type")]
    pub image_type: String,
    pub uri: String,
}

impl DiscogsRelease {
    pub fn into_release_ref(self) -> ExternalReleaseRef {
        let artist = self
            .artists
            .first()
            .map(|a| a.name.trim().to_string())
            .unwrap_or_else(|| "Various".to_string());

        ExternalReleaseRef {
            release_id: self.id,
            release_url: self.uri,
            title: self.title,
            artist,
            year: self.year,
            tracklist: self
                .tracklist
                .into_iter()
                .map(|t| TrackRef {
                    position: t.position,
                    title: t.title,
                    duration: t.duration.as_deref().and_then(parse_duration_to_secs),
                })
                .collect(),
        }
    }

    pub fn primary_artwork_url(&self) -> Option<String> {
        self.images
            .iter()
            .find(|img| img.image_type == "primary")
            .or_else(|| self.images.first())
            .map(|img| img.uri.clone())
    }
}

/// Parses `"mm:ss"` into whole seconds; returns `None` for anything else.
fn parse_duration_to_secs(raw: &str) -> Option<u32> {
    let (min, sec) = raw.split_once(':')?;
    let min: u32 = min.trim().parse().ok()?;
    let sec: u32 = sec.trim().parse().ok()?;
    Some(min * 60 + sec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mmss_duration() {
        assert_eq!(parse_duration_to_secs("3:45"), Some(225));
        assert_eq!(parse_duration_to_secs("not-a-duration"), None);
    }

    #[test]
    fn picks_primary_image_when_present() {
        let release = DiscogsRelease {
            id: 1,
            title: "T".into(),
            artists: vec![],
            year: None,
            tracklist: vec![],
            images: vec![
                DiscogsImage { image_type: "secondary".into(), uri: "b.jpg".into() },
                DiscogsImage { image_type: "primary".into(), uri: "a.jpg".into() },
            ],
            uri: "https://discogs.com/release/1".into(),
        };
        assert_eq!(release.primary_artwork_url(), Some("a.jpg".to_string()));
    }
}
