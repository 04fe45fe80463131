//! Embed resolution for video lesson URLs.
//!
//! # Responsibility
//! - Recognize known hosting URL shapes and derive an embeddable URL.
//! - Degrade to a raw link for anything unrecognized.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::model::content::LessonBody;

static YOUTUBE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
        .expect("valid youtube regex")
});

const YOUTUBE_VIDEO_ID_LEN: usize = 11;
const YOUTUBE_EMBED_BASE: &str = "https://www.youtube.com/embed/";

/// What the player should render for one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerSource {
    /// Inline player URL derived from a recognized host.
    Embed { embed_url: String },
    /// Unrecognized video URL shown as a plain link.
    ExternalLink { url: String },
    /// Text lesson body.
    Text { body: String },
    /// Video lesson without a URL yet.
    Empty,
}

/// Resolves the player source for a lesson body.
pub fn resolve_player_source(body: &LessonBody) -> PlayerSource {
    match body {
        LessonBody::Text { body } => PlayerSource::Text { body: body.clone() },
        LessonBody::Video { url } => {
            let trimmed = url.trim();
            if trimmed.is_empty() {
                return PlayerSource::Empty;
            }
            match youtube_video_id(trimmed) {
                Some(video_id) => PlayerSource::Embed {
                    embed_url: format!("{YOUTUBE_EMBED_BASE}{video_id}"),
                },
                None => PlayerSource::ExternalLink { url: url.clone() },
            }
        }
    }
}

/// Extracts an 11-character YouTube video id from common URL shapes.
pub fn youtube_video_id(url: &str) -> Option<&str> {
    let captures = YOUTUBE_URL_RE.captures(url)?;
    let id = captures.get(2)?.as_str();
    (id.len() == YOUTUBE_VIDEO_ID_LEN).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(url: &str) -> LessonBody {
        LessonBody::Video {
            url: url.to_string(),
        }
    }

    #[test]
    fn watch_url_resolves_to_embed() {
        assert_eq!(
            resolve_player_source(&video("https://www.youtube.com/watch?v=dQw4w9WgXcQ")),
            PlayerSource::Embed {
                embed_url: "https://www.youtube.com/embed/dQw4w9WgXcQ".to_string()
            }
        );
    }

    #[test]
    fn short_and_embed_urls_resolve() {
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ?t=42"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn wrong_length_id_is_not_embedded() {
        assert_eq!(youtube_video_id("https://youtu.be/short"), None);
    }

    #[test]
    fn unknown_host_degrades_to_raw_link() {
        let url = "https://cdn.example.com/lectures/intro.mp4";
        assert_eq!(
            resolve_player_source(&video(url)),
            PlayerSource::ExternalLink {
                url: url.to_string()
            }
        );
    }

    #[test]
    fn blank_video_and_text_bodies() {
        assert_eq!(resolve_player_source(&video("  ")), PlayerSource::Empty);
        assert_eq!(
            resolve_player_source(&LessonBody::Text {
                body: "# Notes".to_string()
            }),
            PlayerSource::Text {
                body: "# Notes".to_string()
            }
        );
    }
}
