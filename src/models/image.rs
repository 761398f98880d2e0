use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if width > height {
            Orientation::Landscape
        } else if height > width {
            Orientation::Portrait
        } else {
            Orientation::Square
        }
    }
}

/// Metadata extracted from an original upload, stored as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub orientation: Orientation,
    pub file_size: u64,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropRecommendations {
    pub square: f64,
    pub portrait: f64,
    pub landscape: f64,
}

/// Classification of an image produced by the AI provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub subjects: Vec<String>,
    pub style: String,
    pub mood: String,
    pub composition: String,
    pub lighting: String,
    pub colors: Vec<String>,
    pub quality_score: f64,
    pub description: String,
    pub instagram_score: f64,
    pub facebook_score: f64,
    pub linkedin_score: f64,
    pub website_hero_score: f64,
    pub website_thumbnail_score: f64,
    pub print_score: f64,
    pub best_use_cases: Vec<String>,
    pub not_recommended_for: Vec<String>,
    pub crop_recommendations: CropRecommendations,
    pub technical_notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation() {
        assert_eq!(Orientation::from_dimensions(800, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(600, 800), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(500, 500), Orientation::Square);
        assert_eq!(
            serde_json::to_string(&Orientation::Landscape).unwrap(),
            "\"LANDSCAPE\""
        );
    }
}
