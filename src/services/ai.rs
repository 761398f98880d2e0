use base64::Engine;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::image::{AiAnalysis, CropRecommendations};
use crate::services::handlers::{HandlerError, JobHandler};
use crate::services::media::{mime_type_for, MediaError, MediaLibrary};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

const ANALYSIS_PROMPT: &str = concat!(
    "Analyze this image for a media asset management system. ",
    "Provide comprehensive classification for marketing use.\n\n",
    "Return ONLY valid JSON with these fields: ",
    "subjects (array of specific main subjects), ",
    "style (documentary, editorial, commercial, artistic, candid, posed, dramatic, minimalist), ",
    "mood (energetic, peaceful, dramatic, intimate, celebratory, melancholic, powerful, serene), ",
    "composition (rule-of-thirds, centered, symmetrical, leading-lines, frame-within-frame, diagonal, golden-ratio), ",
    "lighting (golden-hour, harsh-midday, soft-diffused, dramatic-backlit, studio, natural-overcast, sunset, sunrise), ",
    "colors (top 3-5 dominant colors with specific names like \"burnt-orange\"), ",
    "qualityScore (technical quality 0-10), ",
    "description (2-3 sentences), ",
    "instagramScore, facebookScore, linkedinScore, websiteHeroScore, websiteThumbnailScore, printScore ",
    "(platform suitability, each 0-10), ",
    "bestUseCases (3-5 specific use cases the image is perfect for), ",
    "notRecommendedFor (2-3 unsuitable use cases and why), ",
    "cropRecommendations (object with square, portrait, landscape crop viability, each 0-10), ",
    "technicalNotes (one sentence about technical considerations)."
);

/// Client for the Anthropic Messages API, used to classify gallery images.
pub struct AiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
        }
    }

    /// Send an image to the model and parse its classification.
    pub async fn analyze_image(&self, image_bytes: &[u8], mime_type: &str) -> Result<AiAnalysis, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": mime_type,
                            "data": base64::engine::general_purpose::STANDARD.encode(image_bytes),
                        }
                    },
                    { "type": "text", "text": ANALYSIS_PROMPT }
                ]
            }]
        });

        tracing::debug!(model = %self.model, mime_type, bytes = image_bytes.len(), "Sending image to AI provider");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let message: MessagesResponse = response.json().await?;
        let text = message
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .unwrap_or_default();

        parse_analysis(&text)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawAnalysis {
    subjects: Option<Vec<String>>,
    style: Option<String>,
    mood: Option<String>,
    composition: Option<String>,
    lighting: Option<String>,
    colors: Option<Vec<String>>,
    quality_score: Option<f64>,
    description: Option<String>,
    instagram_score: Option<f64>,
    facebook_score: Option<f64>,
    linkedin_score: Option<f64>,
    website_hero_score: Option<f64>,
    website_thumbnail_score: Option<f64>,
    print_score: Option<f64>,
    best_use_cases: Option<Vec<String>>,
    not_recommended_for: Option<Vec<String>>,
    crop_recommendations: Option<RawCrops>,
    technical_notes: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawCrops {
    square: Option<f64>,
    portrait: Option<f64>,
    landscape: Option<f64>,
}

/// Missing or zero scores fall back to 5; all scores are clamped to 0..=10.
fn score(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v != 0.0 && v.is_finite() => v.clamp(0.0, 10.0),
        _ => 5.0,
    }
}

fn text_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Extract the outermost JSON object from a model reply and normalize it.
pub fn parse_analysis(text: &str) -> Result<AiAnalysis, AiError> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            let preview: String = text.chars().take(200).collect();
            tracing::warn!(reply = %preview, "No JSON in AI reply");
            return Err(AiError::NoJson);
        }
    };
    let raw: RawAnalysis = serde_json::from_str(json)?;
    let crops = raw.crop_recommendations.unwrap_or_default();

    Ok(AiAnalysis {
        subjects: raw.subjects.unwrap_or_default(),
        style: text_or(raw.style, "unknown"),
        mood: text_or(raw.mood, "neutral"),
        composition: text_or(raw.composition, "unknown"),
        lighting: text_or(raw.lighting, "unknown"),
        colors: raw.colors.unwrap_or_default(),
        quality_score: score(raw.quality_score),
        description: raw.description.unwrap_or_default(),
        instagram_score: score(raw.instagram_score),
        facebook_score: score(raw.facebook_score),
        linkedin_score: score(raw.linkedin_score),
        website_hero_score: score(raw.website_hero_score),
        website_thumbnail_score: score(raw.website_thumbnail_score),
        print_score: score(raw.print_score),
        best_use_cases: raw.best_use_cases.unwrap_or_default(),
        not_recommended_for: raw.not_recommended_for.unwrap_or_default(),
        crop_recommendations: CropRecommendations {
            square: score(crops.square),
            portrait: score(crops.portrait),
            landscape: score(crops.landscape),
        },
        technical_notes: text_or(raw.technical_notes, "No technical notes available"),
    })
}

/// Job handler running AI analysis for a stored original.
#[derive(Clone)]
pub struct AiAnalyzer {
    client: Arc<AiClient>,
    media: MediaLibrary,
}

impl AiAnalyzer {
    pub fn new(client: Arc<AiClient>, media: MediaLibrary) -> Self {
        Self { client, media }
    }

    pub async fn analyze(&self, resource_id: &str) -> Result<AiAnalysis, AiError> {
        let bytes = self.media.read_original(resource_id).await?;
        let analysis = self
            .client
            .analyze_image(&bytes, mime_type_for(resource_id))
            .await?;

        let sidecar = self.media.analysis_path(resource_id)?;
        self.media.write_json(&sidecar, &analysis).await?;

        tracing::info!(
            resource_id,
            subjects = analysis.subjects.len(),
            quality = analysis.quality_score,
            "AI analysis stored"
        );
        Ok(analysis)
    }
}

impl JobHandler for AiAnalyzer {
    fn handle(&self, resource_id: String) -> BoxFuture<'static, Result<(), HandlerError>> {
        let analyzer = self.clone();
        Box::pin(async move {
            analyzer
                .analyze(&resource_id)
                .await
                .map(|_| ())
                .map_err(|e| HandlerError::from_error(&e))
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("ANTHROPIC_API_KEY environment variable is not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("No valid JSON found in response")]
    NoJson,

    #[error("Failed to parse AI analysis: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Media(#[from] MediaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extracts_json_and_clamps_scores() {
        let reply = r#"Here is the analysis:
        {"subjects": ["horse", "barn"], "style": "documentary", "qualityScore": 14,
         "instagramScore": -2, "printScore": 7.5,
         "cropRecommendations": {"square": 8.5}} Hope this helps."#;

        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.subjects, vec!["horse", "barn"]);
        assert_eq!(analysis.style, "documentary");
        assert_eq!(analysis.quality_score, 10.0);
        assert_eq!(analysis.instagram_score, 0.0);
        assert_eq!(analysis.print_score, 7.5);
        assert_eq!(analysis.facebook_score, 5.0);
        assert_eq!(analysis.crop_recommendations.square, 8.5);
        assert_eq!(analysis.crop_recommendations.portrait, 5.0);
    }

    #[test]
    fn test_parse_fills_defaults() {
        let analysis = parse_analysis("{}").unwrap();
        assert_eq!(analysis.mood, "neutral");
        assert_eq!(analysis.lighting, "unknown");
        assert_eq!(analysis.technical_notes, "No technical notes available");
        assert!(analysis.colors.is_empty());
    }

    #[test]
    fn test_parse_rejects_reply_without_json() {
        assert!(matches!(parse_analysis("I cannot help with that"), Err(AiError::NoJson)));
        assert!(matches!(parse_analysis("{not json}"), Err(AiError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let client = AiClient::new("http://127.0.0.1:9", None, "claude-3-haiku-20240307");
        let err = client.analyze_image(b"bytes", "image/png").await.unwrap_err();
        assert_eq!(err.to_string(), "ANTHROPIC_API_KEY environment variable is not set");
    }
}
