use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoseAnalysis {
    pub facing_direction: String,
    pub shoulder_width: String,
    pub torso_angle: String,
    pub arms_position: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClothingAnalysis {
    pub current_clothing: String,
    pub color: String,
    pub fit: String,
    pub style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorsoRecommendations {
    #[serde(default)]
    pub suitable_clothing_types: Vec<String>,
    pub size_guidance: String,
    #[serde(default)]
    pub style_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorsoAnalysis {
    pub torso_detected: bool,
    pub torso_bbox: Option<BoundingBox>,
    pub pose_analysis: Option<PoseAnalysis>,
    pub clothing_analysis: Option<ClothingAnalysis>,
    pub recommendations: Option<TorsoRecommendations>,
}

impl TorsoAnalysis {
    /// Neutral analysis used when the model's answer cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            torso_detected: true,
            torso_bbox: Some(BoundingBox {
                x: 100,
                y: 100,
                width: 200,
                height: 300,
            }),
            pose_analysis: Some(PoseAnalysis {
                facing_direction: "front".into(),
                shoulder_width: "medium".into(),
                torso_angle: "straight".into(),
                arms_position: "down".into(),
            }),
            clothing_analysis: Some(ClothingAnalysis {
                current_clothing: "shirt".into(),
                color: "unknown".into(),
                fit: "fitted".into(),
                style: "casual".into(),
            }),
            recommendations: Some(TorsoRecommendations {
                suitable_clothing_types: vec!["shirt".into(), "jacket".into(), "dress".into()],
                size_guidance: "m".into(),
                style_suggestions: vec!["casual".into(), "formal".into()],
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitRecommendations {
    pub size_adjustment: String,
    pub style_notes: String,
    pub color_notes: String,
    pub overall_verdict: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FitAnalysis {
    pub compatibility_score: f64,
    pub size_match: String,
    pub style_match: String,
    pub color_harmony: String,
    pub recommendations: Option<FitRecommendations>,
    #[serde(default)]
    pub visual_notes: String,
}

impl FitAnalysis {
    pub fn fallback() -> Self {
        Self {
            compatibility_score: 75.0,
            size_match: "good".into(),
            style_match: "good".into(),
            color_harmony: "good".into(),
            recommendations: Some(FitRecommendations {
                size_adjustment: "perfect".into(),
                style_notes: "The garment looks suitable for the person's style".into(),
                color_notes: "The colors work well together".into(),
                overall_verdict: "recommended".into(),
            }),
            visual_notes: "Basic analysis, trying the garment on is recommended".into(),
        }
    }
}

/// Parses the outermost `{...}` block of model text into `T`.
///
/// Returns `None` when there is no braced block or it does not match `T`;
/// callers substitute their fallback.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
