use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, StudioError};
use crate::models::{ImageUploadSet, OutputKind, ResponseModality, MAX_IMAGES};

pub const MAX_ANGLES: usize = 6;
pub const DEFAULT_ANGLES: [&str; 3] = ["front", "side", "back"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClothingType {
    #[default]
    Shirt,
    Dress,
    Jacket,
    Pants,
    Sweater,
}

impl ClothingType {
    /// Unknown garments are treated as shirts.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "dress" => ClothingType::Dress,
            "jacket" | "coat" => ClothingType::Jacket,
            "pants" | "trousers" => ClothingType::Pants,
            "sweater" => ClothingType::Sweater,
            _ => ClothingType::Shirt,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClothingType::Shirt => "shirt",
            ClothingType::Dress => "dress",
            ClothingType::Jacket => "jacket",
            ClothingType::Pants => "pants",
            ClothingType::Sweater => "sweater",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnhancementType {
    #[default]
    Realistic,
    Professional,
    Natural,
}

impl EnhancementType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "professional" => EnhancementType::Professional,
            "natural" => EnhancementType::Natural,
            _ => EnhancementType::Realistic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnhancementType::Realistic => "realistic",
            EnhancementType::Professional => "professional",
            EnhancementType::Natural => "natural",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StylePreferences {
    pub fit: Option<String>,
    pub occasion: Option<String>,
    pub mood: Option<String>,
}

impl StylePreferences {
    pub fn is_empty(&self) -> bool {
        self.fit.is_none() && self.occasion.is_none() && self.mood.is_none()
    }
}

/// Endpoint discriminant, before form options are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Mix,
    VirtualTryOn,
    DetectTorso,
    AnalyzeClothingFit,
    MultipleAngles,
    Enhance,
}

impl FeatureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Mix => "mix-images",
            FeatureKind::VirtualTryOn => "virtual-try-on",
            FeatureKind::DetectTorso => "detect-torso",
            FeatureKind::AnalyzeClothingFit => "analyze-clothing-fit",
            FeatureKind::MultipleAngles => "generate-multiple-angles",
            FeatureKind::Enhance => "enhance-image",
        }
    }

    /// Upload field names whose order matters for two-image features.
    pub fn image_roles(&self) -> &'static [&'static str] {
        match self {
            FeatureKind::VirtualTryOn
            | FeatureKind::AnalyzeClothingFit
            | FeatureKind::MultipleAngles => &["person_image", "clothing_image"],
            FeatureKind::DetectTorso | FeatureKind::Enhance => &["image"],
            FeatureKind::Mix => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    Mix,
    VirtualTryOn {
        clothing_type: ClothingType,
        style: StylePreferences,
    },
    DetectTorso,
    AnalyzeClothingFit,
    MultipleAngles {
        angles: Vec<String>,
    },
    Enhance {
        enhancement: EnhancementType,
    },
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

impl Feature {
    pub fn from_form(kind: FeatureKind, fields: &HashMap<String, String>) -> Result<Self> {
        let feature = match kind {
            FeatureKind::Mix => Feature::Mix,
            FeatureKind::VirtualTryOn => Feature::VirtualTryOn {
                clothing_type: field(fields, "clothing_type")
                    .map(ClothingType::parse)
                    .unwrap_or_default(),
                style: StylePreferences {
                    fit: field(fields, "fit").map(String::from),
                    occasion: field(fields, "occasion").map(String::from),
                    mood: field(fields, "mood").map(String::from),
                },
            },
            FeatureKind::DetectTorso => Feature::DetectTorso,
            FeatureKind::AnalyzeClothingFit => Feature::AnalyzeClothingFit,
            FeatureKind::MultipleAngles => {
                let angles = match field(fields, "angles") {
                    Some(raw) => parse_angles(raw)?,
                    None => DEFAULT_ANGLES.iter().map(|a| a.to_string()).collect(),
                };
                Feature::MultipleAngles { angles }
            }
            FeatureKind::Enhance => Feature::Enhance {
                enhancement: field(fields, "enhancement_type")
                    .map(EnhancementType::parse)
                    .unwrap_or_default(),
            },
        };
        Ok(feature)
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::Mix => FeatureKind::Mix,
            Feature::VirtualTryOn { .. } => FeatureKind::VirtualTryOn,
            Feature::DetectTorso => FeatureKind::DetectTorso,
            Feature::AnalyzeClothingFit => FeatureKind::AnalyzeClothingFit,
            Feature::MultipleAngles { .. } => FeatureKind::MultipleAngles,
            Feature::Enhance { .. } => FeatureKind::Enhance,
        }
    }

    pub fn image_count(&self) -> RangeInclusive<usize> {
        match self {
            Feature::Mix => 1..=MAX_IMAGES,
            Feature::DetectTorso | Feature::Enhance { .. } => 1..=1,
            Feature::VirtualTryOn { .. }
            | Feature::AnalyzeClothingFit
            | Feature::MultipleAngles { .. } => 2..=2,
        }
    }

    pub fn validate_count(&self, count: usize) -> Result<()> {
        let range = self.image_count();
        if range.contains(&count) {
            return Ok(());
        }
        let expected = if range.start() == range.end() {
            format!("exactly {}", range.start())
        } else {
            format!("between {} and {}", range.start(), range.end())
        };
        Err(StudioError::ValidationError(format!(
            "{} requires {} image(s), got {}",
            self.kind().as_str(),
            expected,
            count
        )))
    }

    pub fn output_kind(&self) -> OutputKind {
        match self {
            Feature::DetectTorso | Feature::AnalyzeClothingFit => OutputKind::Analysis,
            _ => OutputKind::Images,
        }
    }

    pub fn modalities(&self) -> Vec<ResponseModality> {
        match self {
            Feature::Mix | Feature::VirtualTryOn { .. } => {
                vec![ResponseModality::Image, ResponseModality::Text]
            }
            Feature::MultipleAngles { .. } | Feature::Enhance { .. } => {
                vec![ResponseModality::Image]
            }
            Feature::DetectTorso | Feature::AnalyzeClothingFit => vec![ResponseModality::Text],
        }
    }

    pub fn temperature(&self) -> Option<f32> {
        match self {
            Feature::Mix => None,
            Feature::VirtualTryOn { .. } | Feature::MultipleAngles { .. } => Some(0.3),
            Feature::Enhance { .. } | Feature::AnalyzeClothingFit => Some(0.2),
            Feature::DetectTorso => Some(0.1),
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            Feature::Mix => "remixed_image",
            Feature::VirtualTryOn { .. } => "try_on",
            Feature::MultipleAngles { .. } => "angle",
            Feature::Enhance { .. } => "enhanced",
            Feature::DetectTorso => "torso",
            Feature::AnalyzeClothingFit => "fit",
        }
    }
}

fn parse_angles(raw: &str) -> Result<Vec<String>> {
    let angles: Vec<String> = raw
        .split(',')
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
        .collect();

    if angles.is_empty() {
        return Ok(DEFAULT_ANGLES.iter().map(|a| a.to_string()).collect());
    }
    if angles.len() > MAX_ANGLES {
        return Err(StudioError::ValidationError(format!(
            "At most {} angles can be requested, got {}",
            MAX_ANGLES,
            angles.len()
        )));
    }
    if let Some(bad) = angles
        .iter()
        .find(|a| !a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ' '))
    {
        return Err(StudioError::ValidationError(format!(
            "Invalid angle name '{}'",
            bad
        )));
    }
    Ok(angles)
}

/// Checks a caller-supplied output directory: relative, no parent components.
pub fn validate_output_dir(raw: &str) -> Result<PathBuf> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(StudioError::ValidationError(
            "output_dir must not be empty".into(),
        ));
    }
    let path = Path::new(trimmed);
    let escapes = path.components().any(|c| {
        !matches!(
            c,
            std::path::Component::Normal(_) | std::path::Component::CurDir
        )
    });
    if escapes {
        return Err(StudioError::ValidationError(format!(
            "output_dir '{}' must be a relative path inside the working directory",
            trimmed
        )));
    }
    Ok(path.to_path_buf())
}

/// Everything needed to serve one call. Built once per request and never mutated.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    feature: Feature,
    images: ImageUploadSet,
    prompt: Option<String>,
    output_dir: PathBuf,
}

impl GenerationRequest {
    pub fn new(
        feature: Feature,
        images: ImageUploadSet,
        prompt: Option<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        feature.validate_count(images.len())?;
        Ok(Self {
            feature,
            images,
            prompt,
            output_dir: output_dir.into(),
        })
    }

    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn images(&self) -> &ImageUploadSet {
        &self.images
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationResult {
    pub success: bool,
    pub generated_files: Vec<String>,
    pub message: Option<String>,
    pub text_output: Option<String>,
    pub analysis: Option<serde_json::Value>,
}
