//! Prompt text sent to the model for each feature.

use crate::models::{ClothingType, EnhancementType, Feature, StylePreferences};

const MIX_SINGLE: &str = "Turn this image into a professional quality studio shoot with better lighting and depth of field.";

const MIX_MULTIPLE: &str =
    "Combine the subjects of these images in a natural way, producing a new image.";

const DETECT_TORSO: &str = r#"Analyze this image of a person and detect the human torso.
Return the following information as JSON:

{
    "torso_detected": boolean,
    "torso_bbox": {"x": int, "y": int, "width": int, "height": int},
    "pose_analysis": {
        "facing_direction": "front|side|back|angle",
        "shoulder_width": "narrow|medium|wide",
        "torso_angle": "straight|slight_lean|strong_lean",
        "arms_position": "down|up|side|crossed"
    },
    "clothing_analysis": {
        "current_clothing": "shirt|dress|jacket|tank_top|sweater|other",
        "color": "string",
        "fit": "tight|loose|fitted",
        "style": "casual|formal|sporty|elegant"
    },
    "recommendations": {
        "suitable_clothing_types": ["shirt", "jacket", "dress"],
        "size_guidance": "xs|s|m|l|xl|xxl",
        "style_suggestions": ["casual", "formal", "sporty"]
    }
}

Be precise about the torso location and give exact pixel coordinates."#;

const ANALYZE_FIT: &str = r#"Analyze these two images: a person and a garment.
Decide whether the garment suits this person, considering:

1. Size and proportions
2. Style and personality
3. Color and contrast
4. Occasion of use

Answer as JSON:

{
    "compatibility_score": float (0-100),
    "size_match": "perfect|good|fair|poor",
    "style_match": "excellent|good|fair|poor",
    "color_harmony": "excellent|good|fair|poor",
    "recommendations": {
        "size_adjustment": "perfect|size_up|size_down",
        "style_notes": "string",
        "color_notes": "string",
        "overall_verdict": "highly_recommended|recommended|consider_alternatives|not_recommended"
    },
    "visual_notes": "string"
}"#;

/// Returns the caller's prompt when it has content, otherwise the feature default.
///
/// `image_count` selects between the single-image and multi-image mix defaults.
/// Multi-angle requests build one prompt per angle with [`angle_prompt`].
pub fn build_prompt(feature: &Feature, image_count: usize, user_prompt: Option<&str>) -> String {
    if let Some(prompt) = user_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        return prompt.to_string();
    }

    match feature {
        Feature::Mix if image_count <= 1 => MIX_SINGLE.to_string(),
        Feature::Mix => MIX_MULTIPLE.to_string(),
        Feature::VirtualTryOn {
            clothing_type,
            style,
        } => try_on_prompt(*clothing_type, style),
        Feature::DetectTorso => DETECT_TORSO.to_string(),
        Feature::AnalyzeClothingFit => ANALYZE_FIT.to_string(),
        Feature::MultipleAngles { angles } => angles
            .first()
            .map(|angle| angle_prompt(angle))
            .unwrap_or_else(|| angle_prompt("front")),
        Feature::Enhance { enhancement } => enhance_prompt(*enhancement).to_string(),
    }
}

pub fn angle_prompt(angle: &str) -> String {
    format!(
        "Create a {angle} view of the person wearing this garment.\n\
         Make sure that:\n\
         - The pose is appropriate to show the garment from the {angle} angle\n\
         - The garment looks natural and well fitted\n\
         - The garment details visible from this angle are clear\n\
         - The lighting is consistent and realistic"
    )
}

fn try_on_prompt(clothing_type: ClothingType, style: &StylePreferences) -> String {
    let mut prompt = match clothing_type {
        ClothingType::Shirt => "Overlay this garment (shirt/t-shirt) on the person realistically.\n\
             Make sure that:\n\
             - The garment fits the person's body naturally\n\
             - Folds and shadows look realistic\n\
             - The garment's color and texture are preserved\n\
             - The person's pose and proportions are preserved\n\
             - The lighting is consistent",
        ClothingType::Dress => "Overlay this dress on the person in an elegant, realistic way.\n\
             Make sure that:\n\
             - The dress follows the person's silhouette\n\
             - The drape and folds of the dress look natural\n\
             - Color and texture stay faithful to the original\n\
             - The person's pose suits the dress\n\
             - The lighting brings out the dress details",
        ClothingType::Jacket => "Overlay this jacket/coat on the person realistically.\n\
             Make sure that:\n\
             - The jacket sits correctly on the shoulders and torso\n\
             - Buttons, zippers and details are clearly visible\n\
             - Material and texture stay authentic\n\
             - The pose shows the jacket well\n\
             - Shadows and folds are realistic",
        ClothingType::Pants => "Overlay these pants on the person naturally.\n\
             Make sure that:\n\
             - The pants fit the waist and legs correctly\n\
             - The drape and folds look realistic\n\
             - Color and texture are preserved\n\
             - The pose shows the pants well\n\
             - Proportions are correct",
        ClothingType::Sweater => "Overlay this sweater on the person in a comfortable, realistic way.\n\
             Make sure that:\n\
             - The sweater fits the torso and arms well\n\
             - The knit texture looks authentic\n\
             - Folds and wrinkles are natural\n\
             - The color stays faithful to the original\n\
             - The pose is relaxed and natural",
    }
    .to_string();

    let mut additions = Vec::new();
    if let Some(fit) = &style.fit {
        additions.push(format!("The fit should be {}", fit));
    }
    if let Some(occasion) = &style.occasion {
        additions.push(format!("Suitable for a {} occasion", occasion));
    }
    if let Some(mood) = &style.mood {
        additions.push(format!("With a {} style", mood));
    }
    if !additions.is_empty() {
        prompt.push_str("\n\nAdditional requirements:\n");
        let bullets: Vec<String> = additions.iter().map(|a| format!("- {}", a)).collect();
        prompt.push_str(&bullets.join("\n"));
    }
    prompt
}

fn enhance_prompt(enhancement: EnhancementType) -> &'static str {
    match enhancement {
        EnhancementType::Realistic => {
            "Improve this image so it looks more realistic and professional. \
             Adjust lighting, shadows, textures and colors so it looks like a studio photo."
        }
        EnhancementType::Professional => {
            "Turn this image into a professional fashion photograph. \
             Improve the lighting, composition and overall quality."
        }
        EnhancementType::Natural => {
            "Make this image look more natural and spontaneous. \
             Adjust lighting and colors so it looks like a casual photo."
        }
    }
}
