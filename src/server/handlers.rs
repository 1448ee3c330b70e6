use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};

use super::{upload, AppState};
use crate::{
    error::{Result, StudioError},
    models::{
        validate_output_dir, Feature, FeatureKind, GenerationEnvelope, GenerationRequest,
        HealthResponse, ImageUploadSet,
    },
};

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        message: "Gemini image studio API is running".to_string(),
    })
}

pub async fn mix_images(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::Mix).await
}

pub async fn virtual_try_on(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::VirtualTryOn).await
}

pub async fn detect_torso(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::DetectTorso).await
}

pub async fn analyze_clothing_fit(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::AnalyzeClothingFit).await
}

pub async fn generate_multiple_angles(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::MultipleAngles).await
}

pub async fn enhance_image(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse> {
    handle(&state, payload, FeatureKind::Enhance).await
}

pub async fn not_found(req: HttpRequest) -> Result<HttpResponse> {
    Err(StudioError::NotFound(format!(
        "No route for {} {}",
        req.method(),
        req.path()
    )))
}

pub async fn method_not_allowed(req: HttpRequest) -> HttpResponse {
    let error = StudioError::ValidationError(format!(
        "Method {} is not allowed on {}",
        req.method(),
        req.path()
    ));
    log::warn!("⚠️  Request rejected: {}", error);
    HttpResponse::MethodNotAllowed().json(GenerationEnvelope::from_error(&error))
}

/// Shared flow for every generation endpoint.
///
/// The configuration check runs before the body is read, so a server without
/// an API key answers `configuration_error` whatever the caller uploaded.
async fn handle(state: &AppState, payload: Multipart, kind: FeatureKind) -> Result<HttpResponse> {
    state.pipeline.ensure_configured()?;

    let mut form = upload::read_form(payload, state.config.upload.max_file_bytes).await?;
    log::info!(
        "📥 /{} received {} image(s)",
        kind.as_str(),
        form.images.len()
    );

    let feature = Feature::from_form(kind, &form.fields)?;
    form.arrange_by_roles(kind.image_roles());

    let output_dir = match form.field("output_dir") {
        Some(raw) => validate_output_dir(raw)?,
        None => state.config.output.default_dir.clone(),
    };
    let prompt = form.field("prompt").map(String::from);

    feature.validate_count(form.images.len())?;
    let images = ImageUploadSet::new(std::mem::take(&mut form.images))?;
    let request = GenerationRequest::new(feature, images, prompt, output_dir)?;

    let result = state.pipeline.run(&request).await?;
    log::info!(
        "✅ /{} finished with {} file(s)",
        kind.as_str(),
        result.generated_files.len()
    );

    Ok(HttpResponse::Ok().json(GenerationEnvelope::from(result)))
}
