use std::sync::Arc;

use crate::{
    error::{Result, StudioError},
    gemini::{GenerativeBackend, UpstreamOutput, UpstreamRequest},
    models::{
        extract_json, Feature, FitAnalysis, GenerationRequest, GenerationResult, OutputKind,
        TorsoAnalysis,
    },
    prompts,
    storage::ResultWriter,
};

/// Runs one validated request: prompt, upstream call(s), result files.
#[derive(Clone)]
pub struct ImagePipeline {
    backend: Arc<dyn GenerativeBackend>,
    writer: ResultWriter,
}

impl ImagePipeline {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend,
            writer: ResultWriter::new(),
        }
    }

    pub fn ensure_configured(&self) -> Result<()> {
        self.backend.ensure_configured()
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        self.backend.ensure_configured()?;

        match request.feature() {
            Feature::MultipleAngles { angles } => self.run_angles(request, angles).await,
            feature => match feature.output_kind() {
                OutputKind::Images => self.run_images(request).await,
                OutputKind::Analysis => self.run_analysis(request).await,
            },
        }
    }

    fn upstream_request(&self, request: &GenerationRequest, prompt: String) -> UpstreamRequest {
        let feature = request.feature();
        UpstreamRequest {
            prompt,
            images: request.images().images().to_vec(),
            modalities: feature.modalities(),
            temperature: feature.temperature(),
        }
    }

    async fn run_images(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let feature = request.feature();
        let prompt = prompts::build_prompt(feature, request.images().len(), request.prompt());
        log::debug!("Prompt for {}: {}", feature.kind().as_str(), prompt);

        let output = self
            .backend
            .generate(&self.upstream_request(request, prompt))
            .await?;

        if output.images.is_empty() {
            return Err(StudioError::UpstreamInvalidResponse(format!(
                "the model returned no image{}",
                describe_text(&output.text)
            )));
        }

        let files = self
            .writer
            .write_all(request.output_dir(), feature.file_prefix(), &output.images)
            .await?;

        let analysis = match feature {
            Feature::VirtualTryOn { .. } => try_on_metadata(&output.text),
            _ => None,
        };

        Ok(GenerationResult {
            success: true,
            message: Some(format!(
                "Images processed successfully. {} file(s) generated.",
                files.len()
            )),
            generated_files: files,
            text_output: Some(output.text),
            analysis,
        })
    }

    /// One upstream call per angle. Failed angles are reported, not fatal, unless all fail.
    ///
    /// Nothing is written until every call has returned, so an aborted request leaves no files.
    async fn run_angles(
        &self,
        request: &GenerationRequest,
        angles: &[String],
    ) -> Result<GenerationResult> {
        let mut batches = Vec::new();
        let mut failed = Vec::new();
        let mut last_error = None;

        for angle in angles {
            let prompt = match request.prompt().map(str::trim).filter(|p| !p.is_empty()) {
                Some(user) => user.to_string(),
                None => prompts::angle_prompt(angle),
            };

            match self
                .backend
                .generate(&self.upstream_request(request, prompt))
                .await
            {
                Ok(UpstreamOutput { images, .. }) if !images.is_empty() => {
                    let prefix = format!("angle_{}", angle.replace([' ', '-'], "_"));
                    batches.push((prefix, images));
                }
                Ok(_) => {
                    log::warn!("⚠️  No image generated for angle '{}'", angle);
                    failed.push(angle.clone());
                    last_error = Some(StudioError::UpstreamInvalidResponse(format!(
                        "the model returned no image for angle '{}'",
                        angle
                    )));
                }
                // Configuration and quota problems will not fix themselves on the next angle.
                Err(e @ StudioError::ConfigurationError(_))
                | Err(e @ StudioError::UpstreamQuotaExceeded(_)) => return Err(e),
                Err(e) => {
                    log::warn!("⚠️  Angle '{}' failed: {}", angle, e);
                    failed.push(angle.clone());
                    last_error = Some(e);
                }
            }
        }

        if batches.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                StudioError::UpstreamInvalidResponse("no angle produced an image".into())
            }));
        }

        let mut files = Vec::new();
        for (prefix, images) in &batches {
            match self
                .writer
                .write_all(request.output_dir(), prefix, images)
                .await
            {
                Ok(paths) => files.extend(paths),
                Err(e) => {
                    self.writer.remove_all(&files).await;
                    return Err(e);
                }
            }
        }

        let mut message = format!(
            "{} of {} angle(s) generated, {} file(s) written.",
            angles.len() - failed.len(),
            angles.len(),
            files.len()
        );
        if !failed.is_empty() {
            message.push_str(&format!(" Failed angles: {}.", failed.join(", ")));
        }

        Ok(GenerationResult {
            success: true,
            generated_files: files,
            message: Some(message),
            text_output: None,
            analysis: None,
        })
    }

    async fn run_analysis(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let feature = request.feature();
        let prompt = prompts::build_prompt(feature, request.images().len(), request.prompt());
        let output = self
            .backend
            .generate(&self.upstream_request(request, prompt))
            .await?;

        let (analysis, parsed) = match feature {
            Feature::DetectTorso => match extract_json::<TorsoAnalysis>(&output.text) {
                Some(a) => (serde_json::to_value(a)?, true),
                None => (serde_json::to_value(TorsoAnalysis::fallback())?, false),
            },
            _ => match extract_json::<FitAnalysis>(&output.text) {
                Some(a) => (serde_json::to_value(a)?, true),
                None => (serde_json::to_value(FitAnalysis::fallback())?, false),
            },
        };

        let message = if parsed {
            "Analysis completed successfully."
        } else {
            log::warn!(
                "⚠️  Could not parse {} analysis, returning fallback",
                feature.kind().as_str()
            );
            "The model's answer could not be parsed, a basic fallback analysis is returned."
        };

        Ok(GenerationResult {
            success: true,
            generated_files: Vec::new(),
            message: Some(message.to_string()),
            text_output: Some(output.text),
            analysis: Some(analysis),
        })
    }
}

/// Try-on commentary as structured metadata: an embedded JSON object, else `{"description": text}`.
fn try_on_metadata(text: &str) -> Option<serde_json::Value> {
    if text.trim().is_empty() {
        return None;
    }
    match extract_json::<serde_json::Value>(text) {
        Some(value) if value.is_object() => Some(value),
        _ => Some(serde_json::json!({ "description": text })),
    }
}

fn describe_text(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        String::new()
    } else {
        let snippet: String = text.chars().take(200).collect();
        format!(" (model said: {})", snippet)
    }
}
