//! In-process stand-in for the Gemini backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{Result, StudioError},
    gemini::{GenerativeBackend, UpstreamOutput, UpstreamRequest},
    models::GeneratedImage,
};

pub(crate) const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

enum Reply {
    Images(usize),
    Text(String),
    Fail(Box<dyn Fn() -> StudioError + Send + Sync>),
    /// Images for the first `successes` calls, then the error.
    FailAfter {
        successes: usize,
        make_error: Box<dyn Fn() -> StudioError + Send + Sync>,
    },
}

pub(crate) struct StubBackend {
    configured: bool,
    reply: Reply,
    commentary: String,
    calls: AtomicUsize,
    seen: Mutex<Vec<UpstreamRequest>>,
}

impl StubBackend {
    fn with_reply(reply: Reply) -> Self {
        Self {
            configured: true,
            reply,
            commentary: String::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn returning_images(count: usize) -> Self {
        Self::with_reply(Reply::Images(count))
    }

    pub(crate) fn returning_text(text: &str) -> Self {
        Self::with_reply(Reply::Text(text.to_string()))
    }

    pub(crate) fn failing<F>(make_error: F) -> Self
    where
        F: Fn() -> StudioError + Send + Sync + 'static,
    {
        Self::with_reply(Reply::Fail(Box::new(make_error)))
    }

    pub(crate) fn failing_after<F>(successes: usize, make_error: F) -> Self
    where
        F: Fn() -> StudioError + Send + Sync + 'static,
    {
        Self::with_reply(Reply::FailAfter {
            successes,
            make_error: Box::new(make_error),
        })
    }

    /// Text sent back next to generated images.
    pub(crate) fn with_commentary(mut self, text: &str) -> Self {
        self.commentary = text.to_string();
        self
    }

    /// Behaves like a client started without an API key.
    pub(crate) fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::returning_images(1)
        }
    }

    pub(crate) fn requests(&self) -> Vec<UpstreamRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }

    fn images(&self, count: usize) -> UpstreamOutput {
        UpstreamOutput {
            images: (0..count)
                .map(|_| GeneratedImage::new(FAKE_PNG.to_vec(), "image/png"))
                .collect(),
            text: self.commentary.clone(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for StubBackend {
    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(StudioError::ConfigurationError(
                "GEMINI_API_KEY or GOOGLE_API_KEY is not set".into(),
            ))
        }
    }

    async fn generate(&self, request: &UpstreamRequest) -> Result<UpstreamOutput> {
        self.ensure_configured()?;
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.reply {
            Reply::Images(count) => Ok(self.images(*count)),
            Reply::Text(text) => Ok(UpstreamOutput {
                images: Vec::new(),
                text: text.clone(),
            }),
            Reply::Fail(make_error) => Err(make_error()),
            Reply::FailAfter {
                successes,
                make_error,
            } => {
                if call < *successes {
                    Ok(self.images(1))
                } else {
                    Err(make_error())
                }
            }
        }
    }
}
