//! HTTP surface: routes, shared state and the server loop.

pub mod handlers;
pub mod upload;


use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use crate::{config::AppConfig, gemini::GenerativeBackend, pipeline::ImagePipeline};

/// Per-worker application state. Cheap to clone; everything inside is shared.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ImagePipeline,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            pipeline: ImagePipeline::new(backend),
            config: Arc::new(config),
        }
    }
}

/// A POST-only resource; other methods get a 405 envelope.
fn post_route<F, Args>(path: &str, handler: F) -> actix_web::Resource
where
    F: actix_web::Handler<Args>,
    Args: actix_web::FromRequest + 'static,
    F::Output: actix_web::Responder + 'static,
{
    web::resource(path)
        .route(web::post().to(handler))
        .default_service(web::to(handlers::method_not_allowed))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/health")
            .route(web::get().to(handlers::health))
            .default_service(web::to(handlers::method_not_allowed)),
    )
    .service(post_route("/mix-images", handlers::mix_images))
    .service(post_route("/virtual-try-on", handlers::virtual_try_on))
    .service(post_route("/detect-torso", handlers::detect_torso))
    .service(post_route(
        "/analyze-clothing-fit",
        handlers::analyze_clothing_fit,
    ))
    .service(post_route(
        "/generate-multiple-angles",
        handlers::generate_multiple_angles,
    ))
    .service(post_route("/enhance-image", handlers::enhance_image))
    .default_service(web::to(handlers::not_found));
}

pub async fn run(config: AppConfig, backend: Arc<dyn GenerativeBackend>) -> std::io::Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let workers = config.server.workers;
    let state = AppState::new(config, backend);

    log::info!("🌐 Listening on http://{}:{}", host, port);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .configure(configure)
    })
    .bind((host.as_str(), port))?;

    if let Some(workers) = workers {
        server = server.workers(workers);
    }

    server.run().await
}
