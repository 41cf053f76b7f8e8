//! HTTP front end for the storage node
//!
//! Serves raw document reads and a status probe on top of the storage
//! engine. The wire surface is intentionally small; the node's real work
//! happens in the engine and the topology reconciler.

use std::sync::Arc;

use actix_web::dev::ServerHandle;
use actix_web::{App, HttpResponse, HttpServer, web};
use async_trait::async_trait;
use tracing::info;

use ravenhost_common::{RavenHostError, Result};
use ravenhost_core::service::engine::{NodeConfig, StorageEngine};
use ravenhost_core::service::lifecycle::{FrontEnd, FrontEndFactory};

struct FrontEndState {
    engine: Arc<dyn StorageEngine>,
}

async fn get_document(
    state: web::Data<FrontEndState>,
    path: web::Path<String>,
) -> HttpResponse {
    match state.engine.get(&path.into_inner()) {
        Ok(Some(bytes)) => HttpResponse::Ok()
            .content_type("application/json")
            .body(bytes),
        Ok(None) => HttpResponse::NotFound().finish(),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

async fn get_status() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "running"}))
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(get_status))
        // Keys contain slashes ("Raven/Replication/Destinations"), so the
        // tail of the path is the key.
        .route("/docs/{key:.*}", web::get().to(get_document));
}

/// Actix-based front end. Construction is cheap; `start` binds the listener
/// and is the step that can fail and be rolled back.
pub struct HttpFrontEnd {
    bind_address: String,
    port: u16,
    engine: Arc<dyn StorageEngine>,
    handle: Option<ServerHandle>,
}

impl HttpFrontEnd {
    pub fn new(bind_address: String, port: u16, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            bind_address,
            port,
            engine,
            handle: None,
        }
    }
}

#[async_trait]
impl FrontEnd for HttpFrontEnd {
    async fn start(&mut self) -> Result<()> {
        let engine = self.engine.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(FrontEndState {
                    engine: engine.clone(),
                }))
                .configure(routes)
        })
        .disable_signals()
        .bind((self.bind_address.as_str(), self.port))
        .map_err(|e| RavenHostError::FrontEnd(e.to_string()))?
        .run();

        self.handle = Some(server.handle());
        tokio::spawn(server);

        info!("front end listening on {}:{}", self.bind_address, self.port);
        Ok(())
    }

    async fn dispose(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop(true).await;
            info!("front end stopped");
        }
    }
}

/// Factory wiring `HttpFrontEnd` from the node configuration.
pub struct HttpFrontEndFactory;

#[async_trait]
impl FrontEndFactory for HttpFrontEndFactory {
    async fn create(
        &self,
        config: &NodeConfig,
        engine: Arc<dyn StorageEngine>,
    ) -> Result<Box<dyn FrontEnd>> {
        Ok(Box::new(HttpFrontEnd::new(
            config.bind_address.clone(),
            config.port,
            engine,
        )))
    }
}
