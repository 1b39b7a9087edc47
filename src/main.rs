use std::{process, sync::Arc};

use pokedex::{
    application::{
        creatures::CreatureService, error::AppError, lookup_cache::LookupCache,
        translation::TranslationService,
    },
    cache::BoundedCache,
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::{self, CatalogClient, TranslatorClient},
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let http_state = build_http_state(&settings)?;
    serve_http(&settings, http_state).await
}

fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let cache = BoundedCache::new(settings.cache.capacity.get())
        .map_err(|err| AppError::validation(err.to_string()))?;
    info!(
        target = "pokedex::cache",
        capacity = cache.capacity(),
        "lookup cache ready"
    );
    let cache: LookupCache = Arc::new(cache);

    let client = upstream::build_client().map_err(AppError::from)?;
    let catalog = CatalogClient::new(client.clone(), settings.upstream.catalog_url.clone());
    let translator = TranslatorClient::new(client, settings.upstream.translator_url.clone());

    let translations = TranslationService::new(cache.clone(), Arc::new(translator));
    let creatures = CreatureService::new(cache, Arc::new(catalog), Arc::new(translations));

    Ok(HttpState {
        creatures: Arc::new(creatures),
        timeouts: settings.timeouts.clone(),
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pokedex::serve",
        addr = %settings.server.addr,
        catalog = %settings.upstream.catalog_url,
        translator = %settings.upstream.translator_url,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
