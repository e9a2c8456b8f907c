mod api;
mod config;
mod db;
mod models;
mod schema;
mod store;

use api::check::CheckService;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::Router;
use opentelemetry::trace::TracerProvider;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::env;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use utoipa_swagger_ui::SwaggerUi;
use vegancheck_core::{Classifier, Oracle};

/// Application state shared across all handlers
pub type AppState = Arc<CheckService>;

/// Tracer and logger providers exporting to an OTLP collector.
struct OtelProviders {
    tracer: SdkTracerProvider,
    logger: SdkLoggerProvider,
}

/// Whether something accepts TCP connections at the collector endpoint.
/// Keeps an absent collector from stalling exports.
fn collector_reachable(endpoint: &str) -> bool {
    let host_port = endpoint
        .trim_start_matches("http://")
        .trim_start_matches("https://");

    host_port
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| TcpStream::connect_timeout(&addr, Duration::from_millis(100)).is_ok())
        .unwrap_or(false)
}

fn build_otel_providers(
    endpoint: &str,
    service_name: &str,
) -> Result<OtelProviders, opentelemetry_otlp::ExporterBuildError> {
    let resource = opentelemetry_sdk::Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let log_exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(OtelProviders {
        tracer: SdkTracerProvider::builder()
            .with_batch_exporter(span_exporter)
            .with_resource(resource.clone())
            .build(),
        logger: SdkLoggerProvider::builder()
            .with_batch_exporter(log_exporter)
            .with_resource(resource)
            .build(),
    })
}

/// Set up logging. Traces and logs also go to OTEL_EXPORTER_OTLP_ENDPOINT when
/// it is set, reachable and the exporters build; otherwise console only.
fn init_telemetry() {
    let console = || {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer())
            .init()
    };

    let Ok(endpoint) = env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        console();
        tracing::debug!("OTEL_EXPORTER_OTLP_ENDPOINT not set, using console logging only");
        return;
    };

    if !collector_reachable(&endpoint) {
        console();
        tracing::info!(
            endpoint = %endpoint,
            "OpenTelemetry collector not reachable, using console logging only"
        );
        return;
    }

    let service_name =
        env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "vegancheck-server".to_string());

    let providers = match build_otel_providers(&endpoint, &service_name) {
        Ok(providers) => providers,
        Err(e) => {
            console();
            tracing::warn!(
                error = %e,
                "Failed to build OTLP exporters, using console logging only"
            );
            return;
        }
    };

    let tracer = providers.tracer.tracer("vegancheck-server");
    let log_bridge = OpenTelemetryTracingBridge::new(&providers.logger);
    opentelemetry::global::set_tracer_provider(providers.tracer);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(log_bridge)
        .init();

    tracing::info!(
        endpoint = %endpoint,
        service = %service_name,
        "OpenTelemetry enabled, exporting traces and logs"
    );
}

/// Wire the classifier from configuration, or explain why it can't be.
fn build_service(config: &config::ServerConfig) -> CheckService {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, every check will return 503");
        return CheckService::Unavailable("DATABASE_URL not set".to_string());
    };

    let pool = match db::create_pool(database_url) {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create database pool");
            return CheckService::Unavailable(format!("database pool: {}", e));
        }
    };

    let classifier = Classifier::new(
        Arc::new(store::PgKnowledgeBase::new(pool.clone())),
        Arc::new(store::PgMemoryCache::new(pool)),
    );

    let classifier = match Oracle::from_env() {
        Ok(Some(oracle)) => {
            tracing::info!(
                provider = oracle.provider_name(),
                model = oracle.model_name(),
                "Oracle configured"
            );
            classifier.with_oracle(oracle)
        }
        Ok(None) => {
            tracing::warn!("OPENROUTER_API_KEY not set, unknown ingredients will not be checked");
            classifier
        }
        Err(e) => {
            tracing::error!(error = %e, "Invalid oracle configuration, running without oracle");
            classifier
        }
    };

    CheckService::Ready(classifier)
}

#[tokio::main]
async fn main() {
    // Check for --openapi flag to dump the document and exit
    if env::args().any(|arg| arg == "--openapi") {
        let spec = api::openapi()
            .to_pretty_json()
            .expect("OpenAPI document should serialize");
        println!("{}", spec);
        return;
    }

    init_telemetry();

    let config = config::ServerConfig::from_env();
    let state: AppState = Arc::new(build_service(&config));

    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::openapi());

    let app = Router::new()
        .nest("/api", api::router())
        .merge(swagger_ui)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    let matched_path = request
                        .extensions()
                        .get::<MatchedPath>()
                        .map(MatchedPath::as_str)
                        .unwrap_or(request.uri().path());

                    // Health checks are too noisy for info-level spans
                    if matched_path == "/api/health" {
                        tracing::trace_span!("http_request")
                    } else {
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            path = %matched_path,
                        )
                    }
                })
                .on_request(|_request: &Request<_>, _span: &Span| {})
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.metadata().map(|m| m.level()) == Some(&tracing::Level::TRACE) {
                            return;
                        }
                        let status = response.status().as_u16();
                        if status >= 500 {
                            tracing::error!(
                                status = %status,
                                latency_ms = %latency.as_millis(),
                                "request failed with server error"
                            );
                        } else {
                            tracing::info!(
                                status = %status,
                                latency_ms = %latency.as_millis(),
                                "request completed"
                            );
                        }
                    },
                )
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     latency: Duration,
                     _span: &Span| {
                        tracing::error!(
                            error = %error,
                            latency_ms = %latency.as_millis(),
                            "request failed"
                        );
                    },
                ),
        );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind {}: {}", config.bind_addr, e));

    match listener.local_addr() {
        Ok(addr) => {
            tracing::info!("Server listening on {}", addr);
            tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
        }
        Err(e) => tracing::warn!(error = %e, "Could not read listener address"),
    }

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
    }
}
