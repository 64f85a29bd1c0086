use anyhow::{Context, Result};
use clap::Parser;
use lixi_server::{Api, Server, ServerConfig};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "lixi-server".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("lixi-server");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::INFO))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Max request body size in bytes (0 disables limit).
    #[arg(long)]
    http_body_limit_bytes: Option<usize>,

    /// Seed for room ids and rewards (optional, for reproducible runs).
    #[arg(long)]
    deterministic_seed: Option<u64>,

    /// Seconds between cleanup sweeps (0 or unset disables the sweep).
    #[arg(long)]
    cleanup_interval_secs: Option<u64>,

    /// Rooms older than this many seconds are removed by the sweep (default: 7 days).
    #[arg(long)]
    room_max_age_secs: Option<u64>,
}

fn is_production() -> bool {
    matches!(
        std::env::var("NODE_ENV").as_deref(),
        Ok("production") | Ok("prod")
    )
}

/// Maps an optional arg value to Option: 0 => None, Some(v) => Some(v), None => default
fn map_optional_limit<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => None,
        Some(v) => Some(v),
        None => default,
    }
}

fn build_config(args: &Args) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    if let Some(0) = args.room_max_age_secs {
        anyhow::bail!("room_max_age_secs must be > 0 when set");
    }

    Ok(ServerConfig {
        http_body_limit_bytes: map_optional_limit(
            args.http_body_limit_bytes,
            defaults.http_body_limit_bytes,
        ),
        deterministic_seed: args.deterministic_seed.or(defaults.deterministic_seed),
        cleanup_interval_secs: map_optional_limit(
            args.cleanup_interval_secs,
            defaults.cleanup_interval_secs,
        ),
        room_max_age_secs: args.room_max_age_secs.or(defaults.room_max_age_secs),
    })
}

fn require_env(var: &str) -> Result<String> {
    let value = std::env::var(var).unwrap_or_default();
    if value.trim().is_empty() {
        anyhow::bail!("Missing required env: {var}");
    }
    Ok(value)
}

fn ensure_production_env() -> Result<()> {
    if !is_production() {
        return Ok(());
    }

    require_env("ALLOWED_HTTP_ORIGINS")?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing()?;

    ensure_production_env()?;

    let config = build_config(&args)?;
    info!(?config, "server config loaded");

    let server = Arc::new(Server::new_with_config(config));
    let _sweeper = server.start_sweeper();
    let api = Api::new(server);
    let app = api.router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let args = Args::parse_from(["lixi-server"]);
        let config = build_config(&args).expect("config should parse");
        assert_eq!(args.port, 8080);
        assert_eq!(config.http_body_limit_bytes, Some(16 * 1024));
        assert_eq!(config.cleanup_interval_secs, None);
        assert_eq!(config.room_max_age_secs, Some(7 * 24 * 60 * 60));
    }

    #[test]
    fn parses_cleanup_and_seed() {
        let args = Args::parse_from([
            "lixi-server",
            "--cleanup-interval-secs",
            "300",
            "--room-max-age-secs",
            "3600",
            "--deterministic-seed",
            "7",
            "--http-body-limit-bytes",
            "0",
        ]);
        let config = build_config(&args).expect("config should parse");
        assert_eq!(config.cleanup_interval_secs, Some(300));
        assert_eq!(config.room_max_age_secs, Some(3600));
        assert_eq!(config.deterministic_seed, Some(7));
        assert_eq!(config.http_body_limit_bytes, None);
    }

    #[test]
    fn rejects_zero_max_age() {
        let args = Args::parse_from(["lixi-server", "--room-max-age-secs", "0"]);
        let err = build_config(&args).unwrap_err();
        assert!(
            err.to_string().contains("room_max_age_secs"),
            "unexpected error: {err}"
        );
    }
}
