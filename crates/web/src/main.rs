mod handlers;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{ConnectInfo, FromRef},
    http::{Method, Request, StatusCode, header},
};
use docs_og_core::{
    config::Config,
    source::{PageIndex, PageSource},
};
use docs_og_images::{
    font::FontProvider,
    render::{Renderer, SvgRenderer},
};
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    ServiceBuilderExt,
    cors::{self, CorsLayer},
    normalize_path::NormalizePathLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, MakeSpan, TraceLayer},
};
use tracing::{Level, Span};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use url::Url;

use crate::handlers::build_router;

#[derive(Clone, FromRef)]
pub struct AppState {
    config: Arc<Config>,
    site_url: Arc<Url>,
    pages: Arc<dyn PageSource>,
    fonts: Arc<FontProvider>,
    renderer: Arc<dyn Renderer>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Arc::new(Config::load("config.yml")?);
    let site_url = config.site_url()?;
    tracing::info!("Site URL: {}", site_url);
    let pages = PageIndex::load(&config.docs).context("Failed to load documentation pages")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;
    let fonts = FontProvider::new(&config.font, &client);
    fonts.prefetch();
    let renderer =
        SvgRenderer::new(client).with_public_dir(site_url.clone(), &config.site.public_dir);

    let state = AppState {
        config: config.clone(),
        site_url: Arc::new(site_url),
        pages: Arc::new(pages),
        fonts: Arc::new(fonts),
        renderer: Arc::new(renderer),
    };
    let router = app(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.port));
    let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server: Listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;
    tracing::info!("Shut down gracefully");
    Ok(())
}

fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MyMakeSpan { level: Level::INFO })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(120),
        ))
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(CorsLayer::new().allow_methods([Method::GET]).allow_origin(cors::Any))
        .compression();
    let public_dir = state.config.site.public_dir.clone();
    build_router(public_dir).with_state(state).layer(middleware)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Clone)]
pub struct MyMakeSpan {
    level: Level,
}

impl<B> MakeSpan<B> for MyMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let cf_connecting_ip = request.headers().get("CF-Connecting-IP");
        let ip = if let Some(v) = cf_connecting_ip {
            str::from_utf8(v.as_bytes()).ok().and_then(|s| IpAddr::from_str(s).ok())
        } else if let Some(ConnectInfo(socket_addr)) =
            request.extensions().get::<ConnectInfo<SocketAddr>>()
        {
            Some(socket_addr.ip())
        } else {
            None
        };
        let ip = ip.unwrap_or(IpAddr::from([0, 0, 0, 0]));
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("[unknown]");
        macro_rules! make_span {
            ($level:expr) => {
                tracing::span!(
                    $level,
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    ip = %ip,
                    user_agent = %user_agent,
                )
            }
        }
        match self.level {
            Level::ERROR => make_span!(Level::ERROR),
            Level::WARN => make_span!(Level::WARN),
            Level::INFO => make_span!(Level::INFO),
            Level::DEBUG => make_span!(Level::DEBUG),
            Level::TRACE => make_span!(Level::TRACE),
        }
    }
}
