//! S/R Advisor: oscillator-adjusted support/resistance signals
//!
//! Usage:
//!   sr-advisor advise --symbol AAPL --period 1mo --interval 5m
//!   sr-advisor serve --port 3001
//!   sr-advisor assets
//!   sr-advisor cache-purge

mod advice;
mod config;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use engine::{
    resolve_ticker, AdvisorParams, Bias, Interval, MarketDataProvider, Period, ASSET_DIRECTORY,
    DEFAULT_LOOKBACK, DEFAULT_RSI_PERIOD, DEFAULT_SMOOTH_LENGTH, DEFAULT_TICKER,
};
use persistence::repository::BarCacheRepository;
use persistence::Database;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use advice::{advise, Advice, AdviseFailure, AdviseRequest, DEFAULT_RECENT_ROWS};
use config::AdvisorConfig;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "sr-advisor")]
#[command(about = "RSI-adjusted support/resistance trading advisor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute levels and a recommendation for one symbol
    Advise {
        /// Ticker or asset directory name
        #[arg(long, default_value = DEFAULT_TICKER)]
        symbol: String,
        /// History to fetch: 7d, 60d, 1mo, 3mo, 6mo, 1y, 2y, 5y, max
        #[arg(long, default_value = "1mo")]
        period: Period,
        /// Bar size: 1m, 5m, 15m, 30m, 1h, 1d, 1wk
        #[arg(long, default_value = "5m")]
        interval: Interval,
        /// Oscillator averaging period
        #[arg(long, default_value_t = DEFAULT_RSI_PERIOD)]
        rsi_period: usize,
        /// Base channel window
        #[arg(long, default_value_t = DEFAULT_LOOKBACK)]
        lookback: usize,
        /// Smoothing window
        #[arg(long, default_value_t = DEFAULT_SMOOTH_LENGTH)]
        smooth_length: usize,
        /// Fail instead of trying fallback period/interval combinations
        #[arg(long)]
        no_autofix: bool,
        /// Rows in the recent signals table
        #[arg(long, default_value_t = DEFAULT_RECENT_ROWS)]
        recent: usize,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the built-in asset directory
    Assets,
    /// Launch the advisor web API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Delete expired bar cache entries
    CachePurge,
}

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn MarketDataProvider>,
    db: Option<Arc<Database>>,
    config: Arc<AdvisorConfig>,
}

impl AppState {
    fn cache(&self) -> Option<(&Database, i64)> {
        self.db
            .as_deref()
            .map(|db| (db, self.config.cache_ttl_secs))
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,sr_advisor=debug")
    } else {
        EnvFilter::new("info,engine=info,sr_advisor=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

/// Open the cache database; the advisor still works without it
async fn open_cache(config: &AdvisorConfig) -> Option<Database> {
    if !config.cache_enabled {
        info!("Bar cache disabled");
        return None;
    }
    match Database::new(&config.db_path).await {
        Ok(db) => {
            info!("Bar cache: {}", config.db_path);
            Some(db)
        }
        Err(e) => {
            warn!("Bar cache unavailable ({}), fetching directly", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = AdvisorConfig::from_env()?;

    match cli.command {
        Commands::Advise {
            symbol,
            period,
            interval,
            rsi_period,
            lookback,
            smooth_length,
            no_autofix,
            recent,
            json,
        } => {
            let request = AdviseRequest {
                symbol: resolve_ticker(&symbol),
                period,
                interval,
                params: AdvisorParams::new(rsi_period, lookback, smooth_length),
                autofix: !no_autofix,
                recent,
            };
            cmd_advise(&config, request, json).await?;
        }
        Commands::Assets => cmd_assets(),
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
        Commands::CachePurge => {
            cmd_cache_purge(&config).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Advise command
// ============================================================================

async fn cmd_advise(config: &AdvisorConfig, request: AdviseRequest, json: bool) -> anyhow::Result<()> {
    let provider = config.provider.build();
    let db = open_cache(config).await;
    let cache = db.as_ref().map(|db| (db, config.cache_ttl_secs));

    match advise(provider.as_ref(), cache, &request).await {
        Ok(advice) if json => {
            println!("{}", serde_json::to_string_pretty(&advice)?);
            Ok(())
        }
        Ok(advice) => {
            print_advice(&advice);
            Ok(())
        }
        Err(failure) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failure_body(&failure))?);
            } else {
                print_attempts(failure.attempts());
            }
            anyhow::bail!("{}", failure)
        }
    }
}

fn format_time(open_time: i64) -> String {
    Utc.timestamp_millis_opt(open_time)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| open_time.to_string())
}

fn format_level(value: Option<f64>) -> String {
    value.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_attempts(attempts: &[engine::FetchAttempt]) {
    if attempts.is_empty() {
        return;
    }
    println!("\nData fetch:");
    for a in attempts {
        let source = if a.cached { " (cached)" } else { "" };
        match &a.error {
            Some(e) => println!("  Tried {}/{} → failed: {}", a.period, a.interval, e),
            None => println!("  Tried {}/{} → {} rows{}", a.period, a.interval, a.rows, source),
        }
    }
}

fn print_advice(advice: &Advice) {
    let s = &advice.snapshot;

    println!("\n=== S/R Advisor v{} ===", APP_VERSION);
    println!(
        "{} via {} | {} @ {} | {} bars | RSI {} / lookback {} / smoothing {}",
        advice.symbol,
        advice.provider,
        advice.period,
        advice.interval,
        advice.bars,
        advice.params.rsi_period,
        advice.params.lookback,
        advice.params.smooth_length
    );
    print_attempts(&advice.attempts);

    println!("\nRecommendation ({}):", format_time(s.open_time));
    match s.action {
        engine::Action::Wait => println!("  Action: WAIT (no fresh signal on the latest bar)"),
        action => println!("  Action: {} @ ~{:.4}", action, s.close),
    }
    println!("  Suggested buy level  (smoothed support):    {:.4}", advice.buy_level);
    println!("  Suggested sell level (smoothed resistance): {:.4}", advice.sell_level);

    println!(
        "\n  Close {:.4} | RSI({}) {:.2} | Midline {:.4} | Range (base) {:.4}",
        s.close, advice.params.rsi_period, s.oscillator, s.smooth_midline, s.range
    );
    println!(
        "  Base S/R {:.4} / {:.4} | Adjusted S/R {:.4} / {:.4}",
        s.base_support, s.base_resistance, s.adjusted_support, s.adjusted_resistance
    );

    match advice.bias {
        Bias::TowardSupport => println!("\n  Close < midline: price is likely to reach the buy level"),
        Bias::TowardResistance => {
            println!("\n  Close > midline: price is likely to reach the sell level")
        }
        Bias::AtMidline => println!("\n  Close is on the midline"),
    }

    for diag in &advice.diagnostics {
        println!("  Note: {}", diag);
    }

    println!("\nRecent signals & levels:");
    println!(
        "  {:<16} {:>12} {:>7} {:>12} {:>12} {:>12}  {}",
        "Time", "Close", "RSI", "Support", "Resistance", "Midline", "Signal"
    );
    println!("  {}", "-".repeat(84));
    for r in &advice.recent {
        let marker = match (r.buy_signal, r.sell_signal) {
            (true, _) => "▲ BUY",
            (_, true) => "▼ SELL",
            _ => "",
        };
        println!(
            "  {:<16} {:>12.4} {:>7} {:>12} {:>12} {:>12}  {}",
            format_time(r.row.open_time),
            r.row.close,
            r.row
                .oscillator
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "-".to_string()),
            format_level(r.row.smooth_support),
            format_level(r.row.smooth_resistance),
            format_level(r.row.smooth_midline),
            marker
        );
    }
    println!();
}

// ============================================================================
// Assets command
// ============================================================================

fn cmd_assets() {
    println!("\n{:<24} {}", "Asset", "Ticker");
    println!("{}", "-".repeat(36));
    for asset in ASSET_DIRECTORY {
        println!("{:<24} {}", asset.name, asset.ticker);
    }
    println!("\nAny other ticker can be passed with --symbol.");
}

// ============================================================================
// Serve command (axum web server)
// ============================================================================

async fn cmd_serve(config: AdvisorConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("S/R Advisor v{} starting...", APP_VERSION);

    let db = open_cache(&config).await;
    let state = AppState {
        provider: Arc::from(config.provider.build()),
        db: db.map(Arc::new),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/assets", get(api_assets))
        .route("/advise", get(api_advise))
        .with_state(state.clone());

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== S/R Advisor v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health   - Health check");
    println!("  GET  /api/assets   - Built-in asset directory");
    println!("  GET  /api/advise   - Levels, signals and recommendation");
    println!("\n  Provider: {}", state.provider.name());
    match &state.db {
        Some(_) => println!("  Cache: {} (ttl {}s)", state.config.db_path, state.config.cache_ttl_secs),
        None => println!("  Cache: off"),
    }
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sr-advisor",
        "version": APP_VERSION,
        "provider": state.provider.name(),
        "cache": state.db.is_some(),
    }))
}

/// GET /api/assets
async fn api_assets() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "default": DEFAULT_TICKER,
        "assets": ASSET_DIRECTORY,
    }))
}

/// Query params for the advise endpoint
#[derive(Debug, Deserialize)]
struct AdviseParams {
    symbol: Option<String>,
    period: Option<String>,
    interval: Option<String>,
    rsi_period: Option<usize>,
    lookback: Option<usize>,
    smooth_length: Option<usize>,
    autofix: Option<bool>,
    recent: Option<usize>,
}

impl AdviseParams {
    fn into_request(self) -> Result<AdviseRequest, AdviseFailure> {
        let period = match self.period {
            Some(p) => p
                .parse()
                .map_err(|e: anyhow::Error| AdviseFailure::BadInput(e.to_string()))?,
            None => Period::Month1,
        };
        let interval = match self.interval {
            Some(i) => i
                .parse()
                .map_err(|e: anyhow::Error| AdviseFailure::BadInput(e.to_string()))?,
            None => Interval::Min5,
        };

        Ok(AdviseRequest {
            symbol: resolve_ticker(self.symbol.as_deref().unwrap_or(DEFAULT_TICKER)),
            period,
            interval,
            params: AdvisorParams::new(
                self.rsi_period.unwrap_or(DEFAULT_RSI_PERIOD),
                self.lookback.unwrap_or(DEFAULT_LOOKBACK),
                self.smooth_length.unwrap_or(DEFAULT_SMOOTH_LENGTH),
            ),
            autofix: self.autofix.unwrap_or(true),
            recent: self.recent.unwrap_or(DEFAULT_RECENT_ROWS),
        })
    }
}

fn failure_body(failure: &AdviseFailure) -> serde_json::Value {
    serde_json::json!({
        "success": false,
        "error_kind": failure.kind(),
        "error": failure.to_string(),
        "attempts": failure.attempts(),
    })
}

/// GET /api/advise: fetch bars and compute the recommendation
async fn api_advise(
    State(state): State<AppState>,
    Query(params): Query<AdviseParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    let result = match params.into_request() {
        Ok(request) => {
            info!(
                symbol = %request.symbol,
                period = %request.period,
                interval = %request.interval,
                "Advise request"
            );
            advise(state.provider.as_ref(), state.cache(), &request).await
        }
        Err(failure) => Err(failure),
    };

    match result {
        Ok(advice) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "advice": advice,
            })),
        ),
        Err(failure) => {
            error!(kind = failure.kind(), "Advise failed: {}", failure);
            (failure.status(), Json(failure_body(&failure)))
        }
    }
}

// ============================================================================
// Cache purge command
// ============================================================================

async fn cmd_cache_purge(config: &AdvisorConfig) -> anyhow::Result<()> {
    info!("Purging bar cache entries older than {}s", config.cache_ttl_secs);

    let db = Database::new(&config.db_path).await.map_err(|e| {
        error!("Failed to open database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;

    let repo = BarCacheRepository::new(db.pool());
    let deleted = repo
        .purge_expired(config.cache_ttl_secs, Utc::now().timestamp())
        .await
        .map_err(|e| anyhow::anyhow!("Purge failed: {}", e))?;
    let remaining = repo
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Count failed: {}", e))?;

    info!("Done! Deleted {} entries, {} remaining.", deleted, remaining);
    Ok(())
}
