use anyhow::Context;
use clap::Parser;
use tickerlens_core::analysis::Analyzer;
use tickerlens_core::domain::view::{render_card, ResultView};
use tickerlens_core::domain::watchlist::Watchlist;
use tickerlens_core::mock::MockDataGenerator;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "tickerlens_worker", about = "Analyze a list of tickers once and print the result cards")]
struct Args {
    /// Ticker symbols to analyze. Defaults to WATCHLIST from the environment.
    tickers: Vec<String>,

    /// Use synthetic data even when vendor keys are configured.
    #[arg(long)]
    mock: bool,

    /// Print JSON instead of text cards.
    #[arg(long)]
    json: bool,

    /// Maximum tickers in flight (overrides ANALYSIS_CONCURRENCY).
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tickerlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let symbols = if args.tickers.is_empty() {
        settings.watchlist.clone()
    } else {
        args.tickers.clone()
    };
    let watchlist = Watchlist::from_symbols(&symbols);
    anyhow::ensure!(
        !watchlist.is_empty(),
        "no valid tickers given (pass symbols as arguments or set WATCHLIST)"
    );

    let analyzer = if args.mock {
        Analyzer::mock(MockDataGenerator::new().with_latency(settings.mock_latency()))
    } else {
        Analyzer::from_settings(&settings).context("failed to set up vendor clients")?
    };
    let analyzer =
        analyzer.with_concurrency(args.concurrency.unwrap_or(settings.analysis_concurrency));

    tracing::info!(
        tickers = watchlist.len(),
        source = ?analyzer.source(),
        "starting analysis"
    );

    let results = match analyzer.analyze(watchlist.tickers()).await {
        Ok(results) => results,
        Err(err) => {
            let err = anyhow::Error::new(err);
            sentry_anyhow::capture_anyhow(&err);
            return Err(err.context("analysis run failed"));
        }
    };

    if args.json {
        let views: Vec<ResultView> = results.iter().map(ResultView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        for result in &results {
            println!("{}", render_card(result));
        }
    }

    Ok(())
}

fn init_sentry(settings: &tickerlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
