// PLV batting dashboard entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the season loader with an HTTP transport
// 4. Load the configured season
// 5. Print the season leaderboard
// 6. Compute and summarize the configured rolling series

use plv_batting::config;
use plv_batting::data::loader::{HttpTransport, SeasonLoader};
use plv_batting::metrics::metric::Metric;
use plv_batting::metrics::rolling::{rolling_series, RollingError, RollingRequest};
use plv_batting::metrics::season::{season_leaderboard, BatterSeasonRow, LEADERBOARD_METRICS};

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("plvboard starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: season={}, min_pitches={}, cache ttl={}s",
        config.data.season, config.leaderboard.min_pitches, config.cache.ttl_seconds
    );

    // 3. Build the season loader
    let transport = Arc::new(HttpTransport::new(config.data.base_url.clone()));
    let loader = SeasonLoader::from_config(transport, &config);

    // 4. Load the configured season
    let season = loader
        .load_season(config.data.season)
        .await
        .context("failed to load season data")?;

    // 5. Season leaderboard
    let rows = season_leaderboard(
        &season.events,
        config.leaderboard.min_pitches,
        config.leaderboard.scale,
    );
    info!("leaderboard computed: {} qualifying batters", rows.len());
    print_leaderboard(&rows, config.data.season, config.leaderboard.min_pitches);

    // 6. Rolling series for the configured player
    let request = RollingRequest {
        window: config.rolling.window,
        ..RollingRequest::new(config.rolling.player.clone(), config.rolling.metric)
    };
    match rolling_series(&season, &request) {
        Ok(series) => {
            let valid = series.points.iter().filter(|p| p.rolling.is_some()).count();
            let last = series
                .points
                .iter()
                .rev()
                .find_map(|p| p.rolling_plus)
                .unwrap_or(series.bands.league_average);
            println!(
                "\n{}'s rolling {} ({} {}{})",
                series.player,
                series.metric.display_name(),
                series.window,
                series.metric.denomination().label(),
                if series.fallback_applied() {
                    format!(", min periods {}", series.min_periods)
                } else {
                    String::new()
                }
            );
            println!(
                "  {} points ({} with a rolling value), latest: {:.1}",
                series.points.len(),
                valid,
                last
            );
            println!(
                "  season avg {:.1} | league avg {:.1} | bands 10/25/75/90: {:.1} / {:.1} / {:.1} / {:.1}",
                series.bands.season_average,
                series.bands.league_average,
                series.bands.p10,
                series.bands.p25,
                series.bands.p75,
                series.bands.p90
            );
        }
        Err(RollingError::InsufficientSample {
            player,
            denomination,
            available,
            required,
        }) => {
            println!(
                "\nNot enough {} for {} ({} available, {} required)",
                denomination, player, available, required
            );
        }
        Err(e) => return Err(e).context("failed to compute rolling series"),
    }

    info!("plvboard finished");
    Ok(())
}

fn print_leaderboard(rows: &[BatterSeasonRow], season: u16, min_pitches: usize) {
    println!(
        "{} batter ability metrics (min {} pitches, {} batters)",
        season,
        min_pitches,
        rows.len()
    );
    print!("{:<24} {:>8}", "Name", "Pitches");
    for metric in LEADERBOARD_METRICS {
        print!(" {:>13}", metric.column_label());
    }
    println!();

    for row in rows {
        print!("{:<24} {:>8}", row.name, row.pitches);
        for metric in LEADERBOARD_METRICS {
            if metric == Metric::SwingAggression {
                match row.swing_agg_pct {
                    Some(pct) => print!(" {:>13.1}", pct),
                    None => print!(" {:>13}", "-"),
                }
            } else {
                match row.score(metric) {
                    Some(score) => print!(" {:>13}", score),
                    None => print!(" {:>13}", "-"),
                }
            }
        }
        println!();
    }
}

/// Initialize tracing to log to a file so stdout stays clean for the tables.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("plvboard.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("plv_batting=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
