// Season loading: month-partitioned fetch, derived-column attachment, and an
// explicit TTL cache keyed by season year.
//
// The loader owns a transport behind a trait object so tests can substitute
// an in-memory source for the remote dataset host.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::future;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::data::event::{load_events_from_reader, PitchEvent};
use crate::data::reference::{load_date_map_from_reader, load_run_constants_from_reader};
use crate::metrics::baseline::{adjusted_value, compute_baselines};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} fetching {file}")]
    Status { file: String, status: u16 },
}

/// Source of the remote dataset files.
///
/// `fetch` returns `Ok(None)` when the file is absent upstream (the caller
/// decides whether that is fatal) and an error on transport failure.
#[async_trait]
pub trait DataTransport: Send + Sync {
    async fn fetch(&self, file: &str) -> Result<Option<Vec<u8>>, TransportError>;
}

/// HTTP transport over the dataset host.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpTransport {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DataTransport for HttpTransport {
    async fn fetch(&self, file: &str) -> Result<Option<Vec<u8>>, TransportError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), file);
        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TransportError::Status {
                file: file.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(Some(response.bytes().await?.to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("transport error fetching {file}: {source}")]
    Transport {
        file: String,
        source: TransportError,
    },

    #[error("CSV decode error in {file}: {source}")]
    Decode { file: String, source: csv::Error },

    #[error("no pitch data found for season {year}")]
    EmptySeason { year: u16 },

    #[error("required file absent upstream: {file}")]
    MissingFile { file: String },

    #[error("no run constant for season {year}")]
    MissingRunConstant { year: u16 },
}

// ---------------------------------------------------------------------------
// Season data
// ---------------------------------------------------------------------------

/// A fully derived season of pitch events, ordered chronologically by
/// pitch id. Immutable once built; shared via `Arc` out of the cache.
#[derive(Debug)]
pub struct SeasonData {
    pub year: u16,
    pub run_constant: f64,
    pub events: Vec<PitchEvent>,
}

impl SeasonData {
    /// Distinct batter names, sorted, for parameter enumeration.
    pub fn batters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.events.iter().map(|e| e.batter.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

struct CacheEntry {
    loaded_at: Instant,
    data: Arc<SeasonData>,
}

/// Loads seasons through a transport and caches them with a TTL.
///
/// Staleness is checked on access; there is no background invalidation task.
pub struct SeasonLoader {
    transport: Arc<dyn DataTransport>,
    ttl: Duration,
    months: Vec<u8>,
    run_constants_file: String,
    date_map_file: String,
    cache: RwLock<HashMap<u16, CacheEntry>>,
}

impl SeasonLoader {
    pub fn new(transport: Arc<dyn DataTransport>, ttl: Duration, months: Vec<u8>) -> Self {
        SeasonLoader {
            transport,
            ttl,
            months,
            run_constants_file: "plv_seasonal_constants.csv".to_string(),
            date_map_file: "date_pitch_map.csv".to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(transport: Arc<dyn DataTransport>, config: &Config) -> Self {
        SeasonLoader {
            transport,
            ttl: Duration::from_secs(config.cache.ttl_seconds),
            months: config.data.months.clone(),
            run_constants_file: config.data.run_constants_file.clone(),
            date_map_file: config.data.date_map_file.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load a season, returning the cached result when fresh.
    ///
    /// A month partition absent upstream is skipped with a warning; the
    /// run-constant table and date map are required. Transport failures are
    /// terminal for the render cycle (no retry).
    pub async fn load_season(&self, year: u16) -> Result<Arc<SeasonData>, LoadError> {
        if let Some(data) = self.cached(year).await {
            debug!("season {} served from cache", year);
            return Ok(data);
        }

        info!("loading season {}", year);
        let fetches = self.months.iter().map(|&month| {
            let file = format!("{}_plv_pitches-{}.csv", year, month);
            async move {
                let bytes = self.transport.fetch(&file).await.map_err(|e| {
                    LoadError::Transport {
                        file: file.clone(),
                        source: e,
                    }
                })?;
                Ok::<(String, Option<Vec<u8>>), LoadError>((file, bytes))
            }
        });
        let partitions = future::try_join_all(fetches).await?;

        let mut events = Vec::new();
        for (file, bytes) in partitions {
            match bytes {
                Some(bytes) => {
                    let month_events = decode(&file, bytes.as_slice(), load_events_from_reader)?;
                    debug!("{}: {} events", file, month_events.len());
                    events.extend(month_events);
                }
                None => warn!("month partition absent upstream, skipping: {}", file),
            }
        }
        if events.is_empty() {
            return Err(LoadError::EmptySeason { year });
        }

        let constants_bytes = self.required(&self.run_constants_file).await?;
        let constants = decode(
            &self.run_constants_file,
            constants_bytes.as_slice(),
            load_run_constants_from_reader,
        )?;
        let run_constant = constants
            .get(&year)
            .copied()
            .ok_or(LoadError::MissingRunConstant { year })?;

        let dates_bytes = self.required(&self.date_map_file).await?;
        let dates = decode(
            &self.date_map_file,
            dates_bytes.as_slice(),
            load_date_map_from_reader,
        )?;

        attach_derived(&mut events, run_constant, &dates);

        let data = Arc::new(SeasonData {
            year,
            run_constant,
            events,
        });
        info!(
            "season {} loaded: {} pitch events, {} batters",
            year,
            data.events.len(),
            data.batters().len()
        );

        let mut cache = self.cache.write().await;
        cache.insert(
            year,
            CacheEntry {
                loaded_at: Instant::now(),
                data: data.clone(),
            },
        );
        Ok(data)
    }

    /// Drop a season from the cache so the next request re-fetches.
    pub async fn evict(&self, year: u16) {
        self.cache.write().await.remove(&year);
    }

    async fn cached(&self, year: u16) -> Option<Arc<SeasonData>> {
        let cache = self.cache.read().await;
        cache
            .get(&year)
            .filter(|entry| entry.loaded_at.elapsed() < self.ttl)
            .map(|entry| entry.data.clone())
    }

    async fn required(&self, file: &str) -> Result<Vec<u8>, LoadError> {
        match self.transport.fetch(file).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(LoadError::MissingFile {
                file: file.to_string(),
            }),
            Err(e) => Err(LoadError::Transport {
                file: file.to_string(),
                source: e,
            }),
        }
    }
}

fn decode<T, R, F>(file: &str, rdr: R, loader: F) -> Result<T, LoadError>
where
    R: Read,
    F: Fn(R) -> Result<T, csv::Error>,
{
    loader(rdr).map_err(|e| LoadError::Decode {
        file: file.to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Derived columns
// ---------------------------------------------------------------------------

/// Half-width of the strike zone in feet.
const ZONE_HALF_WIDTH: f64 = 10.0 / 12.0;
/// Vertical in-zone bound relative to the zone center, in feet.
const ZONE_HALF_HEIGHT: f64 = 0.5;

/// Attach derived columns and order events chronologically.
///
/// Context baselines are computed on the raw values before any rescaling, so
/// an adjusted value is (raw − partition mean) carried through the same unit
/// conversions as its parent metric.
fn attach_derived(
    events: &mut Vec<PitchEvent>,
    run_constant: f64,
    dates: &HashMap<u64, NaiveDate>,
) {
    let dv_baselines = compute_baselines(events, |e| e.decision_value);
    let power_baselines = compute_baselines(events, |e| e.adj_power);

    for event in events.iter_mut() {
        event.decision_value_above_avg =
            adjusted_value(event, &dv_baselines, |e| e.decision_value);
        event.power_above_avg = adjusted_value(event, &power_baselines, |e| e.adj_power);

        // Probability-like metrics become percentages.
        event.swing_agg = event.swing_agg.map(|v| v * 100.0);
        event.strike_zone_judgement = event.strike_zone_judgement.map(|v| v * 100.0);
        event.contact_over_expected = event.contact_over_expected.map(|v| v * 100.0);
        event.in_play_input = event.in_play_input.map(|v| v * 100.0);

        // wOBA-denominated metrics become runs added per 100 pitches.
        event.decision_value = event.decision_value.map(|v| v / run_constant * 100.0);
        event.decision_value_above_avg = event
            .decision_value_above_avg
            .map(|v| v / run_constant * 100.0);
        event.batter_woba = event.batter_woba.map(|v| v / run_constant * 100.0);

        // Zone split of decision value; pitches without a tracked location
        // land on neither side.
        if let (Some(x), Some(z)) = (event.plate_x, event.zone_z) {
            let in_zone = x.abs() <= ZONE_HALF_WIDTH && z.abs() <= ZONE_HALF_HEIGHT;
            if in_zone {
                event.decision_value_in_zone = event.decision_value;
            } else {
                event.decision_value_out_zone = event.decision_value;
            }
        }

        event.game_date = dates.get(&event.pitch_id).copied();
        if event.game_date.is_none() {
            debug!("pitch {} has no game-date mapping", event.pitch_id);
        }
    }

    events.sort_by_key(|e| e.pitch_id);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    // ---- In-memory transport ----

    struct StubTransport {
        files: HashMap<String, Vec<u8>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubTransport {
        fn new(files: HashMap<String, Vec<u8>>) -> Self {
            StubTransport {
                files,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            StubTransport {
                files: HashMap::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataTransport for StubTransport {
        async fn fetch(&self, file: &str) -> Result<Option<Vec<u8>>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::Status {
                    file: file.to_string(),
                    status: 503,
                });
            }
            Ok(self.files.get(file).cloned())
        }
    }

    // ---- Fixture builders ----

    const EVENT_HEADER: &str = "hittername,p_hand,b_hand,pitch_id,balls,strikes,pitch_type_bucket,p_x,p_z,sz_z,strike_zone_top,strike_zone_bottom,swing_agg,strike_zone_judgement,decision_value,contact_over_expected,adj_power,batter_wOBA,in_play_input";

    fn event_row(batter: &str, pitch_id: u64, p_x: f64, sz_z: f64, dv: f64) -> String {
        format!(
            "{},R,L,{},0,0,Fastball,{},2.5,{},3.4,1.6,0.12,0.90,{},0.05,0.02,0.003,0.3",
            batter, pitch_id, p_x, sz_z, dv
        )
    }

    fn month_csv(rows: &[String]) -> Vec<u8> {
        let mut data = String::from(EVENT_HEADER);
        for row in rows {
            data.push('\n');
            data.push_str(row);
        }
        data.into_bytes()
    }

    fn constants_csv() -> Vec<u8> {
        b"year,run_constant\n2023,0.125\n2022,0.120".to_vec()
    }

    fn date_map_csv() -> Vec<u8> {
        b"pitch_id,game_played\n1,2023-04-01\n2,2023-04-01\n3,2023-04-02".to_vec()
    }

    fn season_files() -> HashMap<String, Vec<u8>> {
        let mut files = HashMap::new();
        files.insert(
            "2023_plv_pitches-4.csv".to_string(),
            month_csv(&[
                event_row("Juan Soto", 2, 0.0, 0.0, 0.01),
                event_row("Juan Soto", 1, 0.0, 0.0, 0.03),
            ]),
        );
        files.insert(
            "2023_plv_pitches-5.csv".to_string(),
            month_csv(&[event_row("Corey Seager", 3, 1.5, 0.0, 0.02)]),
        );
        files.insert("plv_seasonal_constants.csv".to_string(), constants_csv());
        files.insert("date_pitch_map.csv".to_string(), date_map_csv());
        files
    }

    fn loader_over(transport: Arc<StubTransport>, ttl: Duration) -> SeasonLoader {
        SeasonLoader::new(transport, ttl, vec![4, 5])
    }

    // ---- Loading ----

    #[tokio::test]
    async fn loads_and_concatenates_months_in_pitch_order() {
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let season = loader.load_season(2023).await.unwrap();
        assert_eq!(season.year, 2023);
        assert_eq!(season.events.len(), 3);
        // Sorted chronologically despite arrival order
        let ids: Vec<u64> = season.events.iter().map(|e| e.pitch_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(season.batters(), vec!["Corey Seager", "Juan Soto"]);
    }

    #[tokio::test]
    async fn absent_month_partition_is_skipped() {
        let mut files = season_files();
        files.remove("2023_plv_pitches-5.csv");
        let transport = Arc::new(StubTransport::new(files));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let season = loader.load_season(2023).await.unwrap();
        assert_eq!(season.events.len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_is_terminal() {
        let transport = Arc::new(StubTransport::failing());
        let loader = loader_over(transport, Duration::from_secs(3600));

        let err = loader.load_season(2023).await.unwrap_err();
        assert!(matches!(err, LoadError::Transport { .. }));
    }

    #[tokio::test]
    async fn empty_season_is_an_error() {
        let mut files = HashMap::new();
        files.insert("plv_seasonal_constants.csv".to_string(), constants_csv());
        files.insert("date_pitch_map.csv".to_string(), date_map_csv());
        let transport = Arc::new(StubTransport::new(files));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let err = loader.load_season(2023).await.unwrap_err();
        assert!(matches!(err, LoadError::EmptySeason { year: 2023 }));
    }

    #[tokio::test]
    async fn missing_run_constant_is_an_error() {
        let mut files = season_files();
        files.insert(
            "plv_seasonal_constants.csv".to_string(),
            b"year,run_constant\n2022,0.120".to_vec(),
        );
        let transport = Arc::new(StubTransport::new(files));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let err = loader.load_season(2023).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingRunConstant { year: 2023 }));
    }

    #[tokio::test]
    async fn missing_date_map_is_an_error() {
        let mut files = season_files();
        files.remove("date_pitch_map.csv");
        let transport = Arc::new(StubTransport::new(files));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let err = loader.load_season(2023).await.unwrap_err();
        assert!(matches!(err, LoadError::MissingFile { .. }));
    }

    // ---- Caching ----

    #[tokio::test]
    async fn cache_hit_does_not_refetch() {
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport.clone(), Duration::from_secs(3600));

        let first = loader.load_season(2023).await.unwrap();
        let calls_after_first = transport.call_count();
        let second = loader.load_season(2023).await.unwrap();

        assert_eq!(transport.call_count(), calls_after_first);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn expired_entry_refetches() {
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport.clone(), Duration::ZERO);

        loader.load_season(2023).await.unwrap();
        let calls_after_first = transport.call_count();
        loader.load_season(2023).await.unwrap();

        assert!(transport.call_count() > calls_after_first);
    }

    #[tokio::test]
    async fn evict_forces_refetch() {
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport.clone(), Duration::from_secs(3600));

        loader.load_season(2023).await.unwrap();
        loader.evict(2023).await;
        let calls_before = transport.call_count();
        loader.load_season(2023).await.unwrap();

        assert!(transport.call_count() > calls_before);
    }

    // ---- Derived columns ----

    #[tokio::test]
    async fn derived_columns_attached() {
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let season = loader.load_season(2023).await.unwrap();
        let first = &season.events[0]; // pitch 1, dv 0.03, in zone

        // Percent metrics scaled by 100
        assert!(approx_eq(first.swing_agg.unwrap(), 12.0, 1e-9));
        assert!(approx_eq(first.strike_zone_judgement.unwrap(), 90.0, 1e-9));
        assert!(approx_eq(first.contact_over_expected.unwrap(), 5.0, 1e-9));
        assert!(approx_eq(first.in_play_input.unwrap(), 30.0, 1e-9));

        // Run normalization: 0.03 / 0.125 * 100 = 24.0
        assert!(approx_eq(first.decision_value.unwrap(), 24.0, 1e-9));
        assert!(approx_eq(first.batter_woba.unwrap(), 0.003 / 0.125 * 100.0, 1e-9));

        // In-zone pitch gets the zone-side split only
        assert!(first.decision_value_in_zone.is_some());
        assert!(first.decision_value_out_zone.is_none());

        // Wide pitch (p_x = 1.5) is out of zone
        let wide = &season.events[2];
        assert!(wide.decision_value_in_zone.is_none());
        assert!(wide.decision_value_out_zone.is_some());

        // Game dates mapped
        assert_eq!(
            first.game_date,
            NaiveDate::from_ymd_opt(2023, 4, 1)
        );
        assert_eq!(
            wide.game_date,
            NaiveDate::from_ymd_opt(2023, 4, 2)
        );
    }

    #[tokio::test]
    async fn context_adjustment_uses_raw_values_then_rescales() {
        // Pitches 1 and 2 share a partition (same location/count/type/hands)
        // with raw DV 0.03 and 0.01: baseline 0.02, adjusted ±0.01, then
        // run-normalized to ±0.01/0.125*100 = ±8.0.
        let transport = Arc::new(StubTransport::new(season_files()));
        let loader = loader_over(transport, Duration::from_secs(3600));

        let season = loader.load_season(2023).await.unwrap();
        let dv_above: Vec<f64> = season
            .events
            .iter()
            .take(2)
            .map(|e| e.decision_value_above_avg.unwrap())
            .collect();
        assert!(approx_eq(dv_above[0], 8.0, 1e-9));
        assert!(approx_eq(dv_above[1], -8.0, 1e-9));

        // Pitch 3 is alone in its partition: adjusted value exactly 0
        assert!(approx_eq(
            season.events[2].power_above_avg.unwrap(),
            0.0,
            1e-9
        ));
    }
}
