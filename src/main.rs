use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use gridwatch::app::{App, AppConfig};
use gridwatch::config::{self, Configuration, Settings};
use gridwatch::controller::Controller;
use gridwatch::data::duration::parse_duration;
use gridwatch::events;
use gridwatch::ui::{Theme, TuiRenderer};
use gridwatch_adapters::{DatasourceRouter, GatherLogger};
use gridwatch_types::Dashboard;

const DEFAULT_LOG_PATH: &str = "gridwatch.log";

#[derive(Parser, Debug)]
#[command(name = "gridwatch")]
#[command(about = "Terminal dashboards for Prometheus, Graphite and InfluxDB metrics")]
struct Args {
    /// Path to the dashboard configuration file
    #[arg(short, long, default_value = "dashboard.json")]
    cfg: PathBuf,

    /// Dashboard refresh interval (e.g. "10s", "1m")
    #[arg(short, long)]
    refresh_interval: Option<String>,

    /// Relative duration of the window from now (e.g. "1h", "7d")
    #[arg(short = 'd', long)]
    relative_duration: Option<String>,

    /// Fixed window start: a duration ago ("2h") or an RFC3339 time
    #[arg(short, long)]
    start: Option<String>,

    /// Fixed window end: a duration ago ("1h") or an RFC3339 time
    #[arg(short, long)]
    end: Option<String>,

    /// Override a dashboard variable (repeatable)
    #[arg(short, long = "var", value_name = "NAME=VALUE", value_parser = parse_key_val)]
    vars: Vec<(String, String)>,

    /// Replace a dashboard datasource with a user datasource (repeatable)
    #[arg(short = 'a', long = "ds-alias", value_name = "DASHBOARD_ID=USER_ID", value_parser = parse_key_val)]
    ds_aliases: Vec<(String, String)>,

    /// Path to the user datasources file
    #[arg(short, long)]
    user_datasources: Option<PathBuf>,

    /// Path to the application settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log file used in debug mode
    #[arg(long)]
    log_path: Option<PathBuf>,

    /// Write debug logs to the log file
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let settings_path = args.settings.clone().or_else(Settings::default_path);
    let settings =
        Settings::load(settings_path.as_deref()).context("error loading the settings")?;

    if args.debug {
        let log_path = args
            .log_path
            .clone()
            .or_else(|| settings.log_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH));
        init_logging(&log_path)?;
    }

    let app_cfg = app_config(&args, &settings, Utc::now())?;

    let cfg = Configuration::load(&args.cfg)
        .with_context(|| format!("error loading {}", args.cfg.display()))?;

    let user_datasources = match args
        .user_datasources
        .clone()
        .or_else(|| settings.user_datasources.clone())
        .or_else(config::default_user_datasources_path)
    {
        Some(path) => config::load_user_datasources(&path)
            .with_context(|| format!("error loading user datasources {}", path.display()))?,
        None => Vec::new(),
    };

    let aliases: HashMap<String, String> = args.ds_aliases.iter().cloned().collect();
    let router = DatasourceRouter::new(&cfg.datasources, &user_datasources, &aliases)
        .context("error creating the datasources")?
        .map_gatherers(|_, g| GatherLogger::wrap(g));
    tracing::info!(
        datasources = cfg.datasources.len(),
        user_datasources = user_datasources.len(),
        "datasources loaded"
    );

    let renderer = Arc::new(TuiRenderer::new(Theme::auto_detect()));
    let app = App::new(app_cfg, Controller::new(Arc::new(router)), renderer.clone());

    run_tui(app, cfg.dashboard, renderer)
}

/// Send tracing output to `path`. `RUST_LOG` overrides the debug level.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("error creating log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("error initializing logging: {e}"))?;
    Ok(())
}

/// Merge the flags over the settings.
fn app_config(args: &Args, settings: &Settings, now: DateTime<Utc>) -> Result<AppConfig> {
    let duration_of = |flag: &Option<String>, setting: &Option<String>| -> Result<Duration> {
        match flag.as_ref().or(setting.as_ref()) {
            Some(s) => parse_duration(s),
            None => Ok(Duration::ZERO),
        }
    };

    let start = args.start.as_deref().map(|s| parse_time(s, now)).transpose()?;
    let end = args.end.as_deref().map(|s| parse_time(s, now)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            bail!("end ({end}) can't be before start ({start})");
        }
    }

    Ok(AppConfig {
        refresh_interval: duration_of(&args.refresh_interval, &settings.refresh_interval)
            .context("invalid refresh interval")?,
        relative_duration: duration_of(&args.relative_duration, &settings.relative_duration)
            .context("invalid relative duration")?,
        start,
        end,
        override_vars: args.vars.iter().cloned().collect::<BTreeMap<_, _>>(),
        ..AppConfig::default()
    })
}

/// A duration ago from `now`, or an RFC3339 time.
fn parse_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(d) = parse_duration(s) {
        let d = chrono::Duration::from_std(d).context("duration out of range")?;
        return Ok(now - d);
    }
    let t = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("{s:?} is neither a duration nor an RFC3339 time"))?;
    Ok(t.with_timezone(&Utc))
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Run the dashboard: the sync loop on a tokio runtime, the draw loop on
/// this thread.
fn run_tui(app: App, dashboard: Dashboard, renderer: Arc<TuiRenderer>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = rt.spawn(async move { app.run(&dashboard, shutdown_rx).await });

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let result = draw_loop(&mut terminal, &renderer, || handle.is_finished());

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    let _ = shutdown_tx.send(true);
    rt.block_on(handle).context("dashboard task failed")??;
    result
}

fn draw_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    renderer: &TuiRenderer,
    app_finished: impl Fn() -> bool,
) -> Result<()> {
    // The app only finishes on its own when loading the dashboard failed.
    while !app_finished() {
        terminal.draw(|frame| renderer.draw(frame))?;

        if let Some(Event::Key(key)) = events::poll_event(Duration::from_millis(100))? {
            if events::is_quit(&key) {
                tracing::info!("quit requested");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("2h", now()).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("2023-12-31T23:00:00+01:00", now()).unwrap(),
            Utc.with_ymd_and_hms(2023, 12, 31, 22, 0, 0).unwrap()
        );
        assert!(parse_time("yesterday", now()).is_err());
    }

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_key_val("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("env").is_err());
        assert!(parse_key_val("=prod").is_err());
    }

    #[test]
    fn test_flags_win_over_settings() {
        let args = Args::parse_from([
            "gridwatch",
            "-r",
            "30s",
            "-v",
            "env=prod",
            "--start",
            "3h",
        ]);
        let settings = Settings {
            refresh_interval: Some("1m".into()),
            relative_duration: Some("6h".into()),
            ..Settings::default()
        };

        let cfg = app_config(&args, &settings, now()).unwrap();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(30));
        assert_eq!(cfg.relative_duration, Duration::from_secs(6 * 3_600));
        assert_eq!(cfg.start, Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()));
        assert_eq!(cfg.end, None);
        assert_eq!(cfg.override_vars.get("env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let args = Args::parse_from(["gridwatch", "--start", "1h", "--end", "2h"]);
        assert!(app_config(&args, &Settings::default(), now()).is_err());
    }
}
