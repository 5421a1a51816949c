use color_eyre::Result;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc, time::Duration};
use tracing::{info, warn};
use ulat_ph::{
    api::UlatClient,
    app::App,
    config::{Config, CONFIG_PATH},
    db::SqliteLocationStore,
    dispatch::Dispatcher,
    events::{Event, EventHandler},
    geocoding::{NominatimGeocoder, ReverseGeocodeService, ReverseGeocoder},
    location::{
        DeniedGeolocator, Geolocator, IpGeolocator, LocationResolver, LocationStore,
        ManualGeolocator, ServiceArea,
    },
    logging, ui,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load(CONFIG_PATH);

    // Network stack
    let client = UlatClient::new(
        &config.api.base_url,
        &config.api.user_agent,
        Duration::from_secs(config.api.request_timeout_seconds),
    )?;
    let nominatim = NominatimGeocoder::new(client.http().clone(), config.api.nominatim_url.clone());
    let providers: Vec<Arc<dyn ReverseGeocoder>> = vec![Arc::new(client.clone()), Arc::new(nominatim)];
    let geocoding = ReverseGeocodeService::new(
        providers,
        Duration::from_secs(config.api.geocode_timeout_seconds),
    );

    // Location state
    let store = open_store(&config.location.cache_path)?;
    let resolver = LocationResolver::new(
        store,
        ServiceArea::new(config.location.service_area_keywords.iter()),
    );
    let cached = resolver.load_cached();
    let geolocator = pick_geolocator(&config);
    let poll_interval = Duration::from_secs(config.api.poll_interval_seconds.max(1));

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut events = EventHandler::new(config.ui.tick_rate_ms);
    let mut app = App::new(config, resolver);
    let dispatcher = Dispatcher::new(client, geocoding, events.tx.clone());

    dispatcher.spawn_initial_location(cached, geolocator);
    dispatcher.spawn_poller(poll_interval);
    info!("Ulat PH started");

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        let Some(event) = events.next().await else {
            warn!("Event channel closed");
            break;
        };
        match event {
            Event::Tick => app.on_tick(),
            other => {
                for command in app.apply(other) {
                    dispatcher.dispatch(command);
                }
            }
        }
    }

    restore_terminal(terminal)?;
    info!("Ulat PH stopped");
    Ok(())
}

fn open_store(path: &str) -> Result<Box<dyn LocationStore>> {
    let store = if path.trim().is_empty() {
        SqliteLocationStore::in_memory()?
    } else {
        SqliteLocationStore::open(path)?
    };
    Ok(Box::new(store))
}

fn pick_geolocator(config: &Config) -> Arc<dyn Geolocator> {
    let loc = &config.location;
    if loc.auto_detect {
        return Arc::new(IpGeolocator::new(loc.lookup_ip.clone()));
    }
    match (loc.manual_lat, loc.manual_lon) {
        (Some(lat), Some(lon)) => Arc::new(ManualGeolocator::new(lat, lon)),
        _ => Arc::new(DeniedGeolocator),
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Give the terminal back before printing the panic
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
