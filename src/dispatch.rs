//! Runs [`Command`]s on background tasks and reports back through the event channel.

use crate::api::UlatClient;
use crate::app::Command;
use crate::events::Event;
use crate::geocoding::ReverseGeocodeService;
use crate::location::{resolve_initial_location, Geolocator};
use crate::models::Location;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Dispatcher {
    client: UlatClient,
    geocoding: ReverseGeocodeService,
    tx: UnboundedSender<Event>,
    fetches: Arc<AtomicU64>,
}

impl Dispatcher {
    pub fn new(client: UlatClient, geocoding: ReverseGeocodeService, tx: UnboundedSender<Event>) -> Self {
        Self {
            client,
            geocoding,
            tx,
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("Event loop gone; dropping task result");
        }
    }

    /// Fetches the full report list, numbering the request so the UI can
    /// discard an answer that was overtaken by a newer one.
    async fn load_reports(&self) {
        let seq = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.client.fetch_reports(None).await;
        if let Err(e) = &result {
            warn!("Report fetch #{} failed: {}", seq, e);
        }
        self.send(Event::ReportsLoaded {
            seq,
            result: result.map_err(|e| e.to_string()),
        });
    }

    /// Looks up the starting location once, in the background.
    pub fn spawn_initial_location(&self, cached: Option<Location>, geolocator: Arc<dyn Geolocator>) {
        let this = self.clone();
        tokio::spawn(async move {
            let initial = resolve_initial_location(cached, geolocator.as_ref(), &this.geocoding).await;
            this.send(Event::InitialLocation(initial));
        });
    }

    /// Refetches the report list every `interval` for the lifetime of the app.
    pub fn spawn_poller(&self, interval: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                this.load_reports().await;
                tokio::time::sleep(interval).await;
            }
        });
    }

    pub fn dispatch(&self, command: Command) {
        debug!("Dispatching {:?}", command);
        let this = self.clone();
        tokio::spawn(async move { this.run(command).await });
    }

    async fn run(&self, command: Command) {
        match command {
            Command::RefreshReports => self.load_reports().await,
            Command::LoadDashboard(filter) => {
                let result = self.client.fetch_reports(filter).await;
                self.send(Event::DashboardLoaded {
                    filter,
                    result: result.map_err(|e| e.to_string()),
                });
            }
            Command::ResolvePin { ticket, coords } => {
                let candidate = self.geocoding.locate(coords.latitude, coords.longitude).await;
                self.send(Event::PinResolved { ticket, candidate });
            }
            Command::SearchPlace { ticket, query } => match self.client.save_location(&query).await {
                Ok(found) => {
                    // The typed name is not trusted for the service-area check.
                    let candidate = self.geocoding.locate(found.latitude, found.longitude).await;
                    self.send(Event::PinResolved { ticket, candidate });
                }
                Err(e) => {
                    warn!("Place search for {:?} failed: {}", query, e);
                    self.send(Event::PlaceSearchFailed(e.to_string()));
                }
            },
            Command::Vote { report_id, kind } => {
                let result = self.client.vote(&report_id, kind).await;
                self.send(Event::VoteFinished {
                    report_id,
                    kind,
                    result: result.map_err(|e| e.to_string()),
                });
            }
            Command::CheckUserStatus(report_id) => match self.client.user_status(&report_id).await {
                Ok(status) => self.send(Event::UserStatus { report_id, status }),
                Err(e) => warn!("Error checking user vote status for {}: {}", report_id, e),
            },
            Command::Submit(report) => {
                let result = self.client.submit_report(&report).await;
                self.send(Event::SubmitFinished(result.map_err(|e| e.to_string())));
            }
            Command::UpdateStatus { report_id, status } => {
                let result = self.client.update_status(&report_id, status).await;
                self.send(Event::StatusUpdated {
                    report_id,
                    status,
                    result: result.map_err(|e| e.to_string()),
                });
            }
            Command::Delete(report_id) => {
                let result = self.client.delete_report(&report_id).await;
                self.send(Event::Deleted {
                    report_id,
                    result: result.map_err(|e| e.to_string()),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::testing::FixedGeocoder;
    use crate::geocoding::ReverseGeocoder;
    use crate::location::{DeniedGeolocator, InitialLocation, LocationResolver, ManualGeolocator};
    use crate::location::testing::{metro_manila, MemoryStore};
    use crate::models::Coordinates;
    use reqwest::Client;
    use tokio::sync::mpsc;

    fn dispatcher(name: &str) -> (Dispatcher, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let providers: Vec<Arc<dyn ReverseGeocoder>> = vec![Arc::new(FixedGeocoder::answering(name))];
        let geocoding = ReverseGeocodeService::new(providers, Duration::from_millis(100));
        // Port 9 (discard) is never served in the test environment.
        let client = UlatClient::with_client(Client::new(), "http://127.0.0.1:9");
        (Dispatcher::new(client, geocoding, tx), rx)
    }

    #[tokio::test]
    async fn report_fetches_are_numbered_in_issue_order() {
        let (dispatcher, mut rx) = dispatcher("unused");

        dispatcher.run(Command::RefreshReports).await;
        dispatcher.run(Command::RefreshReports).await;

        let mut seqs = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Event::ReportsLoaded { seq, .. } = event {
                seqs.push(seq);
            }
        }
        assert_eq!(seqs, vec![1, 2]);
    }

    #[tokio::test]
    async fn pin_drop_comes_back_named_with_its_ticket() {
        let (dispatcher, mut rx) = dispatcher("Pasig, Metro Manila, Philippines");
        let mut resolver = LocationResolver::new(Box::new(MemoryStore::default()), metro_manila());
        let ticket = resolver.issue_ticket();

        dispatcher.dispatch(Command::ResolvePin {
            ticket,
            coords: Coordinates::new(14.5764, 121.0851),
        });

        match rx.recv().await {
            Some(Event::PinResolved { ticket: got, candidate }) => {
                assert_eq!(got, ticket);
                assert_eq!(candidate.display_name, "Pasig, Metro Manila, Philippines");
                assert_eq!(candidate.latitude, 14.5764);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn initial_location_is_geolocated_then_named() {
        let (dispatcher, mut rx) = dispatcher("Ermita, Manila, Metro Manila, Philippines");

        dispatcher.spawn_initial_location(None, Arc::new(ManualGeolocator::new(14.5995, 120.9842)));

        match rx.recv().await {
            Some(Event::InitialLocation(InitialLocation::Located(candidate))) => {
                assert_eq!(candidate.display_name, "Ermita, Manila, Metro Manila, Philippines");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_geolocation_is_reported() {
        let (dispatcher, mut rx) = dispatcher("unused");

        dispatcher.spawn_initial_location(None, Arc::new(DeniedGeolocator));

        assert!(matches!(
            rx.recv().await,
            Some(Event::InitialLocation(InitialLocation::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_surfaces_as_an_error_event() {
        let (dispatcher, mut rx) = dispatcher("unused");

        dispatcher.dispatch(Command::RefreshReports);

        match rx.recv().await {
            Some(Event::ReportsLoaded { seq, result }) => {
                assert_eq!(seq, 1);
                assert!(result.is_err());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
