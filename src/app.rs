//! Application state for the Ulat PH client.
//!
//! [`App`] turns key presses and background results into state changes and
//! [`Command`]s; it never does I/O itself.

use crate::config::Config;
use crate::events::Event;
use crate::location::{Commit, InitialLocation, LocationResolver, PinTicket};
use crate::models::{Coordinates, IssueType, Location, NewReport, Report, ReportDraft, ReportStatus};
use crate::proximity::{default_selection, filter_nearby};
use crate::votes::{VoteKind, VoteTracker};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a notice stays on screen.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Work the UI asks for; executed off the UI loop by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RefreshReports,
    LoadDashboard(Option<ReportStatus>),
    ResolvePin {
        ticket: PinTicket,
        coords: Coordinates,
    },
    SearchPlace {
        ticket: PinTicket,
        query: String,
    },
    Vote {
        report_id: String,
        kind: VoteKind,
    },
    CheckUserStatus(String),
    Submit(NewReport),
    UpdateStatus {
        report_id: String,
        status: ReportStatus,
    },
    Delete(String),
}

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum ViewMode {
    #[default]
    Reports,
    Location,
    Submit,
    Dashboard,
}

impl ViewMode {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "location" => ViewMode::Location,
            "submit" => ViewMode::Submit,
            "dashboard" => ViewMode::Dashboard,
            _ => ViewMode::Reports,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationStatus {
    Locating,
    Ready,
    /// Geolocation refused or failed; the user can still place a pin or search.
    Unavailable(String),
    /// The only candidate so far was outside the service area.
    OutsideArea(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
    pub raised_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormField {
    #[default]
    IssueType,
    CustomIssue,
    Description,
    ImagePath,
}

impl FormField {
    const ORDER: [FormField; 4] = [
        FormField::IssueType,
        FormField::CustomIssue,
        FormField::Description,
        FormField::ImagePath,
    ];

    fn step(self, forward: bool) -> Self {
        let idx = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let len = Self::ORDER.len();
        let next = if forward { (idx + 1) % len } else { (idx + len - 1) % len };
        Self::ORDER[next]
    }
}

pub struct App {
    pub config: Config,
    pub view_mode: ViewMode,
    pub tick_count: usize,
    pub should_quit: bool,

    // Location
    pub resolver: LocationResolver,
    pub location_status: LocationStatus,
    pub pin: Option<Coordinates>,
    pub place_query: Option<String>,

    // Nearby reports
    pub all_reports: Vec<Report>,
    pub nearby: Vec<Report>,
    pub selected: Option<usize>,
    pub votes: VoteTracker,

    // Submission form
    pub draft: ReportDraft,
    pub form_field: FormField,
    pub submitting: bool,

    // Dashboard
    pub dashboard: Vec<Report>,
    pub dashboard_filter: Option<ReportStatus>,
    pub dashboard_index: usize,
    pub dashboard_pending: HashSet<String>,
    pub confirm_delete: Option<String>,

    // Feedback
    pub notice: Option<Notice>,
    pub last_update: Option<Instant>,
    pub last_update_success: bool,
    reports_seq: u64,
}

impl App {
    pub fn new(config: Config, resolver: LocationResolver) -> Self {
        let pin = resolver.current().map(Location::coordinates);
        let location_status = if pin.is_some() {
            LocationStatus::Ready
        } else {
            LocationStatus::Locating
        };
        Self {
            view_mode: ViewMode::from_name(&config.ui.default_view),
            config,
            tick_count: 0,
            should_quit: false,
            resolver,
            location_status,
            pin,
            place_query: None,
            all_reports: Vec::new(),
            nearby: Vec::new(),
            selected: None,
            votes: VoteTracker::new(),
            draft: ReportDraft::default(),
            form_field: FormField::default(),
            submitting: false,
            dashboard: Vec::new(),
            dashboard_filter: None,
            dashboard_index: 0,
            dashboard_pending: HashSet::new(),
            confirm_delete: None,
            notice: None,
            last_update: None,
            last_update_success: false,
            reports_seq: 0,
        }
    }

    pub fn current_location(&self) -> Option<&Location> {
        self.resolver.current()
    }

    pub fn selected_report(&self) -> Option<&Report> {
        self.selected.and_then(|i| self.nearby.get(i))
    }

    pub fn selected_dashboard_report(&self) -> Option<&Report> {
        self.dashboard.get(self.dashboard_index)
    }

    /// Public URL of an uploaded report photo.
    pub fn image_url(&self, filename: &str) -> String {
        format!(
            "{}/api/images/{}",
            self.config.api.base_url.trim_end_matches('/'),
            filename
        )
    }

    fn notify(&mut self, tone: Tone, text: impl Into<String>) {
        self.notice = Some(Notice {
            tone,
            text: text.into(),
            raised_at: Instant::now(),
        });
    }

    pub fn on_tick(&mut self) {
        self.tick_count += 1;
        if self
            .notice
            .as_ref()
            .is_some_and(|n| n.raised_at.elapsed() >= NOTICE_TTL)
        {
            self.notice = None;
        }
    }

    // Input handling

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }

        if self.place_query.is_some() {
            return self.handle_search_key(key);
        }
        if self.view_mode == ViewMode::Submit {
            return self.handle_form_key(key);
        }
        if let Some(report_id) = self.confirm_delete.take() {
            if key.code == KeyCode::Char('y') {
                self.dashboard_pending.insert(report_id.clone());
                return vec![Command::Delete(report_id)];
            }
            self.notify(Tone::Info, "Delete cancelled");
            return Vec::new();
        }

        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return Vec::new();
            }
            KeyCode::Char('1') => return self.switch_view(ViewMode::Reports),
            KeyCode::Char('2') => return self.switch_view(ViewMode::Location),
            KeyCode::Char('3') => return self.switch_view(ViewMode::Submit),
            KeyCode::Char('4') => return self.switch_view(ViewMode::Dashboard),
            KeyCode::Char('r') => {
                return match self.view_mode {
                    ViewMode::Dashboard => vec![Command::LoadDashboard(self.dashboard_filter)],
                    _ => vec![Command::RefreshReports],
                };
            }
            _ => {}
        }

        match self.view_mode {
            ViewMode::Reports => self.handle_reports_key(key),
            ViewMode::Location => self.handle_location_key(key),
            ViewMode::Dashboard => self.handle_dashboard_key(key),
            ViewMode::Submit => Vec::new(),
        }
    }

    fn switch_view(&mut self, view: ViewMode) -> Vec<Command> {
        self.view_mode = view;
        match view {
            ViewMode::Dashboard => vec![Command::LoadDashboard(self.dashboard_filter)],
            _ => Vec::new(),
        }
    }

    fn handle_reports_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Char('s') => self.vote(VoteKind::Sighting),
            KeyCode::Char('f') => self.vote(VoteKind::Resolved),
            _ => Vec::new(),
        }
    }

    fn move_selection(&mut self, forward: bool) -> Vec<Command> {
        if self.nearby.is_empty() {
            return Vec::new();
        }
        let len = self.nearby.len();
        let next = match self.selected {
            None => 0,
            Some(i) if forward => (i + 1) % len,
            Some(i) => i.checked_sub(1).unwrap_or(len - 1),
        };
        self.selected = Some(next);
        vec![Command::CheckUserStatus(self.nearby[next].id.clone())]
    }

    fn vote(&mut self, kind: VoteKind) -> Vec<Command> {
        let Some(report_id) = self.selected_report().map(|r| r.id.clone()) else {
            return Vec::new();
        };
        if self.votes.try_begin(&report_id, kind) {
            return vec![Command::Vote { report_id, kind }];
        }
        if self.votes.state(&report_id).has_voted(kind) {
            let text = match kind {
                VoteKind::Sighting => "You already confirmed seeing this issue",
                VoteKind::Resolved => "You already marked this issue as resolved",
            };
            self.notify(Tone::Info, text);
        }
        Vec::new()
    }

    fn handle_location_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let step = self.config.ui.pin_step_degrees;
        let nudge = match key.code {
            KeyCode::Up | KeyCode::Char('k') => Some((step, 0.0)),
            KeyCode::Down | KeyCode::Char('j') => Some((-step, 0.0)),
            KeyCode::Left | KeyCode::Char('h') => Some((0.0, -step)),
            KeyCode::Right | KeyCode::Char('l') => Some((0.0, step)),
            _ => None,
        };
        if let Some((d_lat, d_lon)) = nudge {
            if let Some(pin) = self.pin.as_mut() {
                pin.latitude = (pin.latitude + d_lat).clamp(-90.0, 90.0);
                pin.longitude = (pin.longitude + d_lon).clamp(-180.0, 180.0);
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Enter => self.drop_pin(),
            KeyCode::Char('/') => {
                self.place_query = Some(String::new());
                Vec::new()
            }
            KeyCode::Char('c') => {
                self.pin = self.current_location().map(Location::coordinates);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Ends a pin move: the marker position goes off to be named and validated.
    pub fn drop_pin(&mut self) -> Vec<Command> {
        let Some(coords) = self.pin else {
            return Vec::new();
        };
        let ticket = self.resolver.issue_ticket();
        debug!("Pin dropped at ({}, {})", coords.latitude, coords.longitude);
        vec![Command::ResolvePin { ticket, coords }]
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Some(query) = self.place_query.as_mut() else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Esc => self.place_query = None,
            KeyCode::Backspace => {
                query.pop();
            }
            KeyCode::Char(c) => query.push(c),
            KeyCode::Enter => {
                let query = self.place_query.take().unwrap_or_default();
                let query = query.trim().to_string();
                if query.is_empty() {
                    return Vec::new();
                }
                let ticket = self.resolver.issue_ticket();
                return vec![Command::SearchPlace { ticket, query }];
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Esc => self.view_mode = ViewMode::Reports,
            KeyCode::Tab | KeyCode::Down => self.form_field = self.form_field.step(true),
            KeyCode::BackTab | KeyCode::Up => self.form_field = self.form_field.step(false),
            KeyCode::Enter => return self.submit(),
            KeyCode::Left if self.form_field == FormField::IssueType => self.cycle_issue(false),
            KeyCode::Right if self.form_field == FormField::IssueType => self.cycle_issue(true),
            KeyCode::Char(' ') if self.form_field == FormField::IssueType => {
                self.cycle_issue(true)
            }
            KeyCode::Backspace => {
                if let Some(text) = self.focused_text() {
                    text.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = self.focused_text() {
                    text.push(c);
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn focused_text(&mut self) -> Option<&mut String> {
        match self.form_field {
            FormField::IssueType => None,
            FormField::CustomIssue => Some(&mut self.draft.custom_issue),
            FormField::Description => Some(&mut self.draft.description),
            FormField::ImagePath => Some(&mut self.draft.image_path),
        }
    }

    fn cycle_issue(&mut self, forward: bool) {
        let options = &IssueType::SELECTABLE;
        let len = options.len();
        let next = match self
            .draft
            .issue_type
            .as_ref()
            .and_then(|current| options.iter().position(|o| o == current))
        {
            None => 0,
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
        };
        self.draft.issue_type = Some(options[next].clone());
    }

    pub fn submit(&mut self) -> Vec<Command> {
        if self.submitting {
            return Vec::new();
        }
        match self.draft.validate(self.resolver.current()) {
            Ok(report) => {
                self.submitting = true;
                vec![Command::Submit(report)]
            }
            Err(e) => {
                self.notify(Tone::Error, e.to_string());
                Vec::new()
            }
        }
    }

    fn handle_dashboard_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                if !self.dashboard.is_empty() {
                    self.dashboard_index = (self.dashboard_index + 1) % self.dashboard.len();
                }
                Vec::new()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                if !self.dashboard.is_empty() {
                    self.dashboard_index = self
                        .dashboard_index
                        .checked_sub(1)
                        .unwrap_or(self.dashboard.len() - 1);
                }
                Vec::new()
            }
            KeyCode::Char('f') => {
                self.dashboard_filter = match self.dashboard_filter {
                    None => Some(ReportStatus::Pending),
                    Some(ReportStatus::Pending) => Some(ReportStatus::InProgress),
                    Some(ReportStatus::InProgress) => Some(ReportStatus::Resolved),
                    Some(ReportStatus::Resolved) => None,
                };
                vec![Command::LoadDashboard(self.dashboard_filter)]
            }
            KeyCode::Char('a') => {
                let Some(report) = self.selected_dashboard_report() else {
                    return Vec::new();
                };
                let report_id = report.id.clone();
                let status = report.status.next();
                if !self.dashboard_pending.insert(report_id.clone()) {
                    return Vec::new();
                }
                vec![Command::UpdateStatus { report_id, status }]
            }
            KeyCode::Char('d') => {
                if let Some(report) = self.selected_dashboard_report() {
                    if !self.dashboard_pending.contains(&report.id) {
                        let report_id = report.id.clone();
                        self.notify(Tone::Info, "Delete this report? Press y to confirm");
                        self.confirm_delete = Some(report_id);
                    }
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    // Background results

    pub fn apply(&mut self, event: Event) -> Vec<Command> {
        match event {
            Event::Tick => {
                self.on_tick();
                Vec::new()
            }
            Event::Input(key) => self.handle_key(key),
            Event::InitialLocation(initial) => self.apply_initial_location(initial),
            Event::PinResolved { ticket, candidate } => {
                let commit = self.resolver.commit_pin(ticket, candidate);
                self.apply_commit(commit)
            }
            Event::PlaceSearchFailed(message) => {
                self.notify(Tone::Error, format!("Place search failed: {}", message));
                Vec::new()
            }
            Event::ReportsLoaded { seq, result } => {
                if seq < self.reports_seq {
                    debug!("Dropping report fetch #{} (have #{})", seq, self.reports_seq);
                    return Vec::new();
                }
                self.reports_seq = seq;
                self.last_update = Some(Instant::now());
                match result {
                    Ok(reports) => {
                        self.last_update_success = true;
                        self.all_reports = reports;
                        self.refilter()
                    }
                    Err(e) => {
                        self.last_update_success = false;
                        self.notify(Tone::Error, format!("Could not load reports: {}", e));
                        Vec::new()
                    }
                }
            }
            Event::DashboardLoaded { filter, result } => {
                if filter != self.dashboard_filter {
                    return Vec::new();
                }
                match result {
                    Ok(reports) => {
                        self.dashboard = reports;
                        if self.dashboard_index >= self.dashboard.len() {
                            self.dashboard_index = 0;
                        }
                    }
                    Err(e) => self.notify(Tone::Error, format!("Failed to fetch reports: {}", e)),
                }
                Vec::new()
            }
            Event::VoteFinished {
                report_id,
                kind,
                result,
            } => {
                self.votes.finish(&report_id, kind, result.is_ok());
                match result {
                    Ok(receipt) => {
                        let fallback = match kind {
                            VoteKind::Sighting => "Sighting recorded",
                            VoteKind::Resolved => "Resolution recorded",
                        };
                        self.notify(
                            Tone::Success,
                            receipt.message.unwrap_or_else(|| fallback.to_string()),
                        );
                        if receipt.report_deleted {
                            self.all_reports.retain(|r| r.id != report_id);
                            self.selected = None;
                            let mut commands = self.refilter();
                            commands.push(Command::RefreshReports);
                            return commands;
                        }
                        vec![Command::RefreshReports]
                    }
                    Err(e) => {
                        let what = match kind {
                            VoteKind::Sighting => "Failed to record sighting",
                            VoteKind::Resolved => "Failed to record resolution",
                        };
                        self.notify(Tone::Error, format!("{}: {}", what, e));
                        Vec::new()
                    }
                }
            }
            Event::UserStatus { report_id, status } => {
                self.votes.apply_user_status(&report_id, status);
                Vec::new()
            }
            Event::SubmitFinished(result) => {
                self.submitting = false;
                match result {
                    Ok(message) => {
                        self.notify(Tone::Success, message);
                        self.draft = ReportDraft::default();
                        self.form_field = FormField::default();
                        vec![Command::RefreshReports]
                    }
                    Err(e) => {
                        self.notify(Tone::Error, e);
                        Vec::new()
                    }
                }
            }
            Event::StatusUpdated {
                report_id,
                status,
                result,
            } => {
                self.dashboard_pending.remove(&report_id);
                match result {
                    Ok(()) => {
                        for report in self
                            .dashboard
                            .iter_mut()
                            .chain(self.all_reports.iter_mut())
                            .chain(self.nearby.iter_mut())
                            .filter(|r| r.id == report_id)
                        {
                            report.status = status;
                        }
                        self.notify(Tone::Success, format!("Report marked {}", status));
                        if self.dashboard_filter.is_some_and(|f| f != status) {
                            return vec![Command::LoadDashboard(self.dashboard_filter)];
                        }
                    }
                    Err(e) => self.notify(Tone::Error, format!("Failed to update report: {}", e)),
                }
                Vec::new()
            }
            Event::Deleted { report_id, result } => {
                self.dashboard_pending.remove(&report_id);
                match result {
                    Ok(()) => {
                        self.dashboard.retain(|r| r.id != report_id);
                        if self.dashboard_index >= self.dashboard.len() {
                            self.dashboard_index = self.dashboard.len().saturating_sub(1);
                        }
                        self.all_reports.retain(|r| r.id != report_id);
                        self.notify(Tone::Success, "Report deleted");
                        self.refilter()
                    }
                    Err(e) => {
                        self.notify(Tone::Error, format!("Failed to delete report: {}", e));
                        Vec::new()
                    }
                }
            }
        }
    }

    fn apply_initial_location(&mut self, initial: InitialLocation) -> Vec<Command> {
        match initial {
            InitialLocation::Cached(location) => {
                self.resolver.restore(location);
                self.pin = self.current_location().map(Location::coordinates);
                self.location_status = LocationStatus::Ready;
                self.refilter()
            }
            InitialLocation::Located(candidate) => {
                if let Some(current) = self.resolver.current() {
                    debug!(
                        "Ignoring startup location {}; {} was already chosen",
                        candidate.display_name, current.display_name
                    );
                    return Vec::new();
                }
                let commit = self.resolver.validate_and_commit(candidate, None);
                self.apply_commit(commit)
            }
            InitialLocation::Unavailable(e) => {
                if self.resolver.current().is_none() {
                    self.location_status = LocationStatus::Unavailable(e.to_string());
                    self.notify(Tone::Error, e.to_string());
                }
                Vec::new()
            }
        }
    }

    fn apply_commit(
        &mut self,
        commit: Result<Commit, crate::location::StoreError>,
    ) -> Vec<Command> {
        let commit = match commit {
            Ok(commit) => commit,
            Err(e) => {
                warn!("Location could not be saved: {}", e);
                self.pin = self.current_location().map(Location::coordinates);
                self.notify(Tone::Error, format!("Could not save location: {}", e));
                return Vec::new();
            }
        };

        match commit {
            Commit::Accepted(location) => {
                self.pin = Some(location.coordinates());
                self.location_status = LocationStatus::Ready;
                self.notify(Tone::Success, format!("Location set: {}", location.display_name));
                let mut commands = self.refilter();
                commands.push(Command::RefreshReports);
                commands
            }
            Commit::Reverted { kept, rejected } => {
                self.pin = Some(kept.coordinates());
                self.notify(
                    Tone::Error,
                    format!("{} is outside the service area", rejected.display_name),
                );
                Vec::new()
            }
            Commit::NoLocation { rejected } => {
                self.location_status = LocationStatus::OutsideArea(rejected.display_name.clone());
                self.notify(
                    Tone::Error,
                    format!("{} is outside the service area", rejected.display_name),
                );
                Vec::new()
            }
            Commit::Stale => Vec::new(),
        }
    }

    /// Recomputes the nearby list, keeping the selected report when it is
    /// still nearby and falling back to the first one otherwise.
    fn refilter(&mut self) -> Vec<Command> {
        let previous = self.selected_report().map(|r| r.id.clone());
        self.nearby = filter_nearby(
            self.resolver.current(),
            &self.all_reports,
            self.config.location.nearby_radius_km,
        );

        self.selected = previous
            .as_ref()
            .and_then(|id| self.nearby.iter().position(|r| &r.id == id))
            .or_else(|| default_selection(&self.nearby).map(|_| 0));

        match self.selected_report() {
            Some(report) if previous.as_deref() != Some(report.id.as_str()) => {
                vec![Command::CheckUserStatus(report.id.clone())]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::testing::{metro_manila, MemoryStore};
    use crate::location::GeolocationError;
    use crate::models::VoteReceipt;
    use serde_json::json;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with(store: MemoryStore) -> App {
        let resolver = LocationResolver::new(Box::new(store), metro_manila());
        App::new(Config::default(), resolver)
    }

    fn manila() -> Location {
        Location::new("Ermita, Manila, Metro Manila, Philippines", 14.5995, 120.9842)
    }

    fn report(id: u32, lat: f64, lng: f64) -> Report {
        Report::from_value(json!({
            "id": id,
            "issue_type": "pothole",
            "latitude": lat,
            "longitude": lng
        }))
        .unwrap()
    }

    fn loaded(reports: Vec<Report>) -> Event {
        Event::ReportsLoaded {
            seq: 1,
            result: Ok(reports),
        }
    }

    fn ticket_of(commands: &[Command]) -> PinTicket {
        match commands {
            [Command::ResolvePin { ticket, .. }] => *ticket,
            other => panic!("unexpected commands {other:?}"),
        }
    }

    fn located_app() -> App {
        let mut app = app_with(MemoryStore::default());
        app.apply(Event::InitialLocation(InitialLocation::Cached(manila())));
        app
    }

    #[test]
    fn loaded_reports_are_filtered_and_first_is_selected() {
        let mut app = located_app();

        let commands = app.apply(loaded(vec![
            report(2, 15.0, 121.5),
            report(1, 14.6000, 120.9850),
        ]));

        assert_eq!(app.nearby.len(), 1);
        assert_eq!(app.selected_report().map(|r| r.id.as_str()), Some("1"));
        assert_eq!(commands, vec![Command::CheckUserStatus("1".into())]);
    }

    #[test]
    fn no_location_means_no_nearby_reports() {
        let mut app = app_with(MemoryStore::default());
        app.apply(loaded(vec![report(1, 14.6000, 120.9850)]));
        assert!(app.nearby.is_empty());
        assert!(app.selected_report().is_none());
    }

    #[test]
    fn resolved_vote_goes_out_only_once() {
        let mut app = located_app();
        app.apply(loaded(vec![report(7, 14.5996, 120.9843)]));

        let first = app.handle_key(key(KeyCode::Char('f')));
        assert_eq!(
            first,
            vec![Command::Vote {
                report_id: "7".into(),
                kind: VoteKind::Resolved
            }]
        );
        assert!(app.handle_key(key(KeyCode::Char('f'))).is_empty());

        let after = app.apply(Event::VoteFinished {
            report_id: "7".into(),
            kind: VoteKind::Resolved,
            result: Ok(VoteReceipt::default()),
        });
        assert_eq!(after, vec![Command::RefreshReports]);

        assert!(app.handle_key(key(KeyCode::Char('f'))).is_empty());
        assert_eq!(app.notice.as_ref().map(|n| n.tone), Some(Tone::Info));
    }

    #[test]
    fn deleted_report_clears_selection() {
        let mut app = located_app();
        app.apply(loaded(vec![report(7, 14.5996, 120.9843)]));
        app.handle_key(key(KeyCode::Char('f')));

        app.apply(Event::VoteFinished {
            report_id: "7".into(),
            kind: VoteKind::Resolved,
            result: Ok(VoteReceipt {
                message: Some("Report resolved and removed".into()),
                report_deleted: true,
            }),
        });

        assert!(app.nearby.is_empty());
        assert!(app.selected_report().is_none());
    }

    #[test]
    fn pin_drop_commits_inside_area_and_reverts_outside() {
        let store = MemoryStore::default();
        let mut app = app_with(store.clone());
        app.apply(Event::InitialLocation(InitialLocation::Cached(manila())));
        app.view_mode = ViewMode::Location;

        app.handle_key(key(KeyCode::Up));
        let commands = app.handle_key(key(KeyCode::Enter));
        let ticket = match commands.as_slice() {
            [Command::ResolvePin { ticket, coords }] => {
                assert!((coords.latitude - 14.6005).abs() < 1e-9);
                *ticket
            }
            other => panic!("unexpected commands {other:?}"),
        };
        let quezon = Location::new("Quezon City, Metro Manila, Philippines", 14.6005, 120.9842);
        app.apply(Event::PinResolved {
            ticket,
            candidate: quezon.clone(),
        });
        assert_eq!(app.current_location(), Some(&quezon));
        assert_eq!(store.snapshot(), Some(quezon.clone()));

        app.pin = Some(Coordinates::new(10.3157, 123.8854));
        let ticket = match app.drop_pin().as_slice() {
            [Command::ResolvePin { ticket, .. }] => *ticket,
            other => panic!("unexpected commands {other:?}"),
        };
        app.apply(Event::PinResolved {
            ticket,
            candidate: Location::new("Cebu City, Philippines", 10.3157, 123.8854),
        });

        assert_eq!(app.current_location(), Some(&quezon));
        assert_eq!(app.pin, Some(quezon.coordinates()));
        assert_eq!(store.snapshot(), Some(quezon));
        assert_eq!(app.notice.as_ref().map(|n| n.tone), Some(Tone::Error));
    }

    #[test]
    fn place_search_issues_a_ticketed_command() {
        let mut app = located_app();
        app.view_mode = ViewMode::Location;

        app.handle_key(key(KeyCode::Char('/')));
        for c in "Pasig".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let commands = app.handle_key(key(KeyCode::Enter));

        assert!(matches!(
            commands.as_slice(),
            [Command::SearchPlace { query, .. }] if query == "Pasig"
        ));
        assert!(app.place_query.is_none());
    }

    #[test]
    fn refused_geolocation_is_terminal() {
        let mut app = app_with(MemoryStore::default());
        let commands = app.apply(Event::InitialLocation(InitialLocation::Unavailable(
            GeolocationError::Denied,
        )));
        assert!(commands.is_empty());
        assert!(matches!(app.location_status, LocationStatus::Unavailable(_)));
    }

    #[test]
    fn geolocated_outside_area_yields_no_location() {
        let store = MemoryStore::default();
        let mut app = app_with(store.clone());
        app.apply(Event::InitialLocation(InitialLocation::Located(Location::new(
            "Cebu City, Philippines",
            10.3157,
            123.8854,
        ))));
        assert!(app.current_location().is_none());
        assert!(matches!(app.location_status, LocationStatus::OutsideArea(_)));
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn submit_validates_and_blocks_duplicates() {
        let mut app = located_app();
        app.view_mode = ViewMode::Submit;

        assert!(app.handle_key(key(KeyCode::Enter)).is_empty());
        assert_eq!(app.notice.as_ref().map(|n| n.text.as_str()), Some("Please select an issue type"));

        app.handle_key(key(KeyCode::Right)); // Custom
        app.handle_key(key(KeyCode::Right)); // Pothole
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Tab));
        for c in "Deep hole".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }

        let commands = app.handle_key(key(KeyCode::Enter));
        match commands.as_slice() {
            [Command::Submit(report)] => {
                assert_eq!(report.issue_type, IssueType::Pothole);
                assert_eq!(report.description, "Deep hole");
                assert_eq!(report.location, manila());
            }
            other => panic!("unexpected commands {other:?}"),
        }
        assert!(app.handle_key(key(KeyCode::Enter)).is_empty());

        let after = app.apply(Event::SubmitFinished(Ok("Report submitted successfully".into())));
        assert_eq!(after, vec![Command::RefreshReports]);
        assert!(!app.submitting);
        assert_eq!(app.draft, ReportDraft::default());
    }

    #[test]
    fn dashboard_delete_needs_confirmation() {
        let mut app = located_app();
        let commands = app.handle_key(key(KeyCode::Char('4')));
        assert_eq!(commands, vec![Command::LoadDashboard(None)]);
        app.apply(Event::DashboardLoaded {
            filter: None,
            result: Ok(vec![report(3, 14.6, 120.98)]),
        });

        assert!(app.handle_key(key(KeyCode::Char('d'))).is_empty());
        assert_eq!(
            app.handle_key(key(KeyCode::Char('y'))),
            vec![Command::Delete("3".into())]
        );

        app.apply(Event::Deleted {
            report_id: "3".into(),
            result: Ok(()),
        });
        assert!(app.dashboard.is_empty());
    }

    #[test]
    fn dashboard_status_update_applies_after_confirmation() {
        let mut app = located_app();
        app.handle_key(key(KeyCode::Char('4')));
        app.apply(Event::DashboardLoaded {
            filter: None,
            result: Ok(vec![report(3, 14.6, 120.98)]),
        });

        let commands = app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(
            commands,
            vec![Command::UpdateStatus {
                report_id: "3".into(),
                status: ReportStatus::InProgress
            }]
        );
        assert!(app.handle_key(key(KeyCode::Char('a'))).is_empty());
        assert_eq!(app.dashboard[0].status, ReportStatus::Pending);

        app.apply(Event::StatusUpdated {
            report_id: "3".into(),
            status: ReportStatus::InProgress,
            result: Ok(()),
        });
        assert_eq!(app.dashboard[0].status, ReportStatus::InProgress);
    }

    #[test]
    fn late_startup_location_keeps_the_users_choice() {
        let store = MemoryStore::default();
        let mut app = app_with(store.clone());
        app.view_mode = ViewMode::Location;

        app.handle_key(key(KeyCode::Char('/')));
        for c in "Pasig".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        let ticket = match app.handle_key(key(KeyCode::Enter)).as_slice() {
            [Command::SearchPlace { ticket, .. }] => *ticket,
            other => panic!("unexpected commands {other:?}"),
        };
        let pasig = Location::new("Pasig, Metro Manila, Philippines", 14.5764, 121.0851);
        app.apply(Event::PinResolved {
            ticket,
            candidate: pasig.clone(),
        });

        let commands = app.apply(Event::InitialLocation(InitialLocation::Located(manila())));

        assert!(commands.is_empty());
        assert_eq!(app.current_location(), Some(&pasig));
        assert_eq!(store.snapshot(), Some(pasig));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn older_pin_answer_arriving_last_is_dropped() {
        let mut app = located_app();
        app.view_mode = ViewMode::Location;

        let first = ticket_of(&app.drop_pin());
        app.handle_key(key(KeyCode::Right));
        let second = ticket_of(&app.drop_pin());

        let quezon = Location::new("Quezon City, Metro Manila, Philippines", 14.5995, 120.9852);
        app.apply(Event::PinResolved {
            ticket: second,
            candidate: quezon.clone(),
        });
        let commands = app.apply(Event::PinResolved {
            ticket: first,
            candidate: Location::new("Makati, Metro Manila, Philippines", 14.5995, 120.9842),
        });

        assert!(commands.is_empty());
        assert_eq!(app.current_location(), Some(&quezon));
        assert_eq!(app.pin, Some(quezon.coordinates()));
    }

    #[test]
    fn overtaken_report_fetch_is_ignored() {
        let mut app = located_app();

        app.apply(Event::ReportsLoaded {
            seq: 2,
            result: Ok(vec![report(1, 14.6000, 120.9850)]),
        });
        let commands = app.apply(Event::ReportsLoaded {
            seq: 1,
            result: Ok(Vec::new()),
        });

        assert!(commands.is_empty());
        assert_eq!(app.all_reports.len(), 1);
        assert_eq!(app.nearby.len(), 1);
    }
}
