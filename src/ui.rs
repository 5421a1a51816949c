//! TUI rendering for the Ulat PH client
//!
//! This module handles all UI rendering logic using the `ratatui` crate:
//! the nearby-reports view, the location map, the report form and the
//! dashboard. Rendering only reads [`App`]; all state changes happen in
//! `app.rs`.

use crate::app::{App, FormField, LocationStatus, Tone, ViewMode};
use crate::models::{Report, ReportStatus};
use crate::proximity::distance_to;
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{canvas::*, *},
};

/// Renders one frame based on current application state.
///
/// Every view shares the same frame: a header with the current location, the
/// view body, and a footer carrying the transient notice and key help.
///
/// # Arguments
///
/// * `f` - The ratatui frame to draw into (from `terminal.draw()`).
/// * `app` - Current application state.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.size());

    render_header(f, app, chunks[0]);

    match app.view_mode {
        ViewMode::Reports => render_reports_view(f, app, chunks[1]),
        ViewMode::Location => render_location_view(f, app, chunks[1]),
        ViewMode::Submit => render_submit_view(f, app, chunks[1]),
        ViewMode::Dashboard => render_dashboard_view(f, app, chunks[1]),
    }

    render_notice(f, app, chunks[2]);
    render_help(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let place = match (&app.location_status, app.current_location()) {
        (_, Some(loc)) => Span::styled(loc.display_name.clone(), Style::default().fg(Color::Cyan)),
        (LocationStatus::Locating, None) => {
            Span::styled("Fetching your location...", Style::default().fg(Color::DarkGray))
        }
        (LocationStatus::Unavailable(why), None) => {
            Span::styled(format!("Location unavailable ({})", why), Style::default().fg(Color::Red))
        }
        (LocationStatus::OutsideArea(name), None) => Span::styled(
            format!("Outside service area: {}", name),
            Style::default().fg(Color::Red),
        ),
        (LocationStatus::Ready, None) => Span::raw("No location"),
    };

    let tabs = [
        (ViewMode::Reports, "1 Reports"),
        (ViewMode::Location, "2 Location"),
        (ViewMode::Submit, "3 Make Report"),
        (ViewMode::Dashboard, "4 Dashboard"),
    ];
    let mut spans = vec![Span::styled(
        " Ulat PH ",
        Style::default()
            .fg(Color::Black)
            .bg(Color::Rgb(0, 150, 136))
            .add_modifier(Modifier::BOLD),
    )];
    for (mode, label) in tabs {
        let style = if mode == app.view_mode {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(label, style));
    }
    spans.push(Span::raw("  │  "));
    spans.push(place);

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(header, area);
}

/// Reports view: nearby list sidebar (35%) + detail panel (65%).
fn render_reports_view(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let items: Vec<ListItem> = app
        .nearby
        .iter()
        .enumerate()
        .map(|(i, report)| {
            let style = if Some(i) == app.selected {
                Style::default()
                    .fg(Color::Cyan)
                    .bg(Color::Rgb(30, 30, 60))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let distance = app
                .current_location()
                .and_then(|c| distance_to(c, report))
                .map(|d| format!("{:.0} m", d * 1000.0))
                .unwrap_or_default();

            ListItem::new(Line::from(vec![
                Span::styled(format!(" {:<22}", truncate(report.title(), 22)), style),
                Span::styled(
                    format!(" │ {:>6} │ 👁 {} ✔ {}", distance, report.sightings.count, report.resolved_votes.count),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let title = format!(
        " Reports within {} km ({}) ",
        app.config.location.nearby_radius_km,
        app.nearby.len()
    );
    if items.is_empty() {
        let empty = Paragraph::new(if app.current_location().is_some() {
            "No reports near your location."
        } else {
            "Set a location to see nearby reports."
        })
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().title(title).borders(Borders::ALL).border_type(BorderType::Rounded));
        f.render_widget(empty, chunks[0]);
    } else {
        let list = List::new(items).block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(list, chunks[0]);
    }

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(chunks[1]);

    render_sync_panel(f, app, main_chunks[0]);

    let Some(report) = app.selected_report() else {
        f.render_widget(
            Block::default()
                .title(" Report Details ")
                .borders(Borders::ALL),
            main_chunks[1],
        );
        return;
    };

    let votes = app.votes.state(&report.id);
    let vote_line = |label: &str, count: u32, voted: bool| {
        let marker = if votes.loading {
            Span::styled(" (sending...)", Style::default().fg(Color::Yellow))
        } else if voted {
            Span::styled(" (you voted)", Style::default().fg(Color::Green))
        } else {
            Span::raw("")
        };
        Line::from(vec![
            Span::styled(format!("{:<14}", label), Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(count.to_string()),
            marker,
        ])
    };

    let mut details = vec![
        Line::from(vec![
            Span::styled("Issue:         ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(report.title(), Style::default().fg(Color::Yellow)),
            Span::raw("  |  "),
            Span::styled(report.status.to_string(), Style::default().fg(status_color(report.status))),
        ]),
        Line::from(vec![
            Span::styled("Reported at:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(
                report
                    .created_at
                    .map(|t| t.format("%b %d, %Y %H:%M").to_string())
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
        ]),
        Line::from(vec![
            Span::styled("Coordinates:   ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(
                report
                    .coordinates()
                    .map(|c| format!("{:.4}, {:.4}", c.latitude, c.longitude))
                    .unwrap_or_else(|| "---".to_string()),
            ),
        ]),
        Line::from(vec![
            Span::styled("Photo:         ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(
                report
                    .image_filename
                    .as_deref()
                    .map(|file| app.image_url(file))
                    .unwrap_or_else(|| "No photo".to_string()),
            ),
        ]),
        Line::from(""),
        vote_line("Sightings:", report.sightings.count, votes.sighting_voted),
        vote_line("Resolved:", report.resolved_votes.count, votes.resolved_voted),
        Line::from(""),
    ];
    details.push(Line::from(Span::styled(
        report.description.as_str(),
        Style::default().fg(Color::White),
    )));

    let p = Paragraph::new(details)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(" Report Details ")
                .borders(Borders::ALL)
                .padding(Padding::new(2, 2, 1, 1)),
        );
    f.render_widget(p, main_chunks[1]);
}

fn render_sync_panel(f: &mut Frame, app: &App, area: Rect) {
    let seconds_ago = app.last_update.map(|inst| inst.elapsed().as_secs());
    let (network, network_color) = match (app.last_update, app.last_update_success) {
        (None, _) => ("WAITING", Color::DarkGray),
        (Some(_), true) => ("ONLINE", Color::Green),
        (Some(_), false) => ("OFFLINE", Color::Red),
    };
    let freshness_color = match seconds_ago {
        Some(s) if s < app.config.api.poll_interval_seconds + 10 => Color::Green,
        Some(_) => Color::Red,
        None => Color::DarkGray,
    };

    let content = vec![
        Line::from(vec![
            Span::styled("  BACKEND: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(network, Style::default().fg(network_color)),
            Span::raw("  │  "),
            Span::styled("UPDATED: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                seconds_ago.map(|s| format!("{}s ago", s)).unwrap_or_else(|| "---".into()),
                Style::default().fg(freshness_color),
            ),
        ]),
        Line::from(vec![
            Span::styled("  NEARBY: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("{}/{}", app.nearby.len(), app.all_reports.len()),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  │  "),
            Span::styled("AREA: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                app.resolver.service_area().keywords().join(", "),
                Style::default().fg(Color::Magenta),
            ),
        ]),
    ];

    let block = Paragraph::new(content).block(
        Block::default()
            .title(" Sync ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(block, area);
}

/// Location view: canvas map around the pin + place info.
fn render_location_view(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(area);

    let mut info = vec![];
    match app.current_location() {
        Some(loc) => {
            info.push(Line::from(Span::styled(
                "Current location",
                Style::default().add_modifier(Modifier::BOLD),
            )));
            info.push(Line::from(loc.display_name.as_str()));
            info.push(Line::from(Span::styled(
                format!("{:.5}, {:.5}", loc.latitude, loc.longitude),
                Style::default().fg(Color::DarkGray),
            )));
        }
        None => info.push(Line::from(Span::styled(
            "No location set",
            Style::default().fg(Color::Red),
        ))),
    }
    info.push(Line::from(""));
    if let Some(pin) = app.pin {
        info.push(Line::from(Span::styled(
            "Pin",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        info.push(Line::from(format!("{:.5}, {:.5}", pin.latitude, pin.longitude)));
    }
    if let Some(query) = &app.place_query {
        info.push(Line::from(""));
        info.push(Line::from(vec![
            Span::styled("Search: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("{}▏", query), Style::default().fg(Color::Yellow)),
        ]));
    }

    f.render_widget(
        Paragraph::new(info).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(" Location ")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .padding(Padding::new(1, 1, 1, 0)),
        ),
        chunks[0],
    );

    let Some(center) = app.pin.or_else(|| app.current_location().map(|l| l.coordinates())) else {
        let msg = Paragraph::new("Press / to search for a place.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title(" Map "));
        f.render_widget(msg, chunks[1]);
        return;
    };

    // Roughly twice the nearby radius on each side.
    let radius = (app.config.location.nearby_radius_km / 111.0 * 2.0).max(0.005);
    let (c_lat, c_lon) = (center.latitude, center.longitude);

    let map = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(" Map "))
        .marker(symbols::Marker::Braille)
        .x_bounds([c_lon - radius, c_lon + radius])
        .y_bounds([c_lat - radius, c_lat + radius])
        .paint(|ctx| {
            ctx.draw(&Map {
                color: Color::Rgb(50, 50, 50),
                resolution: MapResolution::High,
            });

            // Nearby radius around the committed location
            if let Some(loc) = app.current_location() {
                ctx.draw(&Circle {
                    x: loc.longitude,
                    y: loc.latitude,
                    radius: app.config.location.nearby_radius_km / 111.0,
                    color: Color::Rgb(0, 96, 87),
                });
            }

            for report in &app.all_reports {
                if let Some(c) = report.coordinates() {
                    let style = Style::default().fg(status_color(report.status));
                    ctx.print(c.longitude, c.latitude, Line::from(Span::styled("•", style)));
                }
            }

            ctx.print(
                c_lon,
                c_lat,
                Line::from(Span::styled(
                    " ⌖ ",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )),
            );
        });

    f.render_widget(map, chunks[1]);
}

/// Report form: issue type, custom text, description, image path.
fn render_submit_view(f: &mut Frame, app: &App, area: Rect) {
    let field_style = |field: FormField| {
        if field == app.form_field {
            Style::default()
                .fg(Color::Cyan)
                .bg(Color::Rgb(30, 30, 60))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    };
    let cursor = |field: FormField| if field == app.form_field { "▏" } else { "" };

    let issue = app
        .draft
        .issue_type
        .as_ref()
        .map(|i| i.label().to_string())
        .unwrap_or_else(|| "Select type of issue".to_string());

    let rows = vec![
        Line::from(vec![
            Span::styled("  Type of issue    ", field_style(FormField::IssueType)),
            Span::styled(format!("◀ {} ▶", issue), field_style(FormField::IssueType)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Custom issue     ", field_style(FormField::CustomIssue)),
            Span::raw(format!("{}{}", app.draft.custom_issue, cursor(FormField::CustomIssue))),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Description      ", field_style(FormField::Description)),
            Span::raw(format!("{}{}", app.draft.description, cursor(FormField::Description))),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Photo (path)     ", field_style(FormField::ImagePath)),
            Span::raw(format!("{}{}", app.draft.image_path, cursor(FormField::ImagePath))),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Location         ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                app.current_location()
                    .map(|l| l.display_name.clone())
                    .unwrap_or_else(|| "No location set".to_string()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            if app.submitting { "  Submitting..." } else { "  Press Enter to make report" },
            Style::default().fg(if app.submitting { Color::Yellow } else { Color::Green }),
        )),
    ];

    let form = Paragraph::new(rows).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(" Make Report ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .padding(Padding::new(1, 1, 1, 1)),
    );
    f.render_widget(form, area);
}

/// Dashboard: every report, with status filter and moderation actions.
fn render_dashboard_view(f: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(vec!["Issue", "Status", "Location", "Reported", "👁", "✔"])
        .style(Style::default().add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    let rows: Vec<Row> = app
        .dashboard
        .iter()
        .enumerate()
        .map(|(i, report)| dashboard_row(app, i, report))
        .collect();

    let filter = app
        .dashboard_filter
        .map(|s| s.to_string())
        .unwrap_or_else(|| "All Reports".to_string());

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(25),
            Constraint::Length(12),
            Constraint::Percentage(35),
            Constraint::Length(18),
            Constraint::Length(4),
            Constraint::Length(4),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(format!(" Reports Dashboard | {} ({}) ", filter, app.dashboard.len()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded),
    );
    f.render_widget(table, area);
}

fn dashboard_row<'a>(app: &App, index: usize, report: &'a Report) -> Row<'a> {
    let mut style = Style::default();
    if index == app.dashboard_index {
        style = style.fg(Color::Cyan).bg(Color::Rgb(30, 30, 60));
    }
    if app.dashboard_pending.contains(&report.id) {
        style = style.add_modifier(Modifier::DIM);
    }
    Row::new(vec![
        Cell::from(report.title()),
        Cell::from(report.status.to_string()).style(Style::default().fg(status_color(report.status))),
        Cell::from(report.location.as_str()),
        Cell::from(
            report
                .created_at
                .map(|t| t.format("%b %d %H:%M").to_string())
                .unwrap_or_default(),
        ),
        Cell::from(report.sightings.count.to_string()),
        Cell::from(report.resolved_votes.count.to_string()),
    ])
    .style(style)
}

fn render_notice(f: &mut Frame, app: &App, area: Rect) {
    let Some(notice) = &app.notice else {
        return;
    };
    let style = match notice.tone {
        Tone::Success => Style::default().fg(Color::White).bg(Color::Green),
        Tone::Error => Style::default().fg(Color::White).bg(Color::Red),
        Tone::Info => Style::default().fg(Color::Black).bg(Color::Yellow),
    };
    f.render_widget(
        Paragraph::new(format!(" {} ", notice.text))
            .style(style)
            .alignment(Alignment::Center),
        area,
    );
}

fn render_help(f: &mut Frame, app: &App, area: Rect) {
    let help = if app.place_query.is_some() {
        " type a place name   Enter search   Esc cancel"
    } else {
        match app.view_mode {
            ViewMode::Reports => " ↑/↓ select   s I see this too   f resolved   r refresh   1-4 views   q quit",
            ViewMode::Location => " ←↑↓→ move pin   Enter drop pin   / search place   c recenter   1-4 views   q quit",
            ViewMode::Submit => " Tab/↑↓ field   ←/→ issue type   Enter submit   Esc back",
            ViewMode::Dashboard => " ↑/↓ select   f filter   a advance status   d delete   r refresh   1-4 views   q quit",
        }
    };
    f.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        area,
    );
}

/// Colour used for a status everywhere it is shown.
fn status_color(status: ReportStatus) -> Color {
    match status {
        ReportStatus::Pending => Color::Yellow,
        ReportStatus::InProgress => Color::Blue,
        ReportStatus::Resolved => Color::Green,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
