//! Ulat PH: a terminal client for reporting and following local civic issues.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod events;
pub mod geocoding;
pub mod location;
pub mod logging;
pub mod models;
pub mod proximity;
pub mod ui;
pub mod votes;
