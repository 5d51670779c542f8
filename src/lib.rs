//! Well Monitor - data layer for the water-well dashboard
//!
//! Fetches flow, pressure and level samples and log rows from the dashboard
//! backend, converts raw counts to physical units and feeds them to widgets.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod normalize;
pub mod presenter;
