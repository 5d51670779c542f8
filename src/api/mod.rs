pub mod client;
pub mod error_page;
pub mod models;

pub use client::DashboardClient;
pub use models::{Endpoint, LogsPayload, SyncStatus, TimeRange};
