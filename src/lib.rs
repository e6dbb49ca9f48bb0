pub mod activity;
pub mod aggregate;
pub mod app;
pub mod backup;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod duration;
pub mod exchange;
pub mod format;
pub mod models;
pub mod table;
pub mod valuation;
