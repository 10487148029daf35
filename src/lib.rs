pub mod app;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod helioviewer;
pub mod logging;
pub mod menu;
pub mod monitor;
pub mod output;
pub mod resolver;
pub mod store;
