//! Telegram storefront bot: catalog search and a phone-number order flow.
pub mod catalog;
pub mod config;
pub mod format;
pub mod handlers;
pub mod messenger;
pub mod model;
pub mod orders;
