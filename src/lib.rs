pub mod api;
pub mod auth;
pub mod banner;
pub mod config;
pub mod consts;
pub mod error;
pub mod stores;
pub mod updater;
