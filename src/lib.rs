//! Folio - a portfolio site: blog, tools showcase, contact form and chat
//!
//! This library provides everything the `folio` server and the
//! `folio-admin` management command share.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod db;
pub mod effects;
pub mod models;
pub mod services;
pub mod theme;
