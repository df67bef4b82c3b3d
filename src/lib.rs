#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else, clippy::missing_errors_doc)]

#[macro_use]
extern crate tracing;

pub mod auth;
pub mod config;
pub mod controller;
pub mod data;
pub mod error;
pub mod maud_conveniences;
pub mod routes;
pub mod screen;
pub mod session;
pub mod state;
pub mod store;
