pub extern crate actix_web;

pub mod admin;
pub mod config;
pub mod connection;
pub mod handlers;
pub mod host;
