pub mod adb;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod observers;
pub mod scheme;
