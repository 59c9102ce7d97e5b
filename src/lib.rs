pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod daily;
pub mod db;
pub mod embedding;
pub mod global;
pub mod index;
pub mod media;
pub mod normalizer;
pub mod source;
pub mod store;
pub mod transcription;
pub mod uploads;
