pub mod auth;
pub mod config;
pub mod durations;
pub mod player;
pub mod playlist;
pub mod timer;
