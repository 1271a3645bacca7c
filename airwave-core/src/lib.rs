#![allow(clippy::new_without_default)]

pub mod actor;
pub mod audio;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod player;
pub mod playlist;
pub mod station;
pub mod station_list;
pub mod util;

mod xml;
