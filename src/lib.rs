#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod day;
pub mod error;
pub mod export_options;
pub mod geojson_export;
pub mod geometry;
mod logs;
pub mod map_provider;
pub mod renderer;
pub mod utils;
