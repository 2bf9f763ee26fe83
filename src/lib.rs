pub mod albums;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod media;
pub mod overlay;
pub mod platform;
pub mod playlist;
pub mod processing;
pub mod render;
pub mod transition;
pub mod video;
pub mod viewer;
pub mod watch;

pub use config::Configuration;
pub use error::{Error, Result};
pub use render::gpu::App;
