//! Client for a remote object-detection service.
//!
//! Submits images, videos and camera frames to the backend's `/detect` endpoint and renders the
//! returned bounding boxes and labels.
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod intake;
pub mod live;
pub mod meter;
pub mod page;
pub mod render;
pub mod sensors;
pub mod sink;
pub mod video;

pub use error::Error;
