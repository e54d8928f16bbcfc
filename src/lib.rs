//! Storage adapter for the image gallery web application
//!
//! Uploads user images to an upload bucket and lists watermarked images from
//! a publicly readable download bucket, wrapping an S3-compatible object
//! store. Watermarking itself happens out-of-band; this crate only writes
//! the watermark pipeline's input bucket and reads its output bucket.

pub mod error;
pub mod models;
pub mod storage;

pub use error::{Error, Result};
