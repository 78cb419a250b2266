//! Smart Device Management API client
//!
//! Thin typed wrapper over the SDM REST API. Every call goes through one
//! request helper that attaches the bearer token and classifies failures:
//! HTTP 429 is reported as [`Error::RateLimited`] so the UI can degrade
//! rather than fail.

pub mod client;
pub mod error;
pub mod model;

pub use client::{DeviceControl, SdmClient, DEFAULT_API_BASE_URL};
pub use error::{Error, Result};
pub use model::{Device, Devices, ParentRelation, is_valid_device_id};
