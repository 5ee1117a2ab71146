//! Filesystem adapter backed by the Cloudinary media API.
//!
//! [`CloudinaryAdapter`] translates filesystem-style operations (write,
//! read, copy, move, delete, list, metadata) into calls against the remote
//! API and normalizes the responses. The remote is reached through the
//! [`mediafs_common::api::MediaApi`] trait; [`CloudinaryClient`] is the
//! reqwest-backed implementation.

pub mod adapter;
pub mod client;
pub mod config;

pub use adapter::{CloudinaryAdapter, ContentsLister};
pub use client::CloudinaryClient;
pub use config::{CloudinaryConfig, ConverterKind, WriteConfig};
