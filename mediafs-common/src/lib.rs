pub mod api;
pub mod attributes;
pub mod convert;
pub mod error;
pub mod resource;
