//! Autodesk Forge integration.
//!
//! Token exchange, object upload, translation job tracking, and element
//! extraction. Every remote call goes through [`ForgeClient`].

pub mod auth;
pub mod client;
pub mod extraction;
pub mod translation;
pub mod upload;

pub use auth::{AccessToken, ForgeCredentials, TokenProvider};
pub use client::ForgeClient;
pub use extraction::ElementBatch;
pub use translation::{JobTracker, PollPolicy, RemoteManifest, RemoteStatus, TranslationService};
pub use upload::{UploadPolicy, decode_urn, encode_urn, object_key, upload_instant};
