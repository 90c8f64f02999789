//! Deployment version tags
//!
//! Tags are opaque and compared literally. A fresh tag per build is
//! enough to make activation purge every earlier bucket.

use chrono::{DateTime, Utc};

/// Tag for a build happening now: `v<epoch-millis>`
pub fn generate() -> String {
    generate_at(Utc::now())
}

/// Tag for a build at a given time
pub fn generate_at(at: DateTime<Utc>) -> String {
    format!("v{}", at.timestamp_millis())
}

/// Bucket name for a tag: `<prefix>-<tag>`
pub fn bucket_name(prefix: &str, tag: &str) -> String {
    format!("{}-{}", prefix, tag)
}
