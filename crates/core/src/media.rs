//! Photo upload rules: format sniffing, dimension limits, job constants.

use crate::error::CoreError;
use crate::types::DbId;

pub const PHOTO_STATUS_PENDING: &str = "pending";
pub const PHOTO_STATUS_READY: &str = "ready";
pub const PHOTO_STATUS_REJECTED: &str = "rejected";

pub const JOB_STATUS_QUEUED: &str = "queued";
pub const JOB_STATUS_RUNNING: &str = "running";
pub const JOB_STATUS_SUCCEEDED: &str = "succeeded";
pub const JOB_STATUS_FAILED: &str = "failed";

/// The only job type the worker knows how to run.
pub const JOB_TYPE_PHOTO_METADATA: &str = "photo_metadata";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_PHOTOS_PER_USER: i64 = 6;
pub const DEFAULT_JOB_MAX_ATTEMPTS: i32 = 3;

pub const MIN_PHOTO_SIDE_PX: u32 = 200;
pub const MAX_PHOTO_SIDE_PX: u32 = 8000;

/// Retry backoff ceiling in seconds.
pub const MAX_JOB_BACKOFF_SECS: i64 = 300;

/// Image formats accepted for profile photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoFormat {
    Jpeg,
    Png,
    Webp,
}

impl PhotoFormat {
    /// Identify the format from the leading bytes of the file.
    ///
    /// The client-declared content type is never trusted.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }
}

/// Storage key for a new upload: `<user_id>/<file_stem>.<ext>`.
pub fn storage_key(user_id: DbId, file_stem: &str, format: PhotoFormat) -> String {
    format!("{user_id}/{file_stem}.{}", format.extension())
}

/// A relative key made of plain path segments, safe to join onto a storage root.
pub fn is_safe_storage_key(key: &str) -> bool {
    !key.is_empty()
        && !key.contains('\\')
        && key
            .split('/')
            .all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}

/// Check decoded image dimensions against the accepted range.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), CoreError> {
    let range = MIN_PHOTO_SIDE_PX..=MAX_PHOTO_SIDE_PX;
    if !range.contains(&width) || !range.contains(&height) {
        return Err(CoreError::Validation(format!(
            "Photo must be between {MIN_PHOTO_SIDE_PX} and {MAX_PHOTO_SIDE_PX} px \
             on each side, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Seconds to wait before the next attempt: `2^attempt`, capped.
pub fn job_retry_delay_secs(attempt: i32) -> i64 {
    let exp = attempt.clamp(0, 30) as u32;
    2i64.pow(exp).min(MAX_JOB_BACKOFF_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_formats() {
        assert_eq!(PhotoFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(PhotoFormat::Jpeg));
        assert_eq!(
            PhotoFormat::sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
            Some(PhotoFormat::Png)
        );
        assert_eq!(PhotoFormat::sniff(b"RIFF\x24\0\0\0WEBPVP8 "), Some(PhotoFormat::Webp));
    }

    #[test]
    fn rejects_unknown_or_truncated_input() {
        assert_eq!(PhotoFormat::sniff(b"GIF89a"), None);
        assert_eq!(PhotoFormat::sniff(b"RIFF"), None);
        assert_eq!(PhotoFormat::sniff(&[]), None);
    }

    #[test]
    fn storage_keys_are_relative_and_plain() {
        let key = storage_key(7, "abc", PhotoFormat::Png);
        assert_eq!(key, "7/abc.png");
        assert!(is_safe_storage_key(&key));
        assert!(!is_safe_storage_key("/etc/passwd"));
        assert!(!is_safe_storage_key("7/../../secret"));
        assert!(!is_safe_storage_key("7//a.png"));
        assert!(!is_safe_storage_key(""));
    }

    #[test]
    fn dimension_bounds_are_inclusive() {
        assert!(validate_dimensions(200, 200).is_ok());
        assert!(validate_dimensions(8000, 8000).is_ok());
        assert!(validate_dimensions(199, 400).is_err());
        assert!(validate_dimensions(400, 8001).is_err());
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(job_retry_delay_secs(1), 2);
        assert_eq!(job_retry_delay_secs(3), 8);
        assert_eq!(job_retry_delay_secs(12), MAX_JOB_BACKOFF_SECS);
        assert_eq!(job_retry_delay_secs(-1), 1);
    }
}
