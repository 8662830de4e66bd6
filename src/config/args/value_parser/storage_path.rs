use percent_encoding::percent_decode_str;
use url::{ParseError, Url};

use crate::types::StoragePath;

const INVALID_SCHEME: &str = "scheme must be s3:// .";
const INVALID_PATH: &str = "path must be a valid s3:// URI.";
const UNDECODABLE_PATH: &str = "path must percent-decode to valid UTF-8.";
const NO_BUCKET_NAME_SPECIFIED: &str = "bucket name must be specified.";
const NO_PATH_SPECIFIED: &str = "path must be specified.";

pub fn check_storage_path(path: &str) -> Result<String, String> {
    if path.is_empty() {
        return Err(NO_PATH_SPECIFIED.to_string());
    }

    let parsed = match Url::parse(path) {
        Ok(parsed) => parsed,
        Err(ParseError::RelativeUrlWithoutBase) => return Err(INVALID_SCHEME.to_string()),
        Err(_) => return Err(INVALID_PATH.to_string()),
    };

    if parsed.scheme() != "s3" {
        return Err(INVALID_SCHEME.to_string());
    }

    if parsed.host_str().is_none() {
        return Err(NO_BUCKET_NAME_SPECIFIED.to_string());
    }

    if percent_decode_str(parsed.path()).decode_utf8().is_err() {
        return Err(UNDECODABLE_PATH.to_string());
    }

    Ok(path.to_string())
}

/// Splits a checked `s3://bucket/prefix` URI into bucket and key prefix.
/// Only call with a path that passed `check_storage_path`.
pub fn parse_storage_path(path: &str) -> StoragePath {
    let parsed = Url::parse(path).unwrap();
    let bucket = parsed.host_str().unwrap().to_string();
    let mut prefix = parsed.path().to_string();

    // remove first '/'
    if !prefix.is_empty() {
        prefix.remove(0);
    }

    let prefix = percent_decode_str(&prefix)
        .decode_utf8()
        .unwrap()
        .to_string();

    StoragePath { bucket, prefix }
}
