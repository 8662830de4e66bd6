use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum S3MirrorError {
    #[error("key '{key}' is not under the source prefix '{prefix}'")]
    KeyOutsidePrefix { key: String, prefix: String },
}
