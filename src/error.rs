//! Error types for decoding, shape transforms and load tasks.
//!
//! None of these reach the caller of [`Engine::display`](crate::Engine::display):
//! every failure ends as "nothing is displayed". They exist so that task
//! outcomes can be counted, logged and asserted on.

use crate::decode::DecoderKind;

/// Failure of a decode collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Source does not exist (or has no associated artwork).
    #[error("source not found: {0}")]
    NotFound(String),
    /// I/O error while reading the source.
    #[error("I/O error: {0}")]
    Io(String),
    /// Data could not be decoded.
    #[error("malformed image data: {0}")]
    Malformed(String),
    /// Format is recognised but not supported.
    #[error("unsupported format: {0}")]
    Unsupported(String),
    /// Decoder ran into a resource limit.
    #[error("out of memory while decoding {0}")]
    OutOfMemory(String),
    /// No decoder is registered for the request kind.
    #[error("no decoder registered for {0:?}")]
    UnsupportedKind(DecoderKind),
}

impl DecodeError {
    /// Map an `image` crate error for `uri` onto the decode taxonomy.
    pub fn from_image_error(uri: &str, err: image::ImageError) -> Self {
        use image::ImageError;
        match err {
            ImageError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                DecodeError::NotFound(uri.to_string())
            }
            ImageError::IoError(e) => DecodeError::Io(format!("{uri}: {e}")),
            ImageError::Unsupported(e) => DecodeError::Unsupported(format!("{uri}: {e}")),
            ImageError::Limits(_) => DecodeError::OutOfMemory(uri.to_string()),
            other => DecodeError::Malformed(format!("{uri}: {other}")),
        }
    }
}

/// Failure of a shape transform. Never fatal to a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("cannot shape an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },
}

/// Why a load task stopped without delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The target reports it has been torn down.
    Reclaimed,
    /// The target now wants a different cache key (or nothing).
    Reassigned,
    /// The engine was stopped while the task was pending or running.
    Interrupted,
}

/// Terminal non-delivered outcome of a load task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task cancelled: {0:?}")]
    Cancelled(CancelReason),
    #[error("decode failed: {0}")]
    Failed(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = image::open("/definitely/not/here.png").unwrap_err();
        assert_eq!(
            DecodeError::from_image_error("/definitely/not/here.png", err),
            DecodeError::NotFound("/definitely/not/here.png".to_string())
        );
    }

    #[test]
    fn decode_errors_convert_into_failed_tasks() {
        let err: TaskError = DecodeError::Malformed("x".into()).into();
        assert_eq!(err, TaskError::Failed(DecodeError::Malformed("x".into())));
        assert_eq!(err.to_string(), "decode failed: malformed image data: x");
    }
}
