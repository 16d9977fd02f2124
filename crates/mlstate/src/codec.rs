//! # State Container Codec
//!
//! Reads and writes the header that frames a persisted ML state.
//!
//! ## Layout
//!
//! ```text
//! byte 0         format version, currently always 1
//! bytes 1..5     metadata length L, u32 little-endian
//! bytes 5..5+L   metadata, a MessagePack map
//! bytes 5+L..    model payload, opaque to this crate
//! ```
//!
//! The metadata is encoded with field names so that it stays readable by
//! tools that know nothing about this crate. The payload that follows is
//! written and read by the model itself; the codec only positions the stream
//! at its first byte.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use crate::config::{MlParams, ModelIdentity};
use crate::error::{MlStateError, Result};

/// The only container version this crate reads and writes.
pub const FORMAT_VERSION: u8 = 1;

/// Upper bound on the up-front allocation made for the metadata block.
const METADATA_PREALLOC_LIMIT: usize = 64 * 1024;

/// The self-describing record stored between the header and the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub module_path: String,
    pub module_name: String,
    pub class_name: String,
    pub batch_train_size: u64,
}

impl StateMetadata {
    pub fn new(identity: &ModelIdentity, params: &MlParams) -> Self {
        Self {
            module_path: identity.module_path.clone(),
            module_name: identity.module_name.clone(),
            class_name: identity.class_name.clone(),
            batch_train_size: params.batch_train_size() as u64,
        }
    }

    pub fn identity(&self) -> ModelIdentity {
        ModelIdentity::new(&self.module_path, &self.module_name, &self.class_name)
    }

    /// Converts the stored batch size back into validated parameters.
    ///
    /// # Errors
    ///
    /// [`MlStateError::CorruptContainer`] when the stored batch size is zero
    /// or does not fit the platform's `usize`.
    pub fn params(&self) -> Result<MlParams> {
        usize::try_from(self.batch_train_size)
            .ok()
            .and_then(|size| MlParams::new(size).ok())
            .ok_or_else(|| {
                MlStateError::CorruptContainer(format!(
                    "invalid batch_train_size {} in state metadata",
                    self.batch_train_size
                ))
            })
    }
}

/// Writes the format version, the metadata length, and the metadata.
///
/// Nothing is flushed; the caller keeps writing the payload to the same sink.
pub async fn write_header<W>(writer: &mut W, metadata: &StateMetadata) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let encoded = rmp_serde::to_vec_named(metadata)?;
    let length = u32::try_from(encoded.len()).map_err(|_| {
        MlStateError::CorruptContainer(format!(
            "state metadata of {} bytes does not fit the container",
            encoded.len()
        ))
    })?;

    writer.write_u8(FORMAT_VERSION).await?;
    writer.write_u32_le(length).await?;
    writer.write_all(&encoded).await?;
    Ok(())
}

/// Reads and validates the header, leaving `reader` at the first payload byte.
///
/// # Errors
///
/// * [`MlStateError::UnsupportedFormatVersion`] for any version other than
///   [`FORMAT_VERSION`]
/// * [`MlStateError::CorruptContainer`] when the stream ends inside the
///   header, when the metadata length is zero, when fewer metadata bytes are
///   available than declared, or when the metadata cannot be decoded
/// * [`MlStateError::Io`] for any other read failure
pub async fn read_header<R>(reader: &mut R) -> Result<StateMetadata>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let version = reader
        .read_u8()
        .await
        .map_err(|err| truncated(err, "format version"))?;
    if version != FORMAT_VERSION {
        return Err(MlStateError::UnsupportedFormatVersion(version));
    }

    let length = reader
        .read_u32_le()
        .await
        .map_err(|err| truncated(err, "metadata length"))?;
    if length == 0 {
        return Err(MlStateError::CorruptContainer(
            "size of state metadata must be greater than 0".to_string(),
        ));
    }

    let expected = length as usize;
    let mut encoded = Vec::with_capacity(expected.min(METADATA_PREALLOC_LIMIT));
    let read = (&mut *reader)
        .take(u64::from(length))
        .read_to_end(&mut encoded)
        .await?;
    if read != expected {
        return Err(MlStateError::CorruptContainer(format!(
            "state metadata is {expected} bytes but only {read} could be read"
        )));
    }

    rmp_serde::from_slice(&encoded).map_err(|err| {
        MlStateError::CorruptContainer(format!("cannot decode state metadata: {err}"))
    })
}

fn truncated(err: std::io::Error, what: &str) -> MlStateError {
    if err.kind() == ErrorKind::UnexpectedEof {
        MlStateError::CorruptContainer(format!("container ends before its {what}"))
    } else {
        MlStateError::Io(err)
    }
}
