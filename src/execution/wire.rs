/// One-shot request/response frames, newline-delimited JSON
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;
use crate::verification::ProofToken;

pub const MAX_FRAME: usize = 16 * 1024;

/// Opaque command identifier of a destruct request
pub const DESTRUCT_COMMAND: &str = "destruct";

/// Reason sent for every refused request, whichever check failed
pub const REJECTED: &str = "rejected";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructRequest {
    pub command: String,
    pub method: String,
    pub target: String,
    pub proof: ProofToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ack,
    Nack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestructResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DestructResponse {
    pub fn ack(summary: impl Into<String>) -> Self {
        Self {
            status: Status::Ack,
            reason: Some(summary.into()),
        }
    }

    pub fn rejected() -> Self {
        Self {
            status: Status::Nack,
            reason: Some(REJECTED.to_string()),
        }
    }
}

/// Read one frame of at most `MAX_FRAME` bytes
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, WireError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = reader.take(MAX_FRAME as u64 + 1).read_line(&mut line).await?;

    if read == 0 {
        return Err(WireError::Closed);
    }
    if read > MAX_FRAME {
        return Err(WireError::TooLarge(MAX_FRAME));
    }
    if !line.ends_with('\n') {
        return Err(WireError::Closed);
    }

    Ok(serde_json::from_str(line.trim_end())?)
}

/// Write one frame and flush it
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(frame)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
