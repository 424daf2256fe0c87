//! CBOR-based ControlCodec implementation plus the length-prefixed framing
//! shared by the server and the client.

use quinn::{RecvStream, SendStream};

use crate::application::ports::ControlCodec;
use crate::domain::control::{MarketRequest, MarketResponse};

/// Upper bound on one frame; a full account listing stays far below this.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Encodes / decodes control messages using CBOR (via `serde_cbor`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CborControlCodec;

impl ControlCodec for CborControlCodec {
    fn encode_request(&self, msg: &MarketRequest) -> anyhow::Result<Vec<u8>> {
        serde_cbor::to_vec(msg).map_err(Into::into)
    }

    fn decode_request(&self, data: &[u8]) -> anyhow::Result<MarketRequest> {
        serde_cbor::from_slice(data).map_err(Into::into)
    }

    fn encode_response(&self, msg: &MarketResponse) -> anyhow::Result<Vec<u8>> {
        serde_cbor::to_vec(msg).map_err(Into::into)
    }

    fn decode_response(&self, data: &[u8]) -> anyhow::Result<MarketResponse> {
        serde_cbor::from_slice(data).map_err(Into::into)
    }
}

/// Read one `u32` big-endian length-prefixed frame.
pub async fn read_frame(recv: &mut RecvStream) -> anyhow::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    recv.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {len} bytes exceeds limit");
    }

    let mut payload = vec![0u8; len];
    recv.read_exact(&mut payload).await?;
    Ok(payload)
}

pub async fn write_frame(send: &mut SendStream, payload: &[u8]) -> anyhow::Result<()> {
    let len = u32::try_from(payload.len())?.to_be_bytes();
    send.write_all(&len).await?;
    send.write_all(payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountId;
    use crate::domain::error::MarketError;

    #[test]
    fn request_survives_cbor() {
        let codec = CborControlCodec;
        let msg = MarketRequest::CallableProvider {
            provider: AccountId(9),
        };
        let bytes = codec.encode_request(&msg).unwrap();
        let decoded = codec.decode_request(&bytes).unwrap();
        assert!(matches!(
            decoded,
            MarketRequest::CallableProvider {
                provider: AccountId(9)
            }
        ));
    }

    #[test]
    fn typed_error_crosses_the_wire() {
        let codec = CborControlCodec;
        let msg = MarketResponse::Error(MarketError::InsufficientFunds {
            required: 500,
            available: 50,
        });
        let decoded = codec
            .decode_response(&codec.encode_response(&msg).unwrap())
            .unwrap();
        match decoded {
            MarketResponse::Error(err) => assert_eq!(
                err,
                MarketError::InsufficientFunds {
                    required: 500,
                    available: 50
                }
            ),
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(CborControlCodec.decode_response(&[0xff, 0x00]).is_err());
    }
}
