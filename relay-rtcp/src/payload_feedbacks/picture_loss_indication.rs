//! Picture Loss Indication (RFC 4585 §6.3.1): PSFB, FMT=1. Carries no
//! feedback control information beyond the two SSRCs; the PLI worker (spec
//! §4.8) emits one of these per coalesced keyframe request.

use bytes::Buf;
use relay_shared::error::Result;
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

use crate::header::{self, FMT_PICTURE_LOSS_INDICATION, PT_PAYLOAD_SPECIFIC_FEEDBACK};

const SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PictureLossIndication {
    pub sender_ssrc: u32,
    pub media_ssrc: u32,
}

impl MarshalSize for PictureLossIndication {
    fn marshal_size(&self) -> usize {
        SIZE
    }
}

impl Marshal for PictureLossIndication {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        header::encode_header(buf, FMT_PICTURE_LOSS_INDICATION, PT_PAYLOAD_SPECIFIC_FEEDBACK, (SIZE / 4) as u16 - 1);
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        buf[8..12].copy_from_slice(&self.media_ssrc.to_be_bytes());
        Ok(SIZE)
    }
}

impl Unmarshal for PictureLossIndication {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), SIZE, "rtcp pli")?;
        let mut head = [0u8; 4];
        buf.copy_to_slice(&mut head);
        header::decode_header(&head, PT_PAYLOAD_SPECIFIC_FEEDBACK)?;
        Ok(PictureLossIndication {
            sender_ssrc: buf.get_u32(),
            media_ssrc: buf.get_u32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let pli = PictureLossIndication {
            sender_ssrc: 0x902f9e2e,
            media_ssrc: 0xbc5e9a40,
        };
        let raw = pli.marshal().unwrap();
        let mut buf = raw.clone();
        assert_eq!(PictureLossIndication::unmarshal(&mut buf).unwrap(), pli);
    }
}
