//! Extended Report (RFC 3611), restricted to the Receiver Reference Time
//! Report block (§4.4) that `PublishStream`'s RTCP timer pairs with each RR
//! (spec §4.9).

use bytes::Buf;
use relay_shared::error::{Error, Result};
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

use crate::header::{self, PT_EXTENDED_REPORT};

const RRTR_BLOCK_TYPE: u8 = 4;
const RRTR_BLOCK_SIZE: usize = 8;

/// Receiver Reference Time Report block: an NTP timestamp, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rrtr {
    pub ntp_timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtendedReport {
    pub sender_ssrc: u32,
    pub rrtr: Option<Rrtr>,
}

impl MarshalSize for ExtendedReport {
    fn marshal_size(&self) -> usize {
        4 + 4 + if self.rrtr.is_some() { 4 + RRTR_BLOCK_SIZE } else { 0 }
    }
}

impl Marshal for ExtendedReport {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        header::encode_header(buf, 0, PT_EXTENDED_REPORT, (size / 4) as u16 - 1);
        buf[4..8].copy_from_slice(&self.sender_ssrc.to_be_bytes());
        if let Some(rrtr) = &self.rrtr {
            buf[8] = RRTR_BLOCK_TYPE;
            buf[9] = 0;
            buf[10..12].copy_from_slice(&((RRTR_BLOCK_SIZE / 4) as u16).to_be_bytes());
            buf[12..20].copy_from_slice(&rrtr.ntp_timestamp.to_be_bytes());
        }
        Ok(size)
    }
}

impl Unmarshal for ExtendedReport {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), 8, "rtcp xr")?;
        let mut head = [0u8; 4];
        buf.copy_to_slice(&mut head);
        let decoded = header::decode_header(&head, PT_EXTENDED_REPORT)?;
        let sender_ssrc = buf.get_u32();

        let total = header::declared_total_len(decoded.length_words);
        let block_bytes = total.saturating_sub(8);
        marshal::require(buf.remaining(), block_bytes, "rtcp xr blocks")?;
        let mut blocks = vec![0u8; block_bytes];
        buf.copy_to_slice(&mut blocks);

        let mut rrtr = None;
        let mut pos = 0;
        while pos + 4 <= blocks.len() {
            let block_type = blocks[pos];
            let block_length_words = u16::from_be_bytes([blocks[pos + 2], blocks[pos + 3]]) as usize;
            let block_len = block_length_words * 4;
            if pos + 4 + block_len > blocks.len() {
                return Err(Error::Other("rtcp xr: block length exceeds buffer".into()));
            }
            if block_type == RRTR_BLOCK_TYPE && block_len >= RRTR_BLOCK_SIZE {
                let body = &blocks[pos + 4..pos + 4 + RRTR_BLOCK_SIZE];
                rrtr = Some(Rrtr {
                    ntp_timestamp: u64::from_be_bytes(body.try_into().unwrap()),
                });
            }
            pos += 4 + block_len;
        }

        Ok(ExtendedReport { sender_ssrc, rrtr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_rrtr() {
        let xr = ExtendedReport {
            sender_ssrc: 0x902f9e2e,
            rrtr: Some(Rrtr { ntp_timestamp: 0xda8bd1fcdddda05a }),
        };
        let raw = xr.marshal().unwrap();
        let mut buf = raw.clone();
        assert_eq!(ExtendedReport::unmarshal(&mut buf).unwrap(), xr);
    }

    #[test]
    fn round_trips_with_no_blocks() {
        let xr = ExtendedReport { sender_ssrc: 7, rrtr: None };
        let raw = xr.marshal().unwrap();
        let mut buf = raw.clone();
        assert_eq!(ExtendedReport::unmarshal(&mut buf).unwrap(), xr);
    }
}
