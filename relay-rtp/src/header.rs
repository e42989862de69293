//! The fixed 12-byte RTP header plus CSRC list and extension (RFC 3550 §5.1).

use bytes::{Buf, BufMut};
use relay_shared::error::{Error, Result};
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

pub const VERSION: u8 = 2;
const FIXED_HEADER_SIZE: usize = 12;
const CSRC_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    /// One-byte (RFC 5285) extension payload, if the extension bit is set.
    /// The profile-specific 16-bit id is stored alongside the raw words.
    pub extension_profile: Option<u16>,
    pub extension_payload: Vec<u8>,
}

impl RtpHeader {
    pub fn new(payload_type: u8, sequence_number: u16, timestamp: u32, ssrc: u32, marker: bool) -> Self {
        RtpHeader {
            version: VERSION,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            marker,
            ..Default::default()
        }
    }
}

impl MarshalSize for RtpHeader {
    fn marshal_size(&self) -> usize {
        let mut size = FIXED_HEADER_SIZE + self.csrc.len() * CSRC_SIZE;
        if self.extension_profile.is_some() {
            // extension header (4 bytes) + payload, padded to a 4-byte word.
            size += 4 + self.extension_payload.len().div_ceil(4) * 4;
        }
        size
    }
}

impl Marshal for RtpHeader {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if buf.len() < size {
            return Err(Error::RtpMuxer("header buffer too small".into()));
        }
        if self.csrc.len() > 0x0F {
            return Err(Error::RtpMuxer("csrc list too long".into()));
        }

        let has_extension = self.extension_profile.is_some();
        buf[0] = (self.version << 6) | ((self.padding as u8) << 5) | ((has_extension as u8) << 4) | (self.csrc.len() as u8 & 0x0F);
        buf[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        buf[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        let mut pos = FIXED_HEADER_SIZE;
        for csrc in &self.csrc {
            buf[pos..pos + 4].copy_from_slice(&csrc.to_be_bytes());
            pos += 4;
        }
        if let Some(profile) = self.extension_profile {
            let words = self.extension_payload.len().div_ceil(4);
            buf[pos..pos + 2].copy_from_slice(&profile.to_be_bytes());
            buf[pos + 2..pos + 4].copy_from_slice(&(words as u16).to_be_bytes());
            pos += 4;
            buf[pos..pos + self.extension_payload.len()].copy_from_slice(&self.extension_payload);
            for b in &mut buf[pos + self.extension_payload.len()..pos + words * 4] {
                *b = 0;
            }
            pos += words * 4;
        }
        Ok(pos)
    }
}

impl Unmarshal for RtpHeader {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), FIXED_HEADER_SIZE, "rtp header")?;
        let b0 = buf.get_u8();
        let version = b0 >> 6;
        let padding = b0 & 0x20 != 0;
        let has_extension = b0 & 0x10 != 0;
        let csrc_count = (b0 & 0x0F) as usize;

        let b1 = buf.get_u8();
        let marker = b1 & 0x80 != 0;
        let payload_type = b1 & 0x7F;

        let sequence_number = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        marshal::require(buf.remaining(), csrc_count * CSRC_SIZE, "rtp csrc list")?;
        let mut csrc = Vec::with_capacity(csrc_count);
        for _ in 0..csrc_count {
            csrc.push(buf.get_u32());
        }

        let mut extension_profile = None;
        let mut extension_payload = Vec::new();
        if has_extension {
            marshal::require(buf.remaining(), 4, "rtp extension header")?;
            let profile = buf.get_u16();
            let words = buf.get_u16() as usize;
            marshal::require(buf.remaining(), words * 4, "rtp extension payload")?;
            let mut payload = vec![0u8; words * 4];
            buf.copy_to_slice(&mut payload);
            extension_profile = Some(profile);
            extension_payload = payload;
        }

        Ok(RtpHeader {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension_profile,
            extension_payload,
        })
    }
}
