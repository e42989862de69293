//! Single 188-byte TS packet framing: the 4-byte header and the optional
//! adaptation field (spec §4.11).

use crate::{TS_PACKET_SIZE, TS_SYNC_BYTE};
use relay_shared::error::{Error, Result};

/// `adaptation_field_control` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationFieldControl {
    PayloadOnly,
    AdaptationOnly,
    AdaptationAndPayload,
}

impl AdaptationFieldControl {
    fn bits(self) -> u8 {
        match self {
            AdaptationFieldControl::AdaptationOnly => 0b10,
            AdaptationFieldControl::PayloadOnly => 0b01,
            AdaptationFieldControl::AdaptationAndPayload => 0b11,
        }
    }

    fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0b01 => Ok(AdaptationFieldControl::PayloadOnly),
            0b10 => Ok(AdaptationFieldControl::AdaptationOnly),
            0b11 => Ok(AdaptationFieldControl::AdaptationAndPayload),
            _ => Err(Error::Other(format!("ts: reserved adaptation_field_control {bits:#04b}"))),
        }
    }
}

pub struct TsHeader {
    pub payload_unit_start_indicator: bool,
    pub pid: u16,
    pub adaptation_field_control: AdaptationFieldControl,
    pub continuity_counter: u8,
}

pub fn encode_header(header: &TsHeader) -> [u8; 4] {
    let mut out = [0u8; 4];
    out[0] = TS_SYNC_BYTE;
    let pusi_bit: u16 = if header.payload_unit_start_indicator { 1 } else { 0 };
    let pid_word = (pusi_bit << 13) | (header.pid & 0x1FFF);
    out[1] = (pid_word >> 8) as u8;
    out[2] = (pid_word & 0xFF) as u8;
    out[3] = (header.adaptation_field_control.bits() << 4) | (header.continuity_counter & 0x0F);
    out
}

pub fn decode_header(buf: &[u8]) -> Result<TsHeader> {
    if buf.len() < 4 {
        return Err(Error::TsSyncByte);
    }
    if buf[0] != TS_SYNC_BYTE {
        return Err(Error::TsSyncByte);
    }
    let pid_word = ((buf[1] as u16) << 8) | (buf[2] as u16);
    let payload_unit_start_indicator = (pid_word & 0x4000) != 0;
    let pid = pid_word & 0x1FFF;
    let adaptation_field_control = AdaptationFieldControl::from_bits((buf[3] >> 4) & 0x03)?;
    let continuity_counter = buf[3] & 0x0F;
    Ok(TsHeader {
        payload_unit_start_indicator,
        pid,
        adaptation_field_control,
        continuity_counter,
    })
}

#[derive(Debug, Clone, Default)]
pub struct AdaptationField {
    pub discontinuity_indicator: bool,
    pub random_access_indicator: bool,
    /// Program Clock Reference base, in 90kHz units (the 42-bit PCR's
    /// extension field is always written as zero; see spec §4.11).
    pub pcr: Option<i64>,
    pub stuffing_len: usize,
}

impl AdaptationField {
    pub fn encoded_len(&self) -> usize {
        1 + 1 + if self.pcr.is_some() { 6 } else { 0 } + self.stuffing_len
    }

    pub fn encode(&self) -> Vec<u8> {
        let body_len = self.encoded_len() - 1;
        let mut out = Vec::with_capacity(self.encoded_len());
        out.push(body_len as u8);
        let mut flags = 0u8;
        if self.discontinuity_indicator {
            flags |= 0x80;
        }
        if self.random_access_indicator {
            flags |= 0x40;
        }
        if self.pcr.is_some() {
            flags |= 0x10;
        }
        out.push(flags);
        if let Some(pcr) = self.pcr {
            let base = (pcr as u64) & 0x1_FFFF_FFFF;
            let ext: u64 = 0;
            out.push((base >> 25) as u8);
            out.push((base >> 17) as u8);
            out.push((base >> 9) as u8);
            out.push((base >> 1) as u8);
            out.push((((base & 1) << 7) as u8) | 0x7E | ((ext >> 8) & 0x01) as u8);
            out.push((ext & 0xFF) as u8);
        }
        out.resize(out.len() + self.stuffing_len, 0xFF);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.is_empty() {
            return Err(Error::TsAdaptationFieldLength("empty".into()));
        }
        let length = buf[0] as usize;
        if length == 0 {
            return Ok((AdaptationField::default(), 1));
        }
        if buf.len() < 1 + length {
            return Err(Error::TsAdaptationFieldLength(format!(
                "need {} bytes, have {}",
                1 + length,
                buf.len()
            )));
        }
        let flags = buf[1];
        let discontinuity_indicator = flags & 0x80 != 0;
        let random_access_indicator = flags & 0x40 != 0;
        let pcr_flag = flags & 0x10 != 0;

        let mut pos = 2;
        let mut pcr = None;
        if pcr_flag {
            if pos + 6 > 1 + length {
                return Err(Error::TsAdaptationFieldLength("pcr truncated".into()));
            }
            let b = &buf[pos..pos + 6];
            let base = ((b[0] as u64) << 25)
                | ((b[1] as u64) << 17)
                | ((b[2] as u64) << 9)
                | ((b[3] as u64) << 1)
                | ((b[4] as u64) >> 7);
            pcr = Some(base as i64);
            pos += 6;
        }
        let stuffing_len = (1 + length).saturating_sub(pos);
        Ok((
            AdaptationField {
                discontinuity_indicator,
                random_access_indicator,
                pcr,
                stuffing_len,
            },
            1 + length,
        ))
    }
}

/// Build one 188-byte TS packet from a header, optional adaptation field,
/// and a payload slice, padding the adaptation field's stuffing so the
/// total is exactly [`TS_PACKET_SIZE`].
pub fn build_packet(header: &TsHeader, adaptation: Option<&AdaptationField>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(TS_PACKET_SIZE);
    out.extend_from_slice(&encode_header(header));
    if let Some(af) = adaptation {
        out.extend_from_slice(&af.encode());
    }
    out.extend_from_slice(payload);
    debug_assert!(out.len() <= TS_PACKET_SIZE);
    out.resize(TS_PACKET_SIZE, 0xFF);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = TsHeader {
            payload_unit_start_indicator: true,
            pid: 0x101,
            adaptation_field_control: AdaptationFieldControl::PayloadOnly,
            continuity_counter: 7,
        };
        let bytes = encode_header(&header);
        let decoded = decode_header(&bytes).unwrap();
        assert!(decoded.payload_unit_start_indicator);
        assert_eq!(decoded.pid, 0x101);
        assert_eq!(decoded.continuity_counter, 7);
    }

    #[test]
    fn rejects_bad_sync_byte() {
        let bytes = [0x48, 0, 0, 0];
        assert!(decode_header(&bytes).is_err());
    }

    #[test]
    fn adaptation_field_with_pcr_round_trips() {
        let af = AdaptationField {
            discontinuity_indicator: false,
            random_access_indicator: true,
            pcr: Some(90000),
            stuffing_len: 3,
        };
        let encoded = af.encode();
        let (decoded, consumed) = AdaptationField::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert!(decoded.random_access_indicator);
        assert_eq!(decoded.pcr, Some(90000));
    }

    #[test]
    fn built_packet_is_always_188_bytes() {
        let header = TsHeader {
            payload_unit_start_indicator: true,
            pid: 0x100,
            adaptation_field_control: AdaptationFieldControl::PayloadOnly,
            continuity_counter: 0,
        };
        let packet = build_packet(&header, None, &[1, 2, 3]);
        assert_eq!(packet.len(), TS_PACKET_SIZE);
        assert_eq!(packet[0], TS_SYNC_BYTE);
    }
}
