//! AAC ADTS framing: a 7-byte header prepended to each raw AAC frame so the
//! TS demuxer does not need the RTMP/FLV `AudioSpecificConfig` out of band
//! (spec §4.11 AAC handling).

use relay_shared::error::{Error, Result};

/// ISO/IEC 13818-7 Table 1.18 `samplingFrequencyIndex`, in the order ADTS
/// expects; `0x0F` (index 15) means "explicit frequency", unsupported here.
const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

pub fn sample_rate_index(rate: u32) -> Result<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&r| r == rate)
        .map(|i| i as u8)
        .ok_or_else(|| Error::HlsAacFrameLength(format!("unsupported aac sample rate {rate}")))
}

pub fn sample_rate_for_index(index: u8) -> Result<u32> {
    SAMPLE_RATES
        .get(index as usize)
        .copied()
        .ok_or_else(|| Error::HlsAacFrameLength(format!("bad aac sampling frequency index {index}")))
}

/// Encode a 7-byte ADTS header (no CRC) for a frame of `aac_payload_len`
/// bytes of raw AAC.
///
/// `profile` is the MPEG-4 Audio Object Type minus one (AAC LC = 2, so the
/// ADTS field written is `1`), per ISO/IEC 13818-7 §6.2.1.
pub fn encode_adts_header(profile: u8, sample_rate: u32, channels: u8, aac_payload_len: usize) -> Result<[u8; 7]> {
    let freq_idx = sample_rate_index(sample_rate)?;
    let frame_len = aac_payload_len + 7;
    if frame_len > 0x1FFF {
        return Err(Error::HlsAacFrameLength(format!("frame too large: {frame_len}")));
    }
    let mut out = [0u8; 7];
    out[0] = 0xFF;
    out[1] = 0xF1; // MPEG-4, no CRC
    out[2] = ((profile & 0x03) << 6) | ((freq_idx & 0x0F) << 2) | ((channels >> 2) & 0x01);
    out[3] = ((channels & 0x03) << 6) | ((frame_len >> 11) as u8 & 0x03);
    out[4] = ((frame_len >> 3) & 0xFF) as u8;
    out[5] = (((frame_len & 0x07) as u8) << 5) | 0x1F; // buffer fullness all-ones
    out[6] = 0xFC; // buffer fullness low bits + 1 frame per ADTS unit
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
pub struct AdtsHeader {
    pub profile: u8,
    pub sample_rate: u32,
    pub channels: u8,
    pub frame_len: usize,
}

pub fn decode_adts_header(buf: &[u8]) -> Result<AdtsHeader> {
    if buf.len() < 7 {
        return Err(Error::HlsAacFrameLength("adts header truncated".into()));
    }
    if buf[0] != 0xFF || buf[1] & 0xF0 != 0xF0 {
        return Err(Error::HlsAacFrameLength("adts sync word invalid".into()));
    }
    let profile = (buf[2] >> 6) & 0x03;
    let freq_idx = (buf[2] >> 2) & 0x0F;
    let sample_rate = sample_rate_for_index(freq_idx)?;
    let channels = ((buf[2] & 0x01) << 2) | ((buf[3] >> 6) & 0x03);
    let frame_len = (((buf[3] & 0x03) as usize) << 11) | ((buf[4] as usize) << 3) | ((buf[5] as usize) >> 5);
    Ok(AdtsHeader {
        profile,
        sample_rate,
        channels,
        frame_len,
    })
}
