//! AVC/HEVC Annex B emission (spec §4.11 "AVC/HEVC annexb emission"):
//! start-code framing, cached parameter-set prepending on keyframes, and
//! AUD insertion.

const START_CODE_LONG: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const START_CODE_SHORT: [u8; 3] = [0x00, 0x00, 0x01];

const H264_NAL_AUD: u8 = 9;
const H264_NAL_SPS: u8 = 7;
const H264_NAL_PPS: u8 = 8;
const H264_AUD_BODY: [u8; 2] = [0x09, 0xF0];

const H265_NAL_AUD: u8 = 35;
const H265_NAL_VPS: u8 = 32;
const H265_NAL_SPS: u8 = 33;
const H265_NAL_PPS: u8 = 34;
/// `forbidden_zero_bit(0) nal_unit_type(6) layer_id(6) tid(3)` for an AUD,
/// followed by the one-byte `pic_type` payload.
const H265_AUD_BODY: [u8; 3] = [(H265_NAL_AUD << 1), 0x01, 0x50];

fn h264_nal_type(byte: u8) -> u8 {
    byte & 0x1F
}

fn h265_nal_type(byte: u8) -> u8 {
    (byte >> 1) & 0x3F
}

fn append_nalu(out: &mut Vec<u8>, nalu: &[u8], first: bool) {
    if first {
        out.extend_from_slice(&START_CODE_LONG);
    } else {
        out.extend_from_slice(&START_CODE_SHORT);
    }
    out.extend_from_slice(nalu);
}

/// Build the annexb byte stream for one H.264 access unit.
///
/// `is_idr` marks the frame as containing an IDR slice; when true and no
/// SPS/PPS NALU is present among `nalus`, the cached `sps`/`pps` (from the
/// decoder configuration record) are prepended. An AUD is always prepended
/// unless the caller already included one.
pub fn encode_annexb_h264(nalus: &[Vec<u8>], is_idr: bool, sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let has_aud = nalus.iter().any(|n| !n.is_empty() && h264_nal_type(n[0]) == H264_NAL_AUD);
    let has_param_sets = nalus
        .iter()
        .any(|n| !n.is_empty() && matches!(h264_nal_type(n[0]), t if t == H264_NAL_SPS || t == H264_NAL_PPS));

    let mut out = Vec::new();
    let mut first = true;
    if !has_aud {
        append_nalu(&mut out, &H264_AUD_BODY, first);
        first = false;
    }
    if is_idr && !has_param_sets {
        if !sps.is_empty() {
            append_nalu(&mut out, sps, first);
            first = false;
        }
        if !pps.is_empty() {
            append_nalu(&mut out, pps, first);
            first = false;
        }
    }
    for nalu in nalus {
        append_nalu(&mut out, nalu, first);
        first = false;
    }
    out
}

/// HEVC counterpart of [`encode_annexb_h264`]: `is_irap` marks an
/// intra-random-access-point frame, which gets cached VPS+SPS+PPS prepended
/// when none is already present.
pub fn encode_annexb_h265(nalus: &[Vec<u8>], is_irap: bool, vps: &[u8], sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let has_aud = nalus.iter().any(|n| !n.is_empty() && h265_nal_type(n[0]) == H265_NAL_AUD);
    let has_param_sets = nalus.iter().any(|n| {
        !n.is_empty()
            && matches!(h265_nal_type(n[0]), t if t == H265_NAL_VPS || t == H265_NAL_SPS || t == H265_NAL_PPS)
    });

    let mut out = Vec::new();
    let mut first = true;
    if !has_aud {
        append_nalu(&mut out, &H265_AUD_BODY, first);
        first = false;
    }
    if is_irap && !has_param_sets {
        for ps in [vps, sps, pps] {
            if !ps.is_empty() {
                append_nalu(&mut out, ps, first);
                first = false;
            }
        }
    }
    for nalu in nalus {
        append_nalu(&mut out, nalu, first);
        first = false;
    }
    out
}

/// Split an annexb byte stream back into individual NALUs (without start
/// codes), accepting either 3- or 4-byte start codes between units.
pub fn split_annexb(data: &[u8]) -> Vec<&[u8]> {
    let mut starts = Vec::new();
    let mut i = 0;
    while i + 2 < data.len() {
        if data[i] == 0 && data[i + 1] == 0 {
            if data[i + 2] == 1 {
                starts.push(i + 3);
            } else if i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                starts.push(i + 4);
            }
        }
        i += 1;
    }
    let mut out = Vec::with_capacity(starts.len());
    for (idx, &start) in starts.iter().enumerate() {
        let end = starts
            .get(idx + 1)
            .map(|&next| {
                let mut e = next;
                while e > start && data[e - 1] == 0 {
                    e -= 1;
                }
                while e > start && e >= 3 && &data[e - 3..e] == &[0, 0, 1] {
                    e -= 3;
                }
                e
            })
            .unwrap_or(data.len());
        out.push(&data[start..end.min(data.len())]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_aud_and_params_on_idr() {
        let idr = vec![0x65, 1, 2, 3];
        let sps = vec![0x67, 9, 9];
        let pps = vec![0x68, 8, 8];
        let out = encode_annexb_h264(&[idr.clone()], true, &sps, &pps);

        assert_eq!(&out[0..4], &START_CODE_LONG);
        assert_eq!(out[4], H264_AUD_BODY[0]);

        let units = split_annexb(&out);
        assert_eq!(units.len(), 4);
        assert_eq!(units[0], &H264_AUD_BODY[..]);
        assert_eq!(units[1], &sps[..]);
        assert_eq!(units[2], &pps[..]);
        assert_eq!(units[3], &idr[..]);
    }

    #[test]
    fn skips_param_sets_when_already_present() {
        let sps = vec![0x67, 1];
        let idr = vec![0x65, 2];
        let out = encode_annexb_h264(&[sps.clone(), idr.clone()], true, &[9, 9], &[8, 8]);
        let units = split_annexb(&out);
        assert_eq!(units.len(), 3);
        assert_eq!(units[1], &sps[..]);
        assert_eq!(units[2], &idr[..]);
    }

    #[test]
    fn non_idr_frame_has_no_param_sets() {
        let p_slice = vec![0x41, 1, 2];
        let out = encode_annexb_h264(&[p_slice.clone()], false, &[9, 9], &[8, 8]);
        let units = split_annexb(&out);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1], &p_slice[..]);
    }
}
