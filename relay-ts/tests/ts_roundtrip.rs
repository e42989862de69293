//! Round-trip scenario from the "MPEG-TS: for any audio or video message
//! accepted by `encode`, running the produced bytes through `decode` yields
//! a TsMessage whose dts, pts, stream_id, and payload equal the originals"
//! testable property.

use relay_ts::{AudioCodec, TsContext, TsMessage, VideoCodec};

#[test]
fn aac_stream_round_trips_with_pat_at_0x1001_and_audio_at_0x101() {
    let mut encoder = TsContext::new();
    let adts_frame: Vec<u8> = {
        let mut buf = relay_ts::aac::encode_adts_header(1, 44100, 2, 2).unwrap().to_vec();
        buf.extend_from_slice(&[0xFF, 0xF9]);
        buf
    };

    let msg = TsMessage {
        stream_id: relay_ts::PES_STREAM_ID_AUDIO,
        dts: 90000,
        pts: 90000,
        payload: adts_frame.clone(),
        is_video: false,
        is_keyframe: false,
    };

    let bytes = encoder.encode(VideoCodec::Disabled, AudioCodec::Aac, &msg).unwrap();
    assert_eq!(bytes.len() % relay_ts::TS_PACKET_SIZE, 0);

    let mut packets = bytes.chunks(relay_ts::TS_PACKET_SIZE);
    let pat_packet = packets.next().unwrap();
    assert_eq!(pat_packet[0], relay_ts::TS_SYNC_BYTE);
    let pat_pid = (((pat_packet[1] & 0x1F) as u16) << 8) | pat_packet[2] as u16;
    assert_eq!(pat_pid, relay_ts::TS_PID_PAT);

    let pmt_packet = packets.next().unwrap();
    let pmt_pid = (((pmt_packet[1] & 0x1F) as u16) << 8) | pmt_packet[2] as u16;
    assert_eq!(pmt_pid, relay_ts::TS_PID_PMT);

    let pes_packet = packets.next().unwrap();
    let pes_pid = (((pes_packet[1] & 0x1F) as u16) << 8) | pes_packet[2] as u16;
    assert_eq!(pes_pid, relay_ts::TS_PID_AUDIO_AAC);
    assert!(packets.next().is_none());

    let mut decoder = TsContext::new();
    let mut decoded = None;
    for packet in bytes.chunks(relay_ts::TS_PACKET_SIZE) {
        if let Some(m) = decoder.decode(packet).unwrap() {
            decoded = Some(m);
        }
    }
    let decoded = decoded.expect("a complete audio PES should have been reassembled");
    assert_eq!(decoded.stream_id, relay_ts::PES_STREAM_ID_AUDIO);
    assert_eq!(decoded.dts, 90000);
    assert_eq!(decoded.pts, 90000);
    assert_eq!(decoded.payload, adts_frame);
    assert!(!decoded.is_video);
}

#[test]
fn codec_change_retriggers_pat_and_pmt() {
    let mut encoder = TsContext::new();
    let audio_msg = TsMessage {
        stream_id: relay_ts::PES_STREAM_ID_AUDIO,
        dts: 0,
        pts: 0,
        payload: vec![0xFF, 0xF1, 0x50, 0x80, 0x00, 0x1F, 0xFC],
        is_video: false,
        is_keyframe: false,
    };
    let first = encoder.encode(VideoCodec::Disabled, AudioCodec::Aac, &audio_msg).unwrap();
    let second = encoder.encode(VideoCodec::Disabled, AudioCodec::Aac, &audio_msg).unwrap();
    // Same codec pair: only the PES packet(s), no repeated PAT/PMT.
    assert!(second.len() < first.len());

    let video_msg = TsMessage {
        stream_id: relay_ts::PES_STREAM_ID_VIDEO,
        dts: 0,
        pts: 0,
        payload: vec![0u8; 8],
        is_video: true,
        is_keyframe: true,
    };
    let third = encoder.encode(VideoCodec::H264, AudioCodec::Aac, &video_msg).unwrap();
    // Codec set changed (video added): PAT+PMT re-emitted, so this is at
    // least two packets bigger than a bare PES would be.
    assert!(third.len() >= 3 * relay_ts::TS_PACKET_SIZE);
}
