use bytes::Bytes;
use relay_media::StreamSource;
use std::time::{Duration, Instant};

fn keyframe(ts: i64) -> relay_media::MediaPacket {
    relay_media::MediaPacket::video(ts, Bytes::from_static(&[0x17, 0x01, 0, 0, 0]))
}

fn inter(ts: i64) -> relay_media::MediaPacket {
    relay_media::MediaPacket::video(ts, Bytes::from_static(&[0x27, 0x01, 0, 0, 0]))
}

fn audio_frame(ts: i64) -> relay_media::MediaPacket {
    relay_media::MediaPacket::audio(ts, Bytes::from_static(&[0xAF, 0x01, 0xAA]))
}

#[test]
fn consumer_dumps_replays_cached_metadata_and_gop() {
    let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
    source.on_publish().unwrap();

    source.on_video(keyframe(0), None).unwrap();
    source.on_audio(audio_frame(20)).unwrap();
    source.on_video(inter(40), None).unwrap();

    let consumer = source.create_consumer();
    assert_eq!(source.consumer_queue_mut(consumer).unwrap().len(), 0);

    source.consumer_dumps(consumer, true, true, true);
    let queue = source.consumer_queue_mut(consumer).unwrap();
    assert_eq!(queue.len(), 3);
}

#[test]
fn stream_becomes_dead_three_seconds_after_last_consumer_drops() {
    let mut source = StreamSource::initialize("rtmp://host/live/stream", true, 1000);
    source.on_publish().unwrap();
    let consumer = source.create_consumer();
    source.on_unpublish(Instant::now());

    let t0 = Instant::now();
    source.remove_consumer(consumer, t0);
    assert!(!source.stream_is_dead(t0 + Duration::from_secs(1)));
    assert!(source.stream_is_dead(t0 + Duration::from_secs(3)));
}
