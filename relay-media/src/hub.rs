//! `OriginHub` (spec §4.2): fans one publisher's packets out to HLS, DASH,
//! DVR, and forwarder sinks, and announces codec parameters exactly once
//! per sequence header (the "wait for SH" pattern other subsystems rely on).

use std::time::Duration;

use relay_shared::error::{for_each_continue_on_error, Error, Result};
use relay_ts::VideoCodec;

use crate::packet::MediaPacket;

pub trait MediaSink {
    fn on_audio(&mut self, packet: &MediaPacket) -> Result<()>;
    fn on_video(&mut self, packet: &MediaPacket) -> Result<()>;

    fn on_meta_data(&mut self, _packet: &MediaPacket) -> Result<()> {
        Ok(())
    }

    /// How long the manager sweeper must wait after the stream dies before
    /// this sink is safe to tear down (e.g. an HLS segmenter flushing).
    fn cleanup_delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub codec: VideoCodec,
    pub profile: u8,
    pub level: u8,
    pub width: u32,
    pub height: u32,
    pub bitrate: u32,
    pub fps: f32,
}

pub trait VideoInfoStat {
    fn on_video_info(&mut self, info: VideoInfo);
}

#[derive(Default)]
pub struct OriginHub {
    sinks: Vec<Box<dyn MediaSink>>,
    stat: Option<Box<dyn VideoInfoStat>>,
    announced_sh: Option<bytes::Bytes>,
    forwarders: Vec<String>,
}

impl OriginHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stat(&mut self, stat: Box<dyn VideoInfoStat>) {
        self.stat = Some(stat);
    }

    pub fn add_sink(&mut self, sink: Box<dyn MediaSink>) {
        self.sinks.push(sink);
    }

    /// Static forwarder destinations come from config; dynamic ones from an
    /// HTTP callback (out of scope here). Either way `rtmps://` is rejected
    /// at construction, matching the original's forward-backend check.
    pub fn add_forwarder(&mut self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        if url.starts_with("rtmps://") {
            return Err(Error::Other(format!("origin hub: rtmps forwarder rejected: {url}")));
        }
        self.forwarders.push(url);
        Ok(())
    }

    pub fn forwarders(&self) -> &[String] {
        &self.forwarders
    }

    pub fn on_audio(&mut self, packet: &MediaPacket) -> Result<()> {
        for_each_continue_on_error(self.sinks.iter_mut(), |sink| sink.on_audio(packet))
    }

    pub fn on_meta_data(&mut self, packet: &MediaPacket) -> Result<()> {
        for_each_continue_on_error(self.sinks.iter_mut(), |sink| sink.on_meta_data(packet))
    }

    /// `video_info` is supplied only when `packet` is a sequence header and
    /// the caller has parsed codec parameters out of it; `stat.on_video_info`
    /// fires at most once per distinct SH byte sequence.
    pub fn on_video(&mut self, packet: &MediaPacket, video_info: Option<VideoInfo>) -> Result<()> {
        for_each_continue_on_error(self.sinks.iter_mut(), |sink| sink.on_video(packet))?;

        if packet.is_sequence_header {
            if let (Some(info), Some(stat)) = (video_info, self.stat.as_mut()) {
                let already_announced = self.announced_sh.as_deref() == Some(packet.payload.as_ref());
                if !already_announced {
                    stat.on_video_info(info);
                    self.announced_sh = Some(packet.payload.clone());
                }
            }
        }
        Ok(())
    }

    /// The manager sweeper must not free a dead source before the slowest
    /// sink finishes flushing.
    pub fn cleanup_delay(&self) -> Duration {
        self.sinks.iter().map(|s| s.cleanup_delay()).max().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CountingSink {
        audio_count: Rc<RefCell<u32>>,
        cleanup: Duration,
    }

    impl MediaSink for CountingSink {
        fn on_audio(&mut self, _packet: &MediaPacket) -> Result<()> {
            *self.audio_count.borrow_mut() += 1;
            Ok(())
        }
        fn on_video(&mut self, _packet: &MediaPacket) -> Result<()> {
            Ok(())
        }
        fn cleanup_delay(&self) -> Duration {
            self.cleanup
        }
    }

    struct RecordingStat {
        calls: Rc<RefCell<Vec<VideoInfo>>>,
    }

    impl VideoInfoStat for RecordingStat {
        fn on_video_info(&mut self, info: VideoInfo) {
            self.calls.borrow_mut().push(info);
        }
    }

    #[test]
    fn rejects_rtmps_forwarders() {
        let mut hub = OriginHub::new();
        assert!(hub.add_forwarder("rtmps://evil.example/live").is_err());
        assert!(hub.add_forwarder("rtmp://ok.example/live").is_ok());
    }

    #[test]
    fn fans_audio_to_every_sink() {
        let count = Rc::new(RefCell::new(0));
        let mut hub = OriginHub::new();
        hub.add_sink(Box::new(CountingSink { audio_count: count.clone(), cleanup: Duration::ZERO }));
        hub.add_sink(Box::new(CountingSink { audio_count: count.clone(), cleanup: Duration::from_secs(5) }));

        let pkt = MediaPacket::audio(0, Bytes::from_static(&[0xAF, 0x01]));
        hub.on_audio(&pkt).unwrap();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(hub.cleanup_delay(), Duration::from_secs(5));
    }

    #[test]
    fn announces_video_info_once_per_sequence_header() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hub = OriginHub::new();
        hub.set_stat(Box::new(RecordingStat { calls: calls.clone() }));

        let info = VideoInfo {
            codec: VideoCodec::H264,
            profile: 100,
            level: 31,
            width: 1280,
            height: 720,
            bitrate: 2_000_000,
            fps: 30.0,
        };
        let sh = MediaPacket::video(0, Bytes::from_static(&[0x17, 0x00, 1, 2, 3]));
        hub.on_video(&sh, Some(info)).unwrap();
        hub.on_video(&sh, Some(info)).unwrap();
        assert_eq!(calls.borrow().len(), 1);

        let other_sh = MediaPacket::video(1000, Bytes::from_static(&[0x17, 0x00, 9, 9, 9]));
        hub.on_video(&other_sh, Some(info)).unwrap();
        assert_eq!(calls.borrow().len(), 2);
    }
}
