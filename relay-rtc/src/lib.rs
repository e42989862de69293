//! RTC media plane (spec §4): per-connection track negotiation, the RTP
//! reassembly and packetization paths bridging RTC to RTMP/TS and back,
//! SRTP-like security transports, loss recovery (NACK/PLI/TWCC), and the
//! session manager tying UDP dispatch to all of the above.

pub mod audio_jitter;
pub mod candidates;
pub mod circuit_breaker;
pub mod nack_list;
pub mod pli_worker;
pub mod ring_buffer;
pub mod rtp_builder;
pub mod security;
pub mod session;
pub mod stream_description;
pub mod streams;
pub mod twcc;
pub mod video_cache;

pub use audio_jitter::AudioJitterBuffer;
pub use candidates::{discover_candidates, ApiServerAddress, CandidateConfig, IpFamily, NetworkInterface};
pub use circuit_breaker::{CircuitBreaker, WaterLevel};
pub use nack_list::NackList;
pub use pli_worker::{PliHandler, PliWorker};
pub use ring_buffer::RtpRingBuffer;
pub use rtp_builder::{AudioTranscoder, FilterPolicy, RtpBuilder};
pub use security::{FullTransport, KeyingMaterialExporter, PlaintextTransport, SecurityConfig, SecurityTransport, SemiTransport};
pub use session::{classify_datagram, fast_id, DatagramClass, RtcSession, SessionManager};
pub use stream_description::{Direction, PayloadDescription, RtxPayload, StreamDescription, TrackDescription};
pub use streams::{PlayStream, PublishStream, RtcpDispatch, ZeroJitter};
pub use twcc::TwccRecorder;
pub use video_cache::{FrameDetector, FrameEvent, FrameMessage, FramePayload, ScanOutcome, VideoPacketCache};
