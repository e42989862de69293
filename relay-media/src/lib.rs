//! Per-stream routing plane (spec §2 "L1"): `StreamSource` fans each
//! publisher's packets to consumer queues, an `OriginHub`, and optional
//! bridges; `SourceManager` owns the URL→source map.

pub mod gop_cache;
pub mod hub;
pub mod manager;
pub mod meta_cache;
pub mod packet;
pub mod queue;
pub mod source;

pub use gop_cache::GopCache;
pub use hub::{MediaSink, OriginHub, VideoInfo, VideoInfoStat};
pub use manager::SourceManager;
pub use meta_cache::{MetaCache, SequenceHeaderUpdate};
pub use packet::{MediaPacket, MessageType};
pub use queue::MessageQueue;
pub use source::{Bridge, StreamSource};
