//! PLI Worker (spec §4.8): a single-producer, single-consumer coalescing
//! queue. Player NACK timeouts and bridge timers may both request PLI
//! within milliseconds of each other; coalescing avoids flooding the
//! publisher with duplicate keyframe requests.

use std::collections::HashSet;
use std::collections::VecDeque;

use relay_shared::error::Result;

pub trait PliHandler {
    fn do_request_keyframe(&mut self, ssrc: u32, subscriber_cid: u64) -> Result<()>;
}

#[derive(Default)]
pub struct PliWorker {
    queued: HashSet<(u32, u64)>,
    queue: VecDeque<(u32, u64)>,
}

impl PliWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a unique `(ssrc, cid)` pair; duplicates already pending are
    /// silently dropped.
    pub fn request_keyframe(&mut self, ssrc: u32, subscriber_cid: u64) {
        if self.queued.insert((ssrc, subscriber_cid)) {
            self.queue.push_back((ssrc, subscriber_cid));
        }
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Dequeues every pending request and dispatches it to `handler`;
    /// errors are logged and swallowed so the worker keeps running.
    pub fn drain(&mut self, handler: &mut dyn PliHandler) {
        while let Some((ssrc, cid)) = self.queue.pop_front() {
            self.queued.remove(&(ssrc, cid));
            if let Err(e) = handler.do_request_keyframe(ssrc, cid) {
                log::warn!("pli worker: request_keyframe(ssrc={ssrc}, cid={cid}) failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingHandler {
        calls: Vec<(u32, u64)>,
    }

    impl PliHandler for RecordingHandler {
        fn do_request_keyframe(&mut self, ssrc: u32, subscriber_cid: u64) -> Result<()> {
            self.calls.push((ssrc, subscriber_cid));
            Ok(())
        }
    }

    #[test]
    fn duplicate_requests_are_coalesced() {
        let mut worker = PliWorker::new();
        worker.request_keyframe(100, 1);
        worker.request_keyframe(100, 1);
        worker.request_keyframe(100, 2);
        assert_eq!(worker.pending_len(), 2);
    }

    #[test]
    fn drain_dispatches_every_distinct_request_in_order() {
        let mut worker = PliWorker::new();
        worker.request_keyframe(100, 1);
        worker.request_keyframe(200, 2);

        let mut handler = RecordingHandler { calls: Vec::new() };
        worker.drain(&mut handler);

        assert_eq!(handler.calls, vec![(100, 1), (200, 2)]);
        assert_eq!(worker.pending_len(), 0);

        worker.request_keyframe(100, 1);
        assert_eq!(worker.pending_len(), 1, "same pair can be requested again after draining");
    }
}
