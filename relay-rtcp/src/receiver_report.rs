//! Receiver Report (RFC 3550 §6.4.2), emitted by `PublishStream`'s 100ms
//! RTCP timer for every receive track (spec §4.9).

use bytes::{Buf, Bytes};
use relay_shared::error::Result;
use relay_shared::marshal::{self, Marshal, MarshalSize, Unmarshal};

use crate::header::{self, PT_RECEIVER_REPORT};

const REPORT_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub total_lost: u32,
    pub last_sequence_number: u32,
    pub jitter: u32,
    pub last_sender_report: u32,
    pub delay: u32,
}

impl ReceptionReport {
    fn marshal_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.ssrc.to_be_bytes());
        buf[4] = self.fraction_lost;
        let lost = self.total_lost.to_be_bytes();
        buf[5..8].copy_from_slice(&lost[1..4]);
        buf[8..12].copy_from_slice(&self.last_sequence_number.to_be_bytes());
        buf[12..16].copy_from_slice(&self.jitter.to_be_bytes());
        buf[16..20].copy_from_slice(&self.last_sender_report.to_be_bytes());
        buf[20..24].copy_from_slice(&self.delay.to_be_bytes());
    }

    fn unmarshal_from(buf: &[u8]) -> Self {
        ReceptionReport {
            ssrc: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            fraction_lost: buf[4],
            total_lost: u32::from_be_bytes([0, buf[5], buf[6], buf[7]]),
            last_sequence_number: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            jitter: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            last_sender_report: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
            delay: u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
    pub profile_extensions: Bytes,
}

impl MarshalSize for ReceiverReport {
    fn marshal_size(&self) -> usize {
        4 + 4 + self.reports.len() * REPORT_SIZE + self.profile_extensions.len()
    }
}

impl Marshal for ReceiverReport {
    fn marshal_to(&self, buf: &mut [u8]) -> Result<usize> {
        let size = self.marshal_size();
        if self.reports.len() > 0x1F {
            return Err(relay_shared::error::Error::Other("rtcp: too many reception reports".into()));
        }
        let length_words = (size / 4) as u16 - 1;
        header::encode_header(buf, self.reports.len() as u8, PT_RECEIVER_REPORT, length_words);
        buf[4..8].copy_from_slice(&self.ssrc.to_be_bytes());
        let mut pos = 8;
        for report in &self.reports {
            report.marshal_into(&mut buf[pos..pos + REPORT_SIZE]);
            pos += REPORT_SIZE;
        }
        buf[pos..pos + self.profile_extensions.len()].copy_from_slice(&self.profile_extensions);
        Ok(size)
    }
}

impl Unmarshal for ReceiverReport {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        B: Buf,
    {
        marshal::require(buf.remaining(), 8, "rtcp receiver report")?;
        let mut head = [0u8; 4];
        buf.copy_to_slice(&mut head);
        let decoded = header::decode_header(&head, PT_RECEIVER_REPORT)?;
        let ssrc = buf.get_u32();

        let count = decoded.count_or_fmt as usize;
        marshal::require(buf.remaining(), count * REPORT_SIZE, "rtcp reception reports")?;
        let mut reports = Vec::with_capacity(count);
        for _ in 0..count {
            let mut block = [0u8; REPORT_SIZE];
            buf.copy_to_slice(&mut block);
            reports.push(ReceptionReport::unmarshal_from(&block));
        }

        let total = header::declared_total_len(decoded.length_words);
        let consumed_after_header = 4 + reports.len() * REPORT_SIZE;
        let extension_len = total.saturating_sub(4 + consumed_after_header);
        marshal::require(buf.remaining(), extension_len, "rtcp receiver report extensions")?;
        let mut extensions = vec![0u8; extension_len];
        buf.copy_to_slice(&mut extensions);

        Ok(ReceiverReport {
            ssrc,
            reports,
            profile_extensions: Bytes::from(extensions),
        })
    }
}
