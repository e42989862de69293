//! Security Transport (spec §4.7): three polymorphic variants of one
//! `SecurityTransport` interface spanning the full DTLS record lifecycle
//! (ingest, alerts, handshake completion, application data, egress) plus the
//! post-handshake SRTP protect/unprotect surface. The DTLS handshake
//! protocol itself — record decryption, the state machine that drives
//! ClientHello/ServerHello — is an external collaborator's concern; this
//! module is the seam it's built against, via the same
//! `KeyingMaterialExporter` split a DTLS implementation and an SRTP
//! implementation are conventionally divided across.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr128BE;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use relay_shared::error::{Error, Result};

type Aes128Ctr = Ctr128BE<Aes128>;
type HmacSha1 = Hmac<Sha1>;

const SRTP_KEY_LEN: usize = 16;
const SRTP_SALT_LEN: usize = 14;
const SRTP_AUTH_TAG_LEN: usize = 10;

/// RFC 5246 §7.2 alert level; a fatal alert tears the session down.
const DTLS_ALERT_LEVEL_FATAL: u8 = 2;

/// Role and any per-session DTLS parameters a transport needs before a
/// handshake starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityConfig {
    pub is_client: bool,
}

/// Exports keying material derived from a completed DTLS handshake (RFC
/// 5764). The DTLS handshake protocol itself is out of scope here; a real
/// deployment plugs in the collaborator that ran the handshake.
pub trait KeyingMaterialExporter {
    fn export_keying_material(&self, label: &str, context: &[u8], length: usize) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
struct SrtpSession {
    key: [u8; SRTP_KEY_LEN],
    salt: [u8; SRTP_SALT_LEN],
    auth_key: Vec<u8>,
}

impl SrtpSession {
    fn derive(material: &[u8]) -> Result<Self> {
        if material.len() < SRTP_KEY_LEN + SRTP_SALT_LEN {
            return Err(Error::SrtpInit("exported keying material too short".into()));
        }
        let mut key = [0u8; SRTP_KEY_LEN];
        let mut salt = [0u8; SRTP_SALT_LEN];
        key.copy_from_slice(&material[..SRTP_KEY_LEN]);
        salt.copy_from_slice(&material[SRTP_KEY_LEN..SRTP_KEY_LEN + SRTP_SALT_LEN]);
        // The auth key is a second HMAC-SHA1 key, independent of the cipher
        // key; derived here from the same export rather than a second
        // exporter round-trip.
        let auth_key = material[SRTP_KEY_LEN + SRTP_SALT_LEN..].to_vec();
        Ok(SrtpSession { key, salt, auth_key })
    }

    /// RFC 3711 §4.1.1 IV formula, simplified: salt (zero-extended to 16
    /// bytes) XOR the SSRC and packet index placed at the byte offsets the
    /// RFC specifies.
    fn iv_for(&self, ssrc: u32, index: u64) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[2..16].copy_from_slice(&self.salt);
        let ssrc_bytes = ssrc.to_be_bytes();
        for (i, b) in ssrc_bytes.iter().enumerate() {
            iv[4 + i] ^= b;
        }
        let index_bytes = index.to_be_bytes();
        for (i, b) in index_bytes.iter().enumerate() {
            iv[8 + i] ^= b;
        }
        iv
    }

    fn keystream_xor(&self, ssrc: u32, index: u64, buf: &mut [u8]) {
        let iv = self.iv_for(ssrc, index);
        let mut cipher = Aes128Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(buf);
    }

    fn auth_tag(&self, data: &[u8]) -> Result<[u8; SRTP_AUTH_TAG_LEN]> {
        let mut mac = HmacSha1::new_from_slice(&self.auth_key).map_err(|e| Error::SrtpInit(e.to_string()))?;
        mac.update(data);
        let full = mac.finalize().into_bytes();
        let mut tag = [0u8; SRTP_AUTH_TAG_LEN];
        tag.copy_from_slice(&full[..SRTP_AUTH_TAG_LEN]);
        Ok(tag)
    }
}

/// Extracts the SSRC (bytes 8..12) and sequence number (bytes 2..4) from an
/// RTP header without a full parse, since protect/unprotect only need those
/// two fields for IV derivation.
fn ssrc_and_seq(buf: &[u8]) -> Result<(u32, u16)> {
    if buf.len() < 12 {
        return Err(Error::SrtpProtect("buffer shorter than an rtp header".into()));
    }
    let seq = u16::from_be_bytes([buf[2], buf[3]]);
    let ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Ok((ssrc, seq))
}

/// The full DTLS record lifecycle plus post-handshake SRTP protect/unprotect
/// (spec §4.7). `on_dtls`/`write_dtls_data` are the byte-level ingestion and
/// egress entry points a DTLS engine drives this transport through;
/// `on_dtls_handshake_done` and `srtp_initialize` are deliberately separate
/// steps, since a semi-secure deployment completes the handshake without
/// ever deriving an SRTP session.
pub trait SecurityTransport: Send {
    fn initialize(&mut self, cfg: &SecurityConfig) -> Result<()>;
    fn start_active_handshake(&mut self) -> Result<()>;
    /// Feed one received DTLS record in.
    fn on_dtls(&mut self, data: &[u8]) -> Result<()>;
    fn on_dtls_alert(&mut self, alert_type: u8, alert_desc: u8) -> Result<()>;
    fn on_dtls_handshake_done(&mut self) -> Result<()>;
    fn on_dtls_application_data(&mut self, data: &[u8]) -> Result<()>;
    /// Hand one DTLS record destined for the peer to the transport so it can
    /// be queued for the UDP socket to send.
    fn write_dtls_data(&mut self, data: &[u8]) -> Result<()>;
    fn srtp_initialize(&mut self, exporter: &dyn KeyingMaterialExporter) -> Result<()>;
    fn protect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>>;
    fn unprotect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>>;
    fn protect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>>;
    fn unprotect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>>;
}

/// Full DTLS-SRTP: AES-CM-128 + HMAC-SHA1-80 protect/unprotect once the
/// handshake has exported keying material.
#[derive(Default)]
pub struct FullTransport {
    session: Option<SrtpSession>,
    handshake_done: bool,
    role: Option<bool>,
    last_alert: Option<(u8, u8)>,
    outbound_dtls: Vec<Vec<u8>>,
}

impl FullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// DTLS records queued by `write_dtls_data`, waiting for a UDP socket
    /// collaborator to send them and clear the queue.
    pub fn outbound_dtls(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound_dtls)
    }

    fn session(&self) -> Result<&SrtpSession> {
        self.session.as_ref().ok_or_else(|| Error::SrtpProtect("srtp session not initialized".into()))
    }

    fn protect(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let session = self.session()?;
        let (ssrc, seq) = ssrc_and_seq(buf)?;
        let mut out = buf.to_vec();
        session.keystream_xor(ssrc, seq as u64, &mut out[12..]);
        let tag = session.auth_tag(&out)?;
        out.extend_from_slice(&tag);
        Ok(out)
    }

    fn unprotect(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let session = self.session()?;
        if buf.len() < 12 + SRTP_AUTH_TAG_LEN {
            return Err(Error::SrtpUnprotect("packet shorter than header + auth tag".into()));
        }
        let (body, tag) = buf.split_at(buf.len() - SRTP_AUTH_TAG_LEN);
        let expected = session.auth_tag(body)?;
        if expected != tag {
            return Err(Error::SrtpUnprotect("auth tag mismatch".into()));
        }
        let (ssrc, seq) = ssrc_and_seq(body)?;
        let mut out = body.to_vec();
        session.keystream_xor(ssrc, seq as u64, &mut out[12..]);
        Ok(out)
    }
}

impl SecurityTransport for FullTransport {
    fn initialize(&mut self, cfg: &SecurityConfig) -> Result<()> {
        self.role = Some(cfg.is_client);
        Ok(())
    }

    fn start_active_handshake(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_dtls(&mut self, _data: &[u8]) -> Result<()> {
        // Record decryption and the handshake state machine live in the
        // external DTLS collaborator; this transport only needs the
        // completion/alert/application-data signals it raises separately.
        Ok(())
    }

    fn on_dtls_alert(&mut self, alert_type: u8, alert_desc: u8) -> Result<()> {
        self.last_alert = Some((alert_type, alert_desc));
        if alert_type == DTLS_ALERT_LEVEL_FATAL {
            self.handshake_done = false;
            self.session = None;
        }
        Ok(())
    }

    /// Idempotent: a repeat call is a no-op (spec §4.7).
    fn on_dtls_handshake_done(&mut self) -> Result<()> {
        self.handshake_done = true;
        Ok(())
    }

    fn on_dtls_application_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_dtls_data(&mut self, data: &[u8]) -> Result<()> {
        self.outbound_dtls.push(data.to_vec());
        Ok(())
    }

    /// Idempotent: the second call returns success without re-deriving keys.
    fn srtp_initialize(&mut self, exporter: &dyn KeyingMaterialExporter) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        let material = exporter.export_keying_material("EXTRACTOR-dtls_srtp", &[], 2 * (SRTP_KEY_LEN + SRTP_SALT_LEN))?;
        self.session = Some(SrtpSession::derive(&material)?);
        Ok(())
    }

    fn protect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.protect(buf)
    }

    fn unprotect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.unprotect(buf)
    }

    fn protect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.protect(buf)
    }

    fn unprotect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.unprotect(buf)
    }
}

/// DTLS runs to completion and keys are exported, but protect/unprotect are
/// pass-through (spec §4.7: "low-overhead debugging of authenticated but
/// unencrypted streams").
#[derive(Default)]
pub struct SemiTransport {
    handshake_done: bool,
    role: Option<bool>,
    last_alert: Option<(u8, u8)>,
    outbound_dtls: Vec<Vec<u8>>,
}

impl SemiTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbound_dtls(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound_dtls)
    }
}

impl SecurityTransport for SemiTransport {
    fn initialize(&mut self, cfg: &SecurityConfig) -> Result<()> {
        self.role = Some(cfg.is_client);
        Ok(())
    }

    fn start_active_handshake(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_dtls(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_dtls_alert(&mut self, alert_type: u8, alert_desc: u8) -> Result<()> {
        self.last_alert = Some((alert_type, alert_desc));
        if alert_type == DTLS_ALERT_LEVEL_FATAL {
            self.handshake_done = false;
        }
        Ok(())
    }

    fn on_dtls_handshake_done(&mut self) -> Result<()> {
        self.handshake_done = true;
        Ok(())
    }

    fn on_dtls_application_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_dtls_data(&mut self, data: &[u8]) -> Result<()> {
        self.outbound_dtls.push(data.to_vec());
        Ok(())
    }

    fn srtp_initialize(&mut self, _exporter: &dyn KeyingMaterialExporter) -> Result<()> {
        Ok(())
    }

    fn protect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn unprotect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn protect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn unprotect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }
}

/// No DTLS at all; `start_active_handshake` signals done immediately and
/// every protect/unprotect call is pass-through.
#[derive(Default)]
pub struct PlaintextTransport {
    handshake_done: bool,
}

impl PlaintextTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_handshake_done(&self) -> bool {
        self.handshake_done
    }
}

impl SecurityTransport for PlaintextTransport {
    fn initialize(&mut self, _cfg: &SecurityConfig) -> Result<()> {
        Ok(())
    }

    fn start_active_handshake(&mut self) -> Result<()> {
        self.handshake_done = true;
        Ok(())
    }

    fn on_dtls(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_dtls_alert(&mut self, _alert_type: u8, _alert_desc: u8) -> Result<()> {
        Ok(())
    }

    fn on_dtls_handshake_done(&mut self) -> Result<()> {
        self.handshake_done = true;
        Ok(())
    }

    fn on_dtls_application_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn write_dtls_data(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn srtp_initialize(&mut self, _exporter: &dyn KeyingMaterialExporter) -> Result<()> {
        Ok(())
    }

    fn protect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn unprotect_rtp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn protect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }

    fn unprotect_rtcp(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(buf.to_vec())
    }
}
