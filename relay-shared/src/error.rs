use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The uniform error kind used across the relay crates (spec §7).
///
/// Each variant carries a free-form detail string; an optional wrapped
/// cause is attached with `#[source]` where a lower layer's error is being
/// propagated rather than originated here.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("rtp muxer: {0}")]
    RtpMuxer(String),

    #[error("srtp: key derivation/init failed: {0}")]
    SrtpInit(String),

    #[error("srtp: protect failed: {0}")]
    SrtpProtect(String),

    #[error("srtp: unprotect failed: {0}")]
    SrtpUnprotect(String),

    #[error("rtc: dtls error: {0}")]
    RtcDtls(String),

    #[error("rtc: sdp decode failed: {0}")]
    RtcSdpDecode(String),

    #[error("rtc: stun parse failed: {0}")]
    RtcStun(String),

    #[error("stream caster: ts sync byte invalid")]
    TsSyncByte,

    #[error("stream caster: ts adaptation field length invalid: {0}")]
    TsAdaptationFieldLength(String),

    #[error("stream caster: psi crc invalid")]
    TsPsiCrc,

    #[error("stream caster: pes boundary violated: {0}")]
    TsPesBoundary(String),

    #[error("hls: aac frame length invalid: {0}")]
    HlsAacFrameLength(String),

    #[error("hls: avc sample size invalid: {0}")]
    HlsAvcSampleSize(String),

    #[error("hls: no audio/video stream, vcodec={vcodec}, acodec={acodec}")]
    HlsNoStream { vcodec: u8, acodec: u8 },

    #[error("ts: context not ready, PAT/PMT not yet written")]
    TsContextNotReady,

    #[error("http hooks: {0}")]
    HttpHooks(String),

    #[error("system: stream busy, another publisher is active")]
    SystemStreamBusy,

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap this error with additional layer context, per §7 propagation rule:
    /// "a fresh error is constructed at its origin; callers wrap it with
    /// context (the layer they are) and propagate."
    pub fn wrap(self, context: impl Into<String>) -> Error {
        Error::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Run `f` over every item in `iter`, continuing past individual failures and
/// returning the first error encountered (spec §7: "Loops that process many
/// items... continue on error per-item, returning the first error at the end").
pub fn for_each_continue_on_error<T>(
    iter: impl IntoIterator<Item = T>,
    mut f: impl FnMut(T) -> Result<()>,
) -> Result<()> {
    let mut first_err = None;
    for item in iter {
        if let Err(e) = f(item) {
            log::warn!("continuing fanout after per-item error: {e}");
            if first_err.is_none() {
                first_err = Some(e);
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
