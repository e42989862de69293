//! RTCP packet marshal/unmarshal: the receiver-report, picture-loss, NACK,
//! transport-wide-congestion-control, and extended-report packets a
//! `PublishStream`'s RTCP timer and NACK dispatch use (spec §4.9).

pub mod extended_report;
pub mod header;
pub mod payload_feedbacks;
pub mod receiver_report;
pub mod transport_feedbacks;

pub use extended_report::{ExtendedReport, Rrtr};
pub use payload_feedbacks::picture_loss_indication::PictureLossIndication;
pub use receiver_report::{ReceiverReport, ReceptionReport};
pub use transport_feedbacks::transport_layer_cc::{TransportLayerCc, TwccSymbol};
pub use transport_feedbacks::transport_layer_nack::{nack_pairs_from_sequence_numbers, NackPair, TransportLayerNack};
