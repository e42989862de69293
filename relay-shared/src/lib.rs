#![warn(rust_2018_idioms)]

pub mod clock;
pub mod error;
pub mod marshal;
pub mod ssrc;
pub mod util;

pub use clock::Clock;
pub use error::{Error, Result};
pub use marshal::{Marshal, MarshalSize, Unmarshal};
pub use ssrc::SsrcGenerator;
