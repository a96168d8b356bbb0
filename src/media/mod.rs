//! Media handling for the relay
//!
//! This module provides:
//! - Codec descriptors negotiated with the upstream source
//! - H.264 parameter set validation
//! - AVCC to Annex-B repackaging for downstream viewers

pub mod codec;
pub mod h264;

pub use codec::CodecDescriptor;
pub use h264::AvcConfig;
