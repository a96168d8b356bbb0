//! H.264/AVC parameter sets and Annex-B repackaging
//!
//! Upstream sessions hand over access units in AVCC form: a 4-byte big-endian
//! length followed by the coded slice. Downstream decoders expect Annex-B,
//! where NAL units are separated by start codes and a keyframe must be
//! preceded by its SPS and PPS so a viewer joining mid-stream can initialise.
//!
//! Keyframe layout produced by [`keyframe_annexb`]:
//! ```text
//! 00 00 01 | SPS | 00 00 01 | PPS | 00 00 01 | slice data
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::MediaError;

/// Three-byte Annex-B start code
pub const START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Size of the AVCC length prefix carried by upstream units
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// NAL unit type of a sequence parameter set
pub const NAL_SPS: u8 = 7;

/// NAL unit type of a picture parameter set
pub const NAL_PPS: u8 = 8;

/// NAL unit type carried in the low five bits of the NAL header
pub fn nal_type(header: u8) -> u8 {
    header & 0x1F
}

/// H.264 decoder configuration negotiated with the upstream source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcConfig {
    /// AVC profile (66=Baseline, 77=Main, 100=High, etc.)
    pub profile: u8,
    /// Profile compatibility flags
    pub compatibility: u8,
    /// AVC level (e.g., 31 = 3.1)
    pub level: u8,
    /// Sequence Parameter Sets
    pub sps: Vec<Bytes>,
    /// Picture Parameter Sets
    pub pps: Vec<Bytes>,
}

impl AvcConfig {
    /// Build from raw SPS and PPS NAL units, as carried in an SDP
    /// `sprop-parameter-sets` attribute.
    ///
    /// Profile, compatibility and level are read from the SPS header bytes.
    pub fn from_parameter_sets(sps: Bytes, pps: Bytes) -> Result<Self, MediaError> {
        if sps.len() < 4 || nal_type(sps[0]) != NAL_SPS {
            return Err(MediaError::InvalidAvcPacket);
        }
        if pps.is_empty() || nal_type(pps[0]) != NAL_PPS {
            return Err(MediaError::InvalidAvcPacket);
        }

        Ok(AvcConfig {
            profile: sps[1],
            compatibility: sps[2],
            level: sps[3],
            sps: vec![sps],
            pps: vec![pps],
        })
    }

    /// First SPS, if any
    pub fn first_sps(&self) -> Option<&Bytes> {
        self.sps.first()
    }

    /// First PPS, if any
    pub fn first_pps(&self) -> Option<&Bytes> {
        self.pps.first()
    }

    /// Get profile name
    pub fn profile_name(&self) -> &'static str {
        match self.profile {
            66 => "Baseline",
            77 => "Main",
            88 => "Extended",
            100 => "High",
            110 => "High 10",
            122 => "High 4:2:2",
            244 => "High 4:4:4",
            _ => "Unknown",
        }
    }

    /// Get level as string (e.g., "3.1")
    pub fn level_string(&self) -> String {
        format!("{}.{}", self.level / 10, self.level % 10)
    }
}

/// Drop the 4-byte AVCC length prefix from an upstream unit.
///
/// Zero-copy: the returned `Bytes` shares the unit's allocation.
pub fn strip_length_prefix(payload: &Bytes) -> Result<Bytes, MediaError> {
    if payload.len() < LENGTH_PREFIX_SIZE {
        return Err(MediaError::TruncatedUnit(payload.len()));
    }
    Ok(payload.slice(LENGTH_PREFIX_SIZE..))
}

/// Repackage a keyframe so it carries its own parameter sets.
pub fn keyframe_annexb(sps: &[u8], pps: &[u8], payload: &Bytes) -> Result<Bytes, MediaError> {
    let slice = strip_length_prefix(payload)?;

    let mut out = BytesMut::with_capacity(START_CODE.len() * 3 + sps.len() + pps.len() + slice.len());
    out.put_slice(&START_CODE);
    out.put_slice(sps);
    out.put_slice(&START_CODE);
    out.put_slice(pps);
    out.put_slice(&START_CODE);
    out.put_slice(&slice);

    Ok(out.freeze())
}
