//! # NAL Header Classification
//!
//! Reads the header of the first NAL unit in an access unit (start code
//! already stripped) and sorts it into a coarse class. Only used for
//! reporting; the framer never inspects codec semantics.

use std::str::FromStr;

use serde::Deserialize;

/// Codec of the elementary stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    #[default]
    H265,
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" => Ok(Codec::H264),
            "h265" | "hevc" => Ok(Codec::H265),
            other => Err(format!("unknown codec {other:?} (expected \"h264\" or \"h265\")")),
        }
    }
}

/// Coarse role of a NAL unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NalClass {
    /// SPS, PPS, VPS.
    ParameterSet,
    /// IDR, CRA, BLA.
    Keyframe,
    /// Slices other frames predict from.
    Reference,
    /// Droppable slices, SEI, delimiters.
    NonReference,
    Unknown,
}

/// Decoded NAL header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    pub nal_type: u8,
    pub class: NalClass,
}

impl NalHeader {
    /// Parse the header at the start of `unit`. `None` if `unit` is shorter
    /// than the codec's header.
    pub fn parse(unit: &[u8], codec: Codec) -> Option<Self> {
        match codec {
            Codec::H264 => h264(unit),
            Codec::H265 => h265(unit),
        }
    }

    /// Random access point.
    pub fn is_keyframe(&self) -> bool {
        self.class == NalClass::Keyframe
    }
}

/// `forbidden(1) | nal_ref_idc(2) | nal_type(5)`
fn h264(unit: &[u8]) -> Option<NalHeader> {
    let header = *unit.first()?;
    let nal_type = header & 0x1F;
    let ref_idc = (header >> 5) & 0x03;

    let class = match nal_type {
        7 | 8 | 13 => NalClass::ParameterSet,
        5 => NalClass::Keyframe,
        1 if ref_idc > 0 => NalClass::Reference,
        1 => NalClass::NonReference,
        2..=4 => NalClass::Reference,
        6 | 9 => NalClass::NonReference,
        _ => NalClass::Unknown,
    };
    Some(NalHeader { nal_type, class })
}

/// `forbidden(1) | nal_type(6) | layer_id(6) | tid(3)`
fn h265(unit: &[u8]) -> Option<NalHeader> {
    if unit.len() < 2 {
        return None;
    }
    let nal_type = (unit[0] >> 1) & 0x3F;

    let class = match nal_type {
        32..=34 => NalClass::ParameterSet,
        16..=21 => NalClass::Keyframe,
        // Sub-layer non-reference pictures have even types below 16.
        0..=9 if nal_type % 2 == 0 => NalClass::NonReference,
        0..=9 => NalClass::Reference,
        35 | 39 | 40 => NalClass::NonReference,
        _ => NalClass::Unknown,
    };
    Some(NalHeader { nal_type, class })
}
