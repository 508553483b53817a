//! # Start-Code Scanners
//!
//! Boundary detection for Annex B elementary streams. Every scanner follows
//! the same accumulate-and-emit rules:
//!
//! - start codes (`00 00 01`, `00 00 00 01`) are stripped from the units
//! - bytes before the first start code are dropped
//! - a stream with no start code at all is one unit holding the whole stream
//! - an empty unit is never emitted, so a stream ending on a start code has
//!   no trailing unit
//!
//! They differ in where they look for start codes. [`AlignedWindow`] only
//! checks 4-byte windows at 4-byte offsets, which assumes the producer aligned
//! every start code; misaligned streams misframe. [`ByteScan`] finds start
//! codes at any offset.

use std::io::{self, Read, Seek, SeekFrom};
use std::str::FromStr;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::MediaError;
use crate::read::read_full;

const START_CODE_LONG: [u8; 4] = [0x00, 0x00, 0x00, 0x01];
const START_CODE_SHORT: [u8; 3] = [0x00, 0x00, 0x01];

/// Finds access-unit boundaries in a byte source.
pub trait StartCodeScanner {
    /// Read the next access unit, without its start code.
    ///
    /// `Ok(None)` means the source is exhausted. Scanner state carries over
    /// between calls, so one scanner serves exactly one source.
    fn next_access_unit<R: Read + Seek>(&mut self, source: &mut R) -> Result<Option<Bytes>, MediaError>;
}

// ─── Aligned Window ─────────────────────────────────────────────────────────

/// Reads 4 bytes at a time and treats a window as a boundary when it is the
/// 4-byte start code, or the 3-byte start code plus one payload byte.
///
/// On a boundary ending a unit, the source is rewound by 4 bytes so the
/// marker opens the next unit.
#[derive(Debug, Default, Clone)]
pub struct AlignedWindow {
    synced: bool,
}

enum Window {
    Long,
    Short(u8),
    Data,
}

fn classify_window(window: &[u8; 4]) -> Window {
    if *window == START_CODE_LONG {
        Window::Long
    } else if window[..3] == START_CODE_SHORT {
        Window::Short(window[3])
    } else {
        Window::Data
    }
}

impl StartCodeScanner for AlignedWindow {
    fn next_access_unit<R: Read + Seek>(&mut self, source: &mut R) -> Result<Option<Bytes>, MediaError> {
        let mut unit = Vec::new();
        let mut window = [0u8; 4];

        loop {
            let n = read_full(source, &mut window).map_err(MediaError::Read)?;
            if n == 0 {
                return Ok(finish(unit));
            }
            if n < window.len() {
                // Tail shorter than a window can't hold a marker.
                unit.extend_from_slice(&window[..n]);
                continue;
            }

            let payload = match classify_window(&window) {
                Window::Data => {
                    unit.extend_from_slice(&window);
                    continue;
                }
                Window::Long => None,
                Window::Short(first) => Some(first),
            };

            if !self.synced {
                // Everything before the first start code is discarded.
                self.synced = true;
                unit.clear();
            } else if !unit.is_empty() {
                source
                    .seek(SeekFrom::Current(-(window.len() as i64)))
                    .map_err(MediaError::Seek)?;
                return Ok(Some(Bytes::from(unit)));
            }
            unit.extend(payload);
        }
    }
}

// ─── Byte Scan ──────────────────────────────────────────────────────────────

/// Byte-granular Annex B scanner. Recognizes start codes at any offset and
/// never needs to seek, at the cost of one read call per byte (wrap the
/// source in a `BufReader`).
#[derive(Debug, Default, Clone)]
pub struct ByteScan {
    synced: bool,
}

impl StartCodeScanner for ByteScan {
    fn next_access_unit<R: Read + Seek>(&mut self, source: &mut R) -> Result<Option<Bytes>, MediaError> {
        let mut unit = Vec::new();

        loop {
            let Some(byte) = read_byte(source).map_err(MediaError::Read)? else {
                return Ok(finish(unit));
            };
            unit.push(byte);
            if !unit.ends_with(&START_CODE_SHORT) {
                continue;
            }

            let len = unit.len();
            let marker = if len >= 4 && unit[len - 4] == 0x00 { 4 } else { 3 };
            unit.truncate(len - marker);

            if !self.synced {
                self.synced = true;
                unit.clear();
            } else if !unit.is_empty() {
                return Ok(Some(Bytes::from(unit)));
            }
        }
    }
}

fn read_byte<R: Read>(source: &mut R) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match read_full(source, &mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

fn finish(unit: Vec<u8>) -> Option<Bytes> {
    if unit.is_empty() {
        None
    } else {
        Some(Bytes::from(unit))
    }
}

// ─── Selection ──────────────────────────────────────────────────────────────

/// Configurable choice of scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// [`AlignedWindow`].
    #[default]
    Aligned,
    /// [`ByteScan`].
    Byte,
}

impl FromStr for ScannerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aligned" => Ok(ScannerKind::Aligned),
            "byte" => Ok(ScannerKind::Byte),
            other => Err(format!("unknown scanner {other:?} (expected \"aligned\" or \"byte\")")),
        }
    }
}

impl ScannerKind {
    pub fn scanner(self) -> AnyScanner {
        match self {
            ScannerKind::Aligned => AnyScanner::Aligned(AlignedWindow::default()),
            ScannerKind::Byte => AnyScanner::Byte(ByteScan::default()),
        }
    }
}

/// Scanner picked at runtime from a [`ScannerKind`].
#[derive(Debug, Clone)]
pub enum AnyScanner {
    Aligned(AlignedWindow),
    Byte(ByteScan),
}

impl StartCodeScanner for AnyScanner {
    fn next_access_unit<R: Read + Seek>(&mut self, source: &mut R) -> Result<Option<Bytes>, MediaError> {
        match self {
            AnyScanner::Aligned(s) => s.next_access_unit(source),
            AnyScanner::Byte(s) => s.next_access_unit(source),
        }
    }
}
