//! Marker locator.
//!
//! Reads the built harness image and reports where the emulator should put
//! its breakpoints and where it should write the trial input. The result is
//! a small JSON document with `0x`-prefixed addresses.
//!
//! The harness binary is linked as a fixed-address executable, so these are
//! the runtime addresses. A position-independent image is still reported,
//! flagged, with addresses relative to its load base.

use std::path::Path;

use dvkm_abi::markers::{
    ENTRY_MARKER_SECTION, ENTRY_MARKER_SYMBOL, EXIT_MARKER_SECTION, EXIT_MARKER_SYMBOL,
    INPUT_SYMBOL,
};
use dvkm_core::elf::{ElfError, ElfImage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("elf: {0}")]
    Elf(#[from] ElfError),
    #[error("symbol `{0}` not found or undefined")]
    MissingSymbol(&'static str),
}

/// A virtual address from the image, serialized as a `0x`-prefixed hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HexAddr(pub u64);

impl std::fmt::Display for HexAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Serialize for HexAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .and_then(|digits| u64::from_str_radix(digits, 16).ok())
            .map(Self)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid address: '{raw}'")))
    }
}

/// Breakpoint and input locations inside one harness image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMap {
    pub image: String,
    /// Set when the image loads at a random base and the addresses below
    /// are offsets rather than runtime addresses.
    #[serde(default)]
    pub position_independent: bool,
    pub entry_marker: HexAddr,
    pub exit_marker: HexAddr,
    pub input: HexAddr,
    pub input_size: u64,
    /// Start of the entry marker's own section, when the build placed it in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_section: Option<HexAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_section: Option<HexAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_section: Option<HexAddr>,
}

impl MarkerMap {
    /// True when both marker sections exist and each starts at its marker.
    #[must_use]
    pub fn sections_match_markers(&self) -> bool {
        self.entry_section == Some(self.entry_marker) && self.exit_section == Some(self.exit_marker)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Locate the markers in the image at `path`.
pub fn locate_file(path: &Path) -> Result<MarkerMap, LocateError> {
    let bytes = std::fs::read(path)?;
    locate_image(&bytes, &path.display().to_string())
}

/// Locate the markers in an in-memory image. `label` names it in the output.
pub fn locate_image(bytes: &[u8], label: &str) -> Result<MarkerMap, LocateError> {
    let elf = ElfImage::parse(bytes)?;

    let section = |name: &str| -> Result<Option<HexAddr>, LocateError> {
        Ok(elf.section_by_name(name)?.map(|s| HexAddr(s.sh_addr)))
    };

    let [entry, exit, input] =
        elf.find_symbols([ENTRY_MARKER_SYMBOL, EXIT_MARKER_SYMBOL, INPUT_SYMBOL])?;
    let entry = entry.ok_or(LocateError::MissingSymbol(ENTRY_MARKER_SYMBOL))?;
    let exit = exit.ok_or(LocateError::MissingSymbol(EXIT_MARKER_SYMBOL))?;
    let input = input.ok_or(LocateError::MissingSymbol(INPUT_SYMBOL))?;

    Ok(MarkerMap {
        image: label.to_string(),
        position_independent: elf.header().is_position_independent(),
        entry_marker: HexAddr(entry.st_value),
        exit_marker: HexAddr(exit.st_value),
        input: HexAddr(input.st_value),
        input_size: input.st_size,
        entry_section: section(ENTRY_MARKER_SECTION)?,
        exit_section: section(EXIT_MARKER_SECTION)?,
        text_section: section(".text")?,
    })
}
