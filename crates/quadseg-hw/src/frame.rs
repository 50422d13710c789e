//! Four-slot segment frame.

use std::fmt;

use crate::glyph::{character_for, glyph, DP};
use crate::DISPLAY_WIDTH;

/// The complete visible state of the panel: one segment mask per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Frame {
    masks: [u16; DISPLAY_WIDTH],
}

impl Frame {
    /// Creates a frame with no segments lit.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Creates a frame from raw segment masks.
    pub fn from_masks(masks: [u16; DISPLAY_WIDTH]) -> Self {
        Self { masks }
    }

    /// Encodes text and decimal point flags into a frame.
    ///
    /// Text shorter than the panel is padded with spaces on the right and
    /// longer text is truncated. Missing flags count as off, extra flags
    /// are ignored.
    pub fn encode(text: &str, dots: &[bool]) -> Self {
        let mut masks = [0u16; DISPLAY_WIDTH];
        let chars = text.chars().chain(std::iter::repeat(' '));
        for (i, (slot, ch)) in masks.iter_mut().zip(chars).enumerate() {
            *slot = glyph(ch);
            if dots.get(i).copied().unwrap_or(false) {
                *slot |= DP;
            }
        }
        Self { masks }
    }

    /// Returns the segment masks, leftmost first.
    pub fn masks(&self) -> &[u16; DISPLAY_WIDTH] {
        &self.masks
    }

    /// Returns the mask of a single slot.
    pub fn slot(&self, index: usize) -> Option<u16> {
        self.masks.get(index).copied()
    }

    /// Returns true if no segment (including decimal points) is lit.
    pub fn is_blank(&self) -> bool {
        self.masks.iter().all(|&m| m == 0)
    }

    /// Returns which slots have their decimal point lit.
    pub fn dots(&self) -> [bool; DISPLAY_WIDTH] {
        self.masks.map(|m| m & DP != 0)
    }

    /// Best-effort text for the frame, for logs and status output.
    ///
    /// Masks with no matching glyph render as `?`; a lit decimal point
    /// follows its character as `.`.
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity(DISPLAY_WIDTH * 2);
        for &mask in &self.masks {
            out.push(character_for(mask & !DP).unwrap_or('?'));
            if mask & DP != 0 {
                out.push('.');
            }
        }
        out
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.render_text())
    }
}
