//! Glyph table for 14-segment characters.
//!
//! Each entry is indexed by ASCII code. Bits 0-13 light the fourteen
//! segments, bit 14 is the decimal point and bit 15 is unused.
//!
//! ```text
//!  -----0-----
//! |\    |    /|
//! 5  8  9  10 1
//! |    \|/    |
//!  --6--  --7--
//! |    /|\    |
//! 4  11 12 13 2
//! |/    |    \|
//!  -----3-----  .14
//! ```

use tracing::debug;

/// Decimal point segment.
pub const DP: u16 = 0x4000;

/// Index of the glyph shown for any character the table cannot represent.
pub const FALLBACK_CODE: usize = 127;

/// Segment masks for codes 0-127.
///
/// Codes 0-15 light a single segment each and are handy for wiring checks.
/// Code 127 lights every segment so unsupported input is visibly wrong
/// rather than silently blank.
pub const GLYPHS: [u16; 128] = [
    0b00_00000000000001, // 0x00
    0b00_00000000000010, // 0x01
    0b00_00000000000100, // 0x02
    0b00_00000000001000, // 0x03
    0b00_00000000010000, // 0x04
    0b00_00000000100000, // 0x05
    0b00_00000001000000, // 0x06
    0b00_00000010000000, // 0x07
    0b00_00000100000000, // 0x08
    0b00_00001000000000, // 0x09
    0b00_00010000000000, // 0x0A
    0b00_00100000000000, // 0x0B
    0b00_01000000000000, // 0x0C
    0b00_10000000000000, // 0x0D
    0b01_00000000000000, // 0x0E
    0b10_00000000000000, // 0x0F
    0b00_00000000000000, // 0x10
    0b00_00000000000000, // 0x11
    0b00_00000000000000, // 0x12
    0b00_00000000000000, // 0x13
    0b00_00000000000000, // 0x14
    0b00_00000000000000, // 0x15
    0b00_00000000000000, // 0x16
    0b00_00000000000000, // 0x17
    0b00_01001011001001, // 0x18
    0b00_01010111000000, // 0x19
    0b00_01001011111001, // 0x1A
    0b00_00000011100011, // 0x1B
    0b00_00010100110000, // 0x1C
    0b00_01001011001000, // 0x1D
    0b00_11101000000000, // 0x1E
    0b00_01011100000000, // 0x1F
    0b00_00000000000000, // space
    0b00_00000000000110, // '!'
    0b00_00001000100000, // '"'
    0b00_01001011001110, // '#'
    0b00_01001011101101, // '$'
    0b00_00110000100100, // '%'
    0b00_10001101011101, // '&'
    0b00_00010000000000, // '\''
    0b00_10010000000000, // '('
    0b00_00100100000000, // ')'
    0b00_11111111000000, // '*'
    0b00_01001011000000, // '+'
    0b00_00100000000000, // ','
    0b00_00000011000000, // '-'
    0b00_00000000000000, // '.'
    0b00_00110000000000, // '/'
    0b00_00110000111111, // '0'
    0b00_00000000000110, // '1'
    0b00_00000011011011, // '2'
    0b00_00000010001111, // '3'
    0b00_00000011100110, // '4'
    0b00_10000001101001, // '5'
    0b00_00000011111101, // '6'
    0b00_00000000000111, // '7'
    0b00_00000011111111, // '8'
    0b00_00000011101111, // '9'
    0b00_01001000000000, // ':'
    0b00_00101000000000, // ';'
    0b00_10010000000000, // '<'
    0b00_00000011001000, // '='
    0b00_00100100000000, // '>'
    0b00_01000010000011, // '?'
    0b00_00001010111011, // '@'
    0b00_00000011110111, // 'A'
    0b00_01001010001111, // 'B'
    0b00_00000000111001, // 'C'
    0b00_01001000001111, // 'D'
    0b00_00000011111001, // 'E'
    0b00_00000001110001, // 'F'
    0b00_00000010111101, // 'G'
    0b00_00000011110110, // 'H'
    0b00_01001000000000, // 'I'
    0b00_00000000011110, // 'J'
    0b00_10010001110000, // 'K'
    0b00_00000000111000, // 'L'
    0b00_00010100110110, // 'M'
    0b00_10000100110110, // 'N'
    0b00_00000000111111, // 'O'
    0b00_00000011110011, // 'P'
    0b00_10000000111111, // 'Q'
    0b00_10000011110011, // 'R'
    0b00_00000011101101, // 'S'
    0b00_01001000000001, // 'T'
    0b00_00000000111110, // 'U'
    0b00_00110000110000, // 'V'
    0b00_10100000110110, // 'W'
    0b00_10110100000000, // 'X'
    0b00_01010100000000, // 'Y'
    0b00_00110000001001, // 'Z'
    0b00_00000000111001, // '['
    0b00_10000100000000, // '\\'
    0b00_00000000001111, // ']'
    0b00_00110000000011, // '^'
    0b00_00000000001000, // '_'
    0b00_00000100000000, // '`'
    0b00_01000001011000, // 'a'
    0b00_10000001111000, // 'b'
    0b00_00000011011000, // 'c'
    0b00_00100010001110, // 'd'
    0b00_00100001011000, // 'e'
    0b00_00000001110001, // 'f'
    0b00_00010010001110, // 'g'
    0b00_01000001110000, // 'h'
    0b00_01000000000000, // 'i'
    0b00_00000000001110, // 'j'
    0b00_11011000000000, // 'k'
    0b00_00000000110000, // 'l'
    0b00_01000011010100, // 'm'
    0b00_01000001010000, // 'n'
    0b00_00000011011100, // 'o'
    0b00_00000101110000, // 'p'
    0b00_00010010000110, // 'q'
    0b00_00000001010000, // 'r'
    0b00_10000010001000, // 's'
    0b00_00000001111000, // 't'
    0b00_00000000011100, // 'u'
    0b00_10000000000100, // 'v'
    0b00_10100000010100, // 'w'
    0b00_10100011000000, // 'x'
    0b00_10000000001100, // 'y'
    0b00_00100001001000, // 'z'
    0b00_00100101001001, // '{'
    0b00_01001000000000, // '|'
    0b00_10010010001001, // '}'
    0b00_00010100100000, // '~'
    0b00_11111111111111, // DEL, fallback
];

/// Looks up the segment mask for a character code.
///
/// Codes outside 0-127 (including negative codes) resolve to the fallback glyph.
pub fn lookup(code: i32) -> u16 {
    usize::try_from(code)
        .ok()
        .and_then(|index| GLYPHS.get(index))
        .copied()
        .unwrap_or(GLYPHS[FALLBACK_CODE])
}

/// Returns the segment mask for a character.
pub fn glyph(ch: char) -> u16 {
    if !ch.is_ascii() {
        debug!("No glyph for {:?} (U+{:04X}), using fallback", ch, ch as u32);
        return GLYPHS[FALLBACK_CODE];
    }
    GLYPHS[ch as usize]
}

/// Search order for reverse lookups: alphanumerics win over punctuation
/// that happens to share the same segment pattern.
const REVERSE_ORDER: &str =
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz -_=+*/\\!?\"#$%&'()<>[]{}|,:;@^`~";

/// Finds a printable character whose glyph matches `mask` exactly.
///
/// The decimal point bit must already be stripped by the caller.
pub fn character_for(mask: u16) -> Option<char> {
    REVERSE_ORDER.chars().find(|&ch| glyph(ch) == mask)
}
