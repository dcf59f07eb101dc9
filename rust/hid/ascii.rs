//! Forced ASCII conversion for device strings
//!
//! Device strings arrive from the backend as wide strings (sequences of
//! code points). They are narrowed to 7-bit ASCII: anything above 127 or
//! in the control range 1..=31 becomes `'?'`, everything else keeps its low
//! 7 bits. This is not a transliteration; `"café"` comes back as `"caf?"`.

/// Maximum number of characters kept from a device string.
pub const STRING_MAX_LEN: usize = 255;

/// Wide string as handed over by the backend.
pub type WideString = Vec<u32>;

/// Narrow a wide string to forced ASCII.
///
/// `None` is treated as the empty string. The input ends at the first 0
/// unit (if any) and at most [`STRING_MAX_LEN`] characters are converted.
pub fn forced_ascii(s: Option<&[u32]>) -> String {
    let Some(s) = s else {
        return String::new();
    };

    s.iter()
        .take_while(|&&wc| wc != 0)
        .take(STRING_MAX_LEN)
        .map(|&wc| {
            if wc > 127 || wc < 32 {
                '?'
            } else {
                char::from((wc & 0x7F) as u8)
            }
        })
        .collect()
}

/// Widen a Rust string into backend wide units.
pub fn widen(s: &str) -> WideString {
    s.chars().map(u32::from).collect()
}
