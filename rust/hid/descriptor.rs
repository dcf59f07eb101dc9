//! USB/HID descriptor decoding
//!
//! Only what the backend needs: the top-level usage of a HID report
//! descriptor and the payload of USB string descriptors.

use crate::hid::{HidError, Result, WideString};

// Item prefixes (tag and type bits, size bits masked off)
const ITEM_USAGE_PAGE: u8 = 0x04;
const ITEM_USAGE: u8 = 0x08;
const ITEM_LONG: u8 = 0xFE;

const DESCRIPTOR_TYPE_STRING: u8 = 0x03;

/// English (United States), used when a device lists no languages.
pub const LANGUAGE_ID_EN_US: u16 = 0x0409;

/// Find the first Usage Page and Usage items of a report descriptor.
///
/// Returns `(usage_page, usage)`; a value missing from the descriptor is 0.
pub fn primary_usage(desc: &[u8]) -> (u16, u16) {
    let mut usage_page = None;
    let mut usage = None;
    let mut i = 0;

    while i < desc.len() && (usage_page.is_none() || usage.is_none()) {
        let prefix = desc[i];

        if prefix == ITEM_LONG {
            // Long item: bDataSize follows the prefix, then bLongItemTag
            let Some(&size) = desc.get(i + 1) else { break };
            i += 3 + size as usize;
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let Some(data) = desc.get(i + 1..i + 1 + size) else {
            break;
        };
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        match prefix & 0xFC {
            ITEM_USAGE_PAGE if usage_page.is_none() => usage_page = Some(value as u16),
            ITEM_USAGE if usage.is_none() => usage = Some(value as u16),
            _ => {}
        }

        i += 1 + size;
    }

    (usage_page.unwrap_or(0), usage.unwrap_or(0))
}

/// Check a raw string descriptor and return its payload.
fn string_payload(raw: &[u8]) -> Result<&[u8]> {
    if raw.len() < 2 || raw[1] != DESCRIPTOR_TYPE_STRING {
        return Err(HidError::ProtocolError(
            "malformed string descriptor".into(),
        ));
    }
    let len = (raw[0] as usize).min(raw.len());
    Ok(raw.get(2..len).unwrap_or(&[]))
}

/// Decode a string descriptor into code points.
///
/// Surrogate pairs are combined; unpaired surrogates become U+FFFD.
pub fn string_units(raw: &[u8]) -> Result<WideString> {
    let units = string_payload(raw)?
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    Ok(char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER) as u32)
        .collect())
}

/// First language id advertised by string descriptor 0.
pub fn first_language(raw: &[u8]) -> Option<u16> {
    let payload = string_payload(raw).ok()?;
    payload
        .chunks_exact(2)
        .next()
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
}
