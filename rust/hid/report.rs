//! Report buffer framing
//!
//! Every report that crosses into the backend carries its report id in
//! byte 0, followed by the payload:
//!   0      - Report ID (0 for devices with a single report)
//!   1..    - Report data

/// Build a transmit buffer: report id followed by the payload.
#[inline]
pub fn frame_report(report_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 1);
    buf.push(report_id);
    buf.extend_from_slice(payload);
    buf
}

/// Build a feature report receive buffer for `size` payload bytes.
///
/// The backend uses byte 0 to select the report, so it is pre-filled.
#[inline]
pub fn feature_buffer(feature_id: u8, size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size + 1];
    buf[0] = feature_id;
    buf
}

/// Keep only the bytes the backend reported as received.
#[inline]
pub fn received(mut buf: Vec<u8>, len: usize) -> Vec<u8> {
    buf.truncate(len);
    buf
}
