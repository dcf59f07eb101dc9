//! Test doubles for the native backend.

use crate::hid::backend::{fit_to_buffer, DeviceList, HidHandle, RawDeviceInfo};
use crate::hid::{widen, HidError, Result, WideString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Native call recorded by [`FakeHandle`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Write(Vec<u8>),
    Read(usize),
    ReadTimeout(usize, i32),
    SetNonblocking(bool),
    Manufacturer(usize),
    Product(usize),
    SerialNumber(usize),
    Indexed(i32, usize),
    SendFeature(Vec<u8>),
    GetFeature(Vec<u8>),
}

/// Shared view into a fake: the calls it saw and how often it was released.
#[derive(Clone, Default)]
pub struct Probe {
    calls: Arc<Mutex<Vec<Call>>>,
    releases: Arc<AtomicUsize>,
}

impl Probe {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Scriptable device handle.
pub struct FakeHandle {
    probe: Probe,
    /// Bytes delivered by reads and feature report reads.
    pub incoming: Vec<u8>,
    /// When set, every call fails with this message.
    pub fail_with: Option<&'static str>,
    pub strings: [Option<&'static str>; 3],
    /// How long each read blocks.
    pub latency: Duration,
    last_error: Option<String>,
}

impl FakeHandle {
    pub fn new() -> (Self, Probe) {
        let probe = Probe::default();
        let handle = Self {
            probe: probe.clone(),
            incoming: Vec::new(),
            fail_with: None,
            strings: [None, None, None],
            latency: Duration::ZERO,
            last_error: None,
        };
        (handle, probe)
    }

    fn outcome<T>(&mut self, value: T) -> Result<T> {
        match self.fail_with {
            Some(msg) => {
                self.last_error = Some(msg.to_string());
                Err(HidError::ProtocolError(msg.to_string()))
            }
            None => {
                self.last_error = None;
                Ok(value)
            }
        }
    }

    fn fill(&mut self, buf: &mut [u8]) -> usize {
        let n = self.incoming.len().min(buf.len());
        buf[..n].copy_from_slice(&self.incoming[..n]);
        n
    }

    fn string(&mut self, slot: usize, max_len: usize) -> Result<WideString> {
        let s = self.strings[slot]
            .map(widen)
            .ok_or(HidError::StringUnavailable("fake"))?;
        self.outcome(fit_to_buffer(s, max_len))
    }
}

impl HidHandle for FakeHandle {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.probe.record(Call::Write(data.to_vec()));
        self.outcome(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.probe.record(Call::Read(buf.len()));
        std::thread::sleep(self.latency);
        let n = self.fill(buf);
        self.outcome(n)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        self.probe.record(Call::ReadTimeout(buf.len(), timeout_ms));
        std::thread::sleep(self.latency);
        let n = self.fill(buf);
        self.outcome(n)
    }

    fn set_nonblocking(&mut self, nonblock: bool) -> Result<()> {
        self.probe.record(Call::SetNonblocking(nonblock));
        self.outcome(())
    }

    fn manufacturer_string(&mut self, max_len: usize) -> Result<WideString> {
        self.probe.record(Call::Manufacturer(max_len));
        self.string(0, max_len)
    }

    fn product_string(&mut self, max_len: usize) -> Result<WideString> {
        self.probe.record(Call::Product(max_len));
        self.string(1, max_len)
    }

    fn serial_number_string(&mut self, max_len: usize) -> Result<WideString> {
        self.probe.record(Call::SerialNumber(max_len));
        self.string(2, max_len)
    }

    fn indexed_string(&mut self, index: i32, max_len: usize) -> Result<WideString> {
        self.probe.record(Call::Indexed(index, max_len));
        let s = widen(&format!("String #{index}"));
        self.outcome(fit_to_buffer(s, max_len))
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<usize> {
        self.probe.record(Call::SendFeature(data.to_vec()));
        self.outcome(data.len())
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.probe.record(Call::GetFeature(buf.to_vec()));
        // Report id stays in byte 0, payload follows.
        let n = self.incoming.len().min(buf.len().saturating_sub(1));
        buf[1..1 + n].copy_from_slice(&self.incoming[..n]);
        self.outcome(n + 1)
    }

    fn last_error(&self) -> Option<WideString> {
        self.last_error.as_deref().map(widen)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scan result that counts its releases.
pub struct FakeList {
    entries: Vec<RawDeviceInfo>,
    releases: Arc<AtomicUsize>,
}

impl FakeList {
    pub fn new(entries: Vec<RawDeviceInfo>) -> (Self, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let list = Self {
            entries,
            releases: releases.clone(),
        };
        (list, releases)
    }
}

impl DeviceList for FakeList {
    fn entry(&self, index: usize) -> Option<&RawDeviceInfo> {
        self.entries.get(index)
    }
}

impl Drop for FakeList {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Descriptor with recognizable field values.
pub fn raw_info(product_id: u16) -> RawDeviceInfo {
    RawDeviceInfo {
        path: format!("001:{product_id:03}:00:1532:{product_id:04x}").into_bytes(),
        vendor_id: 0x1532,
        product_id,
        serial_number: Some(widen("SN-\u{e9}01")),
        release_number: 0x0200,
        manufacturer_string: Some(widen("Razer")),
        product_string: None,
        usage_page: 0x01,
        usage: 0x06,
        interface_number: 0,
    }
}
