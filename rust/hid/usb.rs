//! HID backend on top of nusb
//!
//! Devices are addressed by a `bus:address:interface:vid:pid` path. Opening a
//! device claims its HID interface (detaching the kernel driver on Linux);
//! reports then travel over the interface's interrupt endpoints and HID
//! class control requests.

use crate::config::UsbConfig;
use crate::hid::backend::{fit_to_buffer, DeviceList, HidApi, HidHandle, RawDeviceInfo};
use crate::hid::descriptor::{first_language, primary_usage, string_units, LANGUAGE_ID_EN_US};
use crate::hid::{widen, HidError, Result, WideString};
use nusb::descriptors::{ConfigurationDescriptor, TransferType};
use nusb::transfer::{
    Buffer, ControlIn, ControlOut, ControlType, Direction, In, Interrupt, Out, Recipient,
    TransferError,
};
use nusb::{Endpoint, MaybeFuture};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, trace};

// HID class requests
const HID_GET_REPORT: u8 = 0x01;
const HID_SET_REPORT: u8 = 0x09;

// Report types (in high byte of wValue)
const HID_REPORT_TYPE_OUTPUT: u16 = 0x02;
const HID_REPORT_TYPE_FEATURE: u16 = 0x03;

// Standard GET_DESCRIPTOR and descriptor types (in high byte of wValue)
const USB_GET_DESCRIPTOR: u8 = 0x06;
const DESCRIPTOR_TYPE_STRING: u16 = 0x03;
const DESCRIPTOR_TYPE_HID_REPORT: u16 = 0x22;

const USB_CLASS_HID: u8 = 0x03;

const REPORT_DESCRIPTOR_MAX_LEN: u16 = 4096;
const STRING_DESCRIPTOR_MAX_LEN: u16 = 255;

/// Location of a HID interface, rendered as `BBB:AAA:II:VVVV:PPPP`.
///
/// The ids pin the path to one device: bus numbers are not available
/// everywhere, and addresses get reused after a replug.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DevicePath {
    pub bus: u8,
    pub address: u8,
    pub interface: u8,
    pub vendor_id: u16,
    pub product_id: u16,
}

#[cfg(target_os = "linux")]
fn bus_of(dev: &nusb::DeviceInfo) -> u8 {
    dev.busnum()
}

#[cfg(not(target_os = "linux"))]
fn bus_of(_dev: &nusb::DeviceInfo) -> u8 {
    0 // Not available on non-Linux
}

impl DevicePath {
    pub fn of(dev: &nusb::DeviceInfo, interface: u8) -> Self {
        Self {
            bus: bus_of(dev),
            address: dev.device_address(),
            interface,
            vendor_id: dev.vendor_id(),
            product_id: dev.product_id(),
        }
    }

    pub fn parse(path: &[u8]) -> Result<Self> {
        let invalid = || HidError::InvalidPath(String::from_utf8_lossy(path).into_owned());

        let text = std::str::from_utf8(path).map_err(|_| invalid())?;
        let fields: Vec<&str> = text.split(':').collect();
        let [bus, address, interface, vendor_id, product_id] = fields[..] else {
            return Err(invalid());
        };

        let decimal = |field: &str| field.parse::<u8>().map_err(|_| invalid());
        let hex = |field: &str| u16::from_str_radix(field, 16).map_err(|_| invalid());
        Ok(Self {
            bus: decimal(bus)?,
            address: decimal(address)?,
            interface: decimal(interface)?,
            vendor_id: hex(vendor_id)?,
            product_id: hex(product_id)?,
        })
    }

    fn matches(&self, dev: &nusb::DeviceInfo) -> bool {
        self.matches_location(
            bus_of(dev),
            dev.device_address(),
            dev.vendor_id(),
            dev.product_id(),
        )
    }

    fn matches_location(&self, bus: u8, address: u8, vendor_id: u16, product_id: u16) -> bool {
        // Bus is always 0 off Linux
        (cfg!(not(target_os = "linux")) || bus == self.bus)
            && address == self.address
            && vendor_id == self.vendor_id
            && product_id == self.product_id
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:03}:{:03}:{:02}:{:04x}:{:04x}",
            self.bus, self.address, self.interface, self.vendor_id, self.product_id
        )
    }
}

static BACKEND: OnceLock<UsbHidApi> = OnceLock::new();

/// The process-wide backend, configured from the environment on first use.
pub fn backend() -> &'static dyn HidApi {
    BACKEND.get_or_init(|| UsbHidApi::new(UsbConfig::from_env()))
}

/// Scan result held by an enumeration cursor.
struct UsbDeviceList(Vec<RawDeviceInfo>);

impl DeviceList for UsbDeviceList {
    fn entry(&self, index: usize) -> Option<&RawDeviceInfo> {
        self.0.get(index)
    }
}

impl Drop for UsbDeviceList {
    fn drop(&mut self) {
        trace!("freeing enumeration of {} devices", self.0.len());
    }
}

/// Process-wide nusb backend.
///
/// Transfers are driven by a current-thread tokio runtime. `init` creates
/// it (the first scan or open does so too); `exit` drops the library's
/// reference while open devices keep theirs.
pub struct UsbHidApi {
    config: UsbConfig,
    runtime: Mutex<Option<Arc<Runtime>>>,
}

impl UsbHidApi {
    pub fn new(config: UsbConfig) -> Self {
        Self {
            config,
            runtime: Mutex::new(None),
        }
    }

    fn runtime(&self) -> Result<Arc<Runtime>> {
        let mut slot = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rt) = slot.as_ref() {
            return Ok(rt.clone());
        }

        let rt = Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?,
        );
        *slot = Some(rt.clone());
        Ok(rt)
    }

    #[cfg(test)]
    fn is_initialized(&self) -> bool {
        self.runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn scan(&self, vendor_id: u16, product_id: u16) -> Result<Vec<RawDeviceInfo>> {
        let mut results = Vec::new();

        for dev_info in nusb::list_devices().wait()? {
            // 0 matches any id
            if vendor_id != 0 && dev_info.vendor_id() != vendor_id {
                continue;
            }
            if product_id != 0 && dev_info.product_id() != product_id {
                continue;
            }

            // Open device to get interface info
            let device: nusb::Device = match dev_info.open().wait() {
                Ok(d) => d,
                Err(err) => {
                    trace!(
                        "skipping {:04x}:{:04x}: {}",
                        dev_info.vendor_id(),
                        dev_info.product_id(),
                        err
                    );
                    continue;
                }
            };

            let config: ConfigurationDescriptor = match device.active_configuration() {
                Ok(c) => c,
                Err(_) => continue,
            };

            for iface in config.interfaces() {
                let iface_num = iface.interface_number();
                if iface.alt_settings().any(|alt| alt.class() == USB_CLASS_HID) {
                    let (usage_page, usage) = self.report_usage(&device, iface_num);
                    results.push(RawDeviceInfo {
                        path: DevicePath::of(&dev_info, iface_num).to_string().into_bytes(),
                        vendor_id: dev_info.vendor_id(),
                        product_id: dev_info.product_id(),
                        serial_number: dev_info.serial_number().map(widen),
                        release_number: dev_info.device_version(),
                        manufacturer_string: dev_info.manufacturer_string().map(widen),
                        product_string: dev_info.product_string().map(widen),
                        usage_page,
                        usage,
                        interface_number: iface_num as i32,
                    });
                }
            }
        }

        // Paths sort by bus, address, interface
        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }

    /// Top-level usage from the interface's report descriptor, or (0, 0).
    fn report_usage(&self, device: &nusb::Device, interface: u8) -> (u16, u16) {
        let request = ControlIn {
            control_type: ControlType::Standard,
            recipient: Recipient::Interface,
            request: USB_GET_DESCRIPTOR,
            value: DESCRIPTOR_TYPE_HID_REPORT << 8,
            index: interface as u16,
            length: REPORT_DESCRIPTOR_MAX_LEN,
        };

        match device
            .control_in(request, self.config.control_timeout)
            .wait()
        {
            Ok(desc) => primary_usage(&desc),
            Err(err) => {
                trace!("no report descriptor for interface {}: {}", interface, err);
                (0, 0)
            }
        }
    }
}

impl HidApi for UsbHidApi {
    fn init(&self) -> Result<()> {
        self.runtime().map(|_| ())
    }

    fn exit(&self) -> Result<()> {
        if let Some(rt) = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            trace!("releasing runtime ({} references)", Arc::strong_count(&rt));
        }
        Ok(())
    }

    fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn DeviceList>> {
        self.runtime()?;
        let devices = self.scan(vendor_id, product_id)?;
        debug!(
            "found {} HID interfaces for {:04x}:{:04x}",
            devices.len(),
            vendor_id,
            product_id
        );
        Ok(Box::new(UsbDeviceList(devices)))
    }

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Box<dyn HidHandle>> {
        let first = self
            .scan(vendor_id, product_id)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                HidError::DeviceNotFound(format!("{:04x}:{:04x}", vendor_id, product_id))
            })?;
        self.open_path(&first.path)
    }

    fn open_path(&self, path: &[u8]) -> Result<Box<dyn HidHandle>> {
        let path = DevicePath::parse(path)?;
        let runtime = self.runtime()?;

        let dev_info = nusb::list_devices()
            .wait()?
            .find(|d| path.matches(d))
            .ok_or_else(|| HidError::DeviceNotFound(path.to_string()))?;

        let device = dev_info.open().wait()?;
        // On Linux, detach kernel driver before claiming (e.g., usbhid)
        #[cfg(target_os = "linux")]
        let interface = device.detach_and_claim_interface(path.interface).wait()?;
        #[cfg(not(target_os = "linux"))]
        let interface = device.claim_interface(path.interface).wait()?;

        let handle = UsbHidHandle::new(runtime, self.config.clone(), &dev_info, interface)?;
        debug!("opened {}", path);
        Ok(Box::new(handle))
    }
}

/// USB resources of an open device.
struct UsbPipes {
    interface: nusb::Interface,
    ep_in: Option<Endpoint<Interrupt, In>>,
    ep_out: Option<Endpoint<Interrupt, Out>>,
}

impl UsbPipes {
    fn new(interface: nusb::Interface) -> Result<Self> {
        let (ep_in, ep_out) = find_endpoints(&interface);
        let ep_in = ep_in
            .map(|addr| interface.endpoint::<Interrupt, In>(addr))
            .transpose()?;
        let ep_out = ep_out
            .map(|addr| interface.endpoint::<Interrupt, Out>(addr))
            .transpose()?;

        Ok(Self {
            interface,
            ep_in,
            ep_out,
        })
    }

    fn interface_number(&self) -> u16 {
        self.interface.interface_number() as u16
    }
}

/// Find interrupt IN and OUT endpoint addresses of the claimed interface.
fn find_endpoints(interface: &nusb::Interface) -> (Option<u8>, Option<u8>) {
    let mut ep_in: Option<u8> = None;
    let mut ep_out: Option<u8> = None;

    for iface_desc in interface.descriptors() {
        for ep in iface_desc.endpoints() {
            if ep.transfer_type() == TransferType::Interrupt {
                let addr = ep.address();
                match ep.direction() {
                    Direction::In if ep_in.is_none() => ep_in = Some(addr),
                    Direction::Out if ep_out.is_none() => ep_out = Some(addr),
                    _ => {}
                }
            }
        }
    }

    (ep_in, ep_out)
}

/// Device strings captured from the descriptor when the device was opened.
#[derive(Clone, Debug, Default)]
struct DeviceStrings {
    manufacturer: Option<String>,
    product: Option<String>,
    serial_number: Option<String>,
}

/// An open HID interface.
pub struct UsbHidHandle {
    runtime: Arc<Runtime>,
    config: UsbConfig,
    pipes: tokio::sync::Mutex<UsbPipes>,
    strings: DeviceStrings,
    nonblocking: bool,
    last_error: Option<String>,
}

impl UsbHidHandle {
    fn new(
        runtime: Arc<Runtime>,
        config: UsbConfig,
        dev_info: &nusb::DeviceInfo,
        interface: nusb::Interface,
    ) -> Result<Self> {
        Ok(Self {
            runtime,
            config,
            pipes: tokio::sync::Mutex::new(UsbPipes::new(interface)?),
            strings: DeviceStrings {
                manufacturer: dev_info.manufacturer_string().map(str::to_string),
                product: dev_info.product_string().map(str::to_string),
                serial_number: dev_info.serial_number().map(str::to_string),
            },
            nonblocking: false,
            last_error: None,
        })
    }

    /// Remember the outcome of a call for `last_error`.
    fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        self.last_error = result.as_ref().err().map(|err| err.to_string());
        result
    }

    fn write_report(&mut self, data: &[u8]) -> Result<usize> {
        let (&report_id, payload) = data
            .split_first()
            .ok_or_else(|| HidError::ProtocolError("empty report".into()))?;
        // Report ID 0 means the device does not use numbered reports
        let wire = if report_id == 0 { payload } else { data };

        let pipes = self.pipes.get_mut();
        let index = pipes.interface_number();
        match pipes.ep_out.as_mut() {
            Some(ep) => {
                self.runtime
                    .block_on(write_interrupt(ep, wire, self.config.write_timeout))?;
            }
            None => {
                // No interrupt OUT endpoint: send an output report on the control pipe
                let request = ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: (HID_REPORT_TYPE_OUTPUT << 8) | (report_id as u16),
                    index,
                    data: wire,
                };
                let timeout = self.config.control_timeout;
                self.runtime
                    .block_on(async { pipes.interface.control_out(request, timeout).await })?;
            }
        }

        Ok(data.len())
    }

    fn read_report(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let ep = self
            .pipes
            .get_mut()
            .ep_in
            .as_mut()
            .ok_or_else(|| HidError::ProtocolError("no interrupt IN endpoint".into()))?;

        let Some(data) = self.runtime.block_on(read_interrupt(ep, timeout))? else {
            return Ok(0);
        };
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn send_feature(&mut self, data: &[u8]) -> Result<usize> {
        let (&report_id, payload) = data
            .split_first()
            .ok_or_else(|| HidError::ProtocolError("empty feature report".into()))?;
        let wire = if report_id == 0 { payload } else { data };

        let pipes = self.pipes.get_mut();
        // SET_REPORT: wValue = (report_type << 8) | report_id, wIndex = interface
        let request = ControlOut {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: HID_SET_REPORT,
            value: (HID_REPORT_TYPE_FEATURE << 8) | (report_id as u16),
            index: pipes.interface_number(),
            data: wire,
        };
        let timeout = self.config.control_timeout;
        self.runtime
            .block_on(async { pipes.interface.control_out(request, timeout).await })?;

        Ok(data.len())
    }

    fn get_feature(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(&report_id) = buf.first() else {
            return Err(HidError::ProtocolError("empty feature buffer".into()));
        };
        // Without numbered reports the payload lands after byte 0
        let skip = usize::from(report_id == 0);
        let capacity = buf.len() - skip;

        let pipes = self.pipes.get_mut();
        let request = ControlIn {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: HID_GET_REPORT,
            value: (HID_REPORT_TYPE_FEATURE << 8) | (report_id as u16),
            index: pipes.interface_number(),
            length: u16::try_from(capacity).unwrap_or(u16::MAX),
        };
        let timeout = self.config.control_timeout;
        let data = self
            .runtime
            .block_on(async { pipes.interface.control_in(request, timeout).await })?;

        let n = data.len().min(capacity);
        buf[skip..skip + n].copy_from_slice(&data[..n]);
        Ok(n + skip)
    }

    fn string_descriptor(&mut self, index: u8, language: u16) -> Result<Vec<u8>> {
        let pipes = self.pipes.get_mut();
        let request = ControlIn {
            control_type: ControlType::Standard,
            recipient: Recipient::Device,
            request: USB_GET_DESCRIPTOR,
            value: (DESCRIPTOR_TYPE_STRING << 8) | (index as u16),
            index: language,
            length: STRING_DESCRIPTOR_MAX_LEN,
        };
        let timeout = self.config.control_timeout;
        Ok(self
            .runtime
            .block_on(async { pipes.interface.control_in(request, timeout).await })?)
    }

    fn indexed(&mut self, index: i32, max_len: usize) -> Result<WideString> {
        let index = u8::try_from(index)
            .map_err(|_| HidError::ProtocolError(format!("invalid string index {}", index)))?;
        let languages = self.string_descriptor(0, 0)?;
        let language = first_language(&languages).unwrap_or(LANGUAGE_ID_EN_US);
        let raw = self.string_descriptor(index, language)?;
        Ok(fit_to_buffer(string_units(&raw)?, max_len))
    }

    fn captured(value: Option<&str>, name: &'static str, max_len: usize) -> Result<WideString> {
        value
            .map(|s| fit_to_buffer(widen(s), max_len))
            .ok_or(HidError::StringUnavailable(name))
    }
}

fn transfer_error(err: TransferError) -> HidError {
    match err {
        TransferError::Disconnected => HidError::Disconnected,
        other => HidError::TransferError(other),
    }
}

async fn write_interrupt(
    ep: &mut Endpoint<Interrupt, Out>,
    data: &[u8],
    timeout: Duration,
) -> Result<()> {
    ep.submit(Buffer::from(data.to_vec()));

    let completion = match tokio::time::timeout(timeout, ep.next_complete()).await {
        Ok(completion) => completion,
        Err(_) => {
            ep.cancel_all();
            let _cancelled = ep.next_complete().await;
            return Err(HidError::ProtocolError("Interrupt write timeout".into()));
        }
    };
    completion.status.map_err(transfer_error)?;
    Ok(())
}

/// Wait for the next input report. `None` timeout waits indefinitely; an
/// expired timeout yields `Ok(None)` and leaves the transfer queued for the
/// next read.
async fn read_interrupt(
    ep: &mut Endpoint<Interrupt, In>,
    timeout: Option<Duration>,
) -> Result<Option<Vec<u8>>> {
    if ep.pending() == 0 {
        let size = ep.max_packet_size();
        let mut buffer = ep.allocate(size);
        buffer.set_requested_len(size);
        ep.submit(buffer);
    }

    let completion = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, ep.next_complete()).await {
            Ok(completion) => completion,
            Err(_) => return Ok(None),
        },
        None => ep.next_complete().await,
    };

    completion.status.map_err(transfer_error)?;
    Ok(Some(completion.buffer.into_vec()))
}

impl HidHandle for UsbHidHandle {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let result = self.write_report(data);
        self.record(result)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let timeout = self.nonblocking.then_some(Duration::ZERO);
        let result = self.read_report(buf, timeout);
        self.record(result)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        // Negative timeouts block
        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        let result = self.read_report(buf, timeout);
        self.record(result)
    }

    fn set_nonblocking(&mut self, nonblock: bool) -> Result<()> {
        self.nonblocking = nonblock;
        self.record(Ok(()))
    }

    fn manufacturer_string(&mut self, max_len: usize) -> Result<WideString> {
        let result = Self::captured(
            self.strings.manufacturer.as_deref(),
            "manufacturer",
            max_len,
        );
        self.record(result)
    }

    fn product_string(&mut self, max_len: usize) -> Result<WideString> {
        let result = Self::captured(self.strings.product.as_deref(), "product", max_len);
        self.record(result)
    }

    fn serial_number_string(&mut self, max_len: usize) -> Result<WideString> {
        let result = Self::captured(
            self.strings.serial_number.as_deref(),
            "serial number",
            max_len,
        );
        self.record(result)
    }

    fn indexed_string(&mut self, index: i32, max_len: usize) -> Result<WideString> {
        let result = self.indexed(index, max_len);
        self.record(result)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<usize> {
        let result = self.send_feature(data);
        self.record(result)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        let result = self.get_feature(buf);
        self.record(result)
    }

    fn last_error(&self) -> Option<WideString> {
        self.last_error.as_deref().map(widen)
    }
}

impl Drop for UsbHidHandle {
    fn drop(&mut self) {
        trace!(
            "closing interface {}",
            self.pipes.get_mut().interface_number()
        );
    }
}
