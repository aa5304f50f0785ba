//! An in-memory backend where bytes sent to an output come back on every input of the same name.

use super::{Backend, ByteCallback, DeviceInfo, InputDriver, OutputDriver};
use crate::prelude::*;
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

const DEFAULT_DEVICE: &str = "loopback";

struct LoopInput {
    closed: AtomicBool,
    callback_driven: AtomicBool,
    buffer: Mutex<Vec<u8>>,
    callback: Mutex<Option<ByteCallback>>,
}
impl LoopInput {
    fn deliver(&self, bytes: &[u8]) {
        self.buffer.lock().extend_from_slice(bytes);
        if !self.callback_driven.load(Ordering::Acquire) {
            return;
        }
        //Whoever holds the callback drains the buffer, including bytes sent from inside the
        //callback itself
        loop {
            let mut callback = match self.callback.lock().take() {
                Some(callback) => callback,
                None => return,
            };
            let chunk = mem::take(&mut *self.buffer.lock());
            if !chunk.is_empty() && !self.closed.load(Ordering::Acquire) {
                callback(&chunk);
            }
            *self.callback.lock() = Some(callback);
            if self.buffer.lock().is_empty() {
                return;
            }
        }
    }
}

#[derive(Default)]
struct Device {
    inputs: Mutex<Vec<Arc<LoopInput>>>,
}

/// A backend of named in-memory devices.
///
/// Opening a name that does not exist yet creates it. Bytes sent to an output are delivered to
/// every input open on the same name, either through the input's callback on the sending thread
/// or into a buffer read by polling.
#[derive(Clone, Default)]
pub struct LoopbackBackend {
    devices: Arc<Mutex<BTreeMap<String, Arc<Device>>>>,
    polling: bool,
}
impl LoopbackBackend {
    /// A backend whose inputs are callback-driven.
    pub fn new() -> LoopbackBackend {
        LoopbackBackend::default()
    }

    /// A backend whose inputs only support polling.
    pub fn polling() -> LoopbackBackend {
        LoopbackBackend {
            polling: true,
            ..LoopbackBackend::default()
        }
    }

    fn device(&self, name: Option<&str>) -> Arc<Device> {
        let name = name.unwrap_or(DEFAULT_DEVICE);
        self.devices
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
impl Backend for LoopbackBackend {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(self
            .devices
            .lock()
            .keys()
            .map(|name| DeviceInfo {
                name: name.clone(),
                is_input: true,
                is_output: true,
            })
            .collect())
    }

    fn open_input(&self, name: Option<&str>) -> Result<Box<dyn InputDriver>> {
        let device = self.device(name);
        let input = Arc::new(LoopInput {
            closed: AtomicBool::new(false),
            callback_driven: AtomicBool::new(false),
            buffer: Mutex::new(Vec::new()),
            callback: Mutex::new(None),
        });
        device.inputs.lock().push(input.clone());
        Ok(Box::new(LoopInputDriver {
            device,
            input,
            polling: self.polling,
        }))
    }

    fn open_output(&self, name: Option<&str>) -> Result<Box<dyn OutputDriver>> {
        Ok(Box::new(LoopOutputDriver {
            device: self.device(name),
            closed: AtomicBool::new(false),
        }))
    }
}

struct LoopInputDriver {
    device: Arc<Device>,
    input: Arc<LoopInput>,
    polling: bool,
}
impl InputDriver for LoopInputDriver {
    fn poll(&self) -> Result<Vec<u8>> {
        ensure!(!self.input.closed.load(Ordering::Acquire), Error::PortClosed);
        Ok(mem::take(&mut *self.input.buffer.lock()))
    }

    fn set_callback(&self, callback: ByteCallback) -> Result<bool> {
        if self.polling {
            return Ok(false);
        }
        *self.input.callback.lock() = Some(callback);
        self.input.callback_driven.store(true, Ordering::Release);
        //Hand over anything that arrived before the callback
        self.input.deliver(&[]);
        Ok(true)
    }

    fn close(&self) -> Result<()> {
        self.input.closed.store(true, Ordering::Release);
        self.device
            .inputs
            .lock()
            .retain(|input| !Arc::ptr_eq(input, &self.input));
        Ok(())
    }

    fn device_type(&self) -> Option<&str> {
        Some("loopback")
    }
}

struct LoopOutputDriver {
    device: Arc<Device>,
    closed: AtomicBool,
}
impl OutputDriver for LoopOutputDriver {
    fn send(&self, bytes: &[u8]) -> Result<()> {
        ensure!(!self.closed.load(Ordering::Acquire), Error::PortClosed);
        let inputs = self.device.inputs.lock().clone();
        for input in inputs {
            if !input.closed.load(Ordering::Acquire) {
                input.deliver(bytes);
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn device_type(&self) -> Option<&str> {
        Some("loopback")
    }
}
