//! Abstract MIDI ports on top of pluggable drivers.
//!
//! A [`Backend`] opens drivers, which move raw bytes in and out of some MIDI system. The port
//! types here add everything else: parsing of incoming bytes, a message queue, blocking receive,
//! locking, and reset on close.
//!
//! Every port operation takes the port's re-entrant lock, so a callback running on a driver thread
//! may call back into the same port. Blocking receives do not hold the lock while waiting: they
//! poll every [`poll_interval`] and notice a close from another thread within one interval.

mod loopback;
mod multi;

pub use self::{
    loopback::LoopbackBackend,
    multi::{multi_receive, MultiInput, MultiOutput},
};

use crate::{
    message::{Message, MessageKind},
    parser::Parser,
    prelude::*,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::ReentrantMutex;
use std::{
    cell::RefCell,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Weak,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

static POLL_INTERVAL_MICROS: AtomicU64 = AtomicU64::new(1_000);

/// Set how long blocking operations sleep between polls. Defaults to 1 ms.
pub fn set_poll_interval(interval: Duration) {
    POLL_INTERVAL_MICROS.store(interval.as_micros().max(1) as u64, Ordering::Relaxed);
}

/// How long blocking operations sleep between polls.
pub fn poll_interval() -> Duration {
    Duration::from_micros(POLL_INTERVAL_MICROS.load(Ordering::Relaxed))
}

/// A function receiving raw bytes from a driver.
pub type ByteCallback = Box<dyn FnMut(&[u8]) + Send>;

/// A function receiving parsed messages from an input port.
pub type Callback = Box<dyn FnMut(Message) + Send>;

/// A device as listed by a backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
}

/// The input half of a driver.
///
/// Bytes may arrive in arbitrary fragments; the port reassembles messages.
pub trait InputDriver: Send + Sync {
    /// Return any bytes received since the last call, without blocking.
    fn poll(&self) -> Result<Vec<u8>>;

    /// Install a callback to be called with incoming bytes instead of buffering them.
    ///
    /// Returns `false` if the driver only supports polling.
    fn set_callback(&self, _callback: ByteCallback) -> Result<bool> {
        Ok(false)
    }

    fn close(&self) -> Result<()>;

    /// A short description of the driver for diagnostics.
    fn device_type(&self) -> Option<&str> {
        None
    }
}

/// The output half of a driver.
pub trait OutputDriver: Send + Sync {
    /// Send the exact wire bytes of one message.
    fn send(&self, bytes: &[u8]) -> Result<()>;

    fn close(&self) -> Result<()>;

    fn device_type(&self) -> Option<&str> {
        None
    }
}

/// A MIDI system able to list devices and open drivers on them.
///
/// A `None` name opens the default device.
pub trait Backend {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>>;
    fn open_input(&self, name: Option<&str>) -> Result<Box<dyn InputDriver>>;
    fn open_output(&self, name: Option<&str>) -> Result<Box<dyn OutputDriver>>;
}

/// Seconds since the unix epoch, used to stamp incoming messages.
fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

struct InputState {
    parser: Parser,
    callback: Option<Callback>,
    /// Bumped on every callback change, so a callback taken out for a call is not put back over
    /// its replacement.
    callback_epoch: u64,
}

struct InputShared {
    name: Option<String>,
    closed: AtomicBool,
    callback_driven: AtomicBool,
    driver: Box<dyn InputDriver>,
    state: ReentrantMutex<RefCell<InputState>>,
    queue_tx: Sender<Message>,
    queue_rx: Receiver<Message>,
}
impl InputShared {
    /// Parse incoming bytes and hand the messages to the callback or the queue.
    fn deliver(&self, bytes: &[u8]) {
        let guard = self.state.lock();
        let msgs: Vec<Message> = {
            let mut state = guard.borrow_mut();
            state.parser.feed(bytes);
            let now = wall_clock();
            state
                .parser
                .iter_pending()
                .map(|msg| msg.with_time(now))
                .collect()
        };
        for msg in msgs {
            let (callback, epoch) = {
                let mut state = guard.borrow_mut();
                (state.callback.take(), state.callback_epoch)
            };
            match callback {
                Some(mut callback) => {
                    callback(msg);
                    let mut state = guard.borrow_mut();
                    if state.callback_epoch == epoch {
                        state.callback = Some(callback);
                    }
                }
                None => {
                    //Both channel ends live in `self`, so this never fails
                    let _ = self.queue_tx.send(msg);
                }
            }
        }
    }
}

/// A port receiving MIDI messages.
///
/// Closed automatically when dropped.
pub struct InputPort {
    shared: Arc<InputShared>,
}
impl InputPort {
    /// Open an input on a backend.
    pub fn open(backend: &dyn Backend, name: Option<&str>) -> Result<InputPort> {
        let driver = backend.open_input(name)?;
        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(InputShared {
            name: name.map(str::to_string),
            closed: AtomicBool::new(false),
            callback_driven: AtomicBool::new(false),
            driver,
            state: ReentrantMutex::new(RefCell::new(InputState {
                parser: Parser::new(),
                callback: None,
                callback_epoch: 0,
            })),
            queue_tx,
            queue_rx,
        });
        let weak: Weak<InputShared> = Arc::downgrade(&shared);
        let driven = shared.driver.set_callback(Box::new(move |bytes: &[u8]| {
            if let Some(shared) = weak.upgrade() {
                if !shared.closed.load(Ordering::Acquire) {
                    shared.deliver(bytes);
                }
            }
        }))?;
        shared.callback_driven.store(driven, Ordering::Release);
        debug!(
            "opened input port {:?} ({})",
            shared.name,
            if driven { "callback" } else { "polling" }
        );
        Ok(InputPort { shared })
    }

    pub fn name(&self) -> Option<&str> {
        self.shared.name.as_deref()
    }

    pub fn device_type(&self) -> Option<&str> {
        self.shared.driver.device_type()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Pull pending bytes out of a polling driver into the queue.
    fn refill(&self) -> Result<()> {
        if !self.shared.callback_driven.load(Ordering::Acquire) {
            let bytes = self.shared.driver.poll()?;
            if !bytes.is_empty() {
                self.shared.deliver(&bytes);
            }
        }
        Ok(())
    }

    /// Receive the next message.
    ///
    /// With `block`, waits until a message arrives and fails with
    /// [`ErrorKind::PortClosed`](crate::ErrorKind::PortClosed) if the port is closed meanwhile.
    /// Without it, returns `None` right away when nothing is pending.
    pub fn receive(&self, block: bool) -> Result<Option<Message>> {
        loop {
            ensure!(!self.is_closed(), Error::PortClosed);
            {
                let _guard = self.shared.state.lock();
                if let Ok(msg) = self.shared.queue_rx.try_recv() {
                    return Ok(Some(msg));
                }
                self.refill()?;
                if let Ok(msg) = self.shared.queue_rx.try_recv() {
                    return Ok(Some(msg));
                }
            }
            if !block {
                return Ok(None);
            }
            match self.shared.queue_rx.recv_timeout(poll_interval()) {
                Ok(msg) if !self.is_closed() => return Ok(Some(msg)),
                Ok(_) => bail!(Error::PortClosed),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => bail!(Error::PortClosed),
            }
        }
    }

    /// Receive a message if one is pending.
    #[inline]
    pub fn poll(&self) -> Result<Option<Message>> {
        self.receive(false)
    }

    /// Iterate messages as they arrive, blocking in between.
    ///
    /// Iteration ends without an error when the port is closed.
    pub fn iter(&self) -> impl Iterator<Item = Result<Message>> + '_ {
        std::iter::from_fn(move || match self.receive(true) {
            Ok(msg) => msg.map(Ok),
            Err(_) if self.is_closed() => None,
            Err(err) => Some(Err(err)),
        })
    }

    /// Iterate the messages that are already pending, without blocking.
    pub fn iter_pending(&self) -> impl Iterator<Item = Message> + '_ {
        std::iter::from_fn(move || self.poll().ok().flatten())
    }

    /// Install or remove a callback receiving every incoming message instead of the queue.
    ///
    /// Only possible on callback-driven drivers. Returns once any callback call in flight on
    /// another thread has finished.
    pub fn set_callback(&self, callback: Option<Callback>) -> Result<()> {
        ensure!(!self.is_closed(), Error::PortClosed);
        ensure!(
            callback.is_none() || self.shared.callback_driven.load(Ordering::Acquire),
            Error::value("this driver does not support callbacks")
        );
        let guard = self.shared.state.lock();
        let mut state = guard.borrow_mut();
        state.callback = callback;
        state.callback_epoch += 1;
        Ok(())
    }

    /// Close the port. Closing an already closed port does nothing.
    pub fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let guard = self.shared.state.lock();
        {
            let mut state = guard.borrow_mut();
            state.callback = None;
            state.callback_epoch += 1;
        }
        debug!("closing input port {:?}", self.shared.name);
        self.shared.driver.close()
    }
}
impl Drop for InputPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
impl fmt::Debug for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("InputPort")
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A port sending MIDI messages.
///
/// Closed automatically when dropped. With `autoreset`, closing first silences every channel.
pub struct OutputPort {
    name: Option<String>,
    device_type: Option<String>,
    closed: AtomicBool,
    autoreset: bool,
    driver: ReentrantMutex<Box<dyn OutputDriver>>,
}
impl OutputPort {
    /// Open an output on a backend.
    pub fn open(backend: &dyn Backend, name: Option<&str>, autoreset: bool) -> Result<OutputPort> {
        let driver = backend.open_output(name)?;
        debug!("opened output port {:?}", name);
        Ok(OutputPort {
            name: name.map(str::to_string),
            device_type: driver.device_type().map(str::to_string),
            closed: AtomicBool::new(false),
            autoreset,
            driver: ReentrantMutex::new(driver),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The driver's description, as reported when the port was opened.
    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a message.
    pub fn send(&self, msg: &Message) -> Result<()> {
        ensure!(!self.is_closed(), Error::PortClosed);
        let bytes = msg.bytes();
        self.driver.lock().send(&bytes)
    }

    fn send_to_all_channels(&self, control: u8) -> Result<()> {
        let driver = self.driver.lock();
        for channel in 0..16 {
            let msg = Message::from_valid(
                MessageKind::ControlChange {
                    channel,
                    control,
                    value: 0,
                },
                0.0,
            );
            driver.send(&msg.bytes())?;
        }
        Ok(())
    }

    /// Send "All Notes Off" and "Reset All Controllers" on every channel.
    pub fn reset(&self) -> Result<()> {
        ensure!(!self.is_closed(), Error::PortClosed);
        self.send_to_all_channels(123)?;
        self.send_to_all_channels(121)
    }

    /// Send "All Sounds Off" on every channel.
    ///
    /// Stops all sound right away, including notes still in their release phase.
    pub fn panic(&self) -> Result<()> {
        ensure!(!self.is_closed(), Error::PortClosed);
        self.send_to_all_channels(120)
    }

    /// Close the port. Closing an already closed port does nothing.
    pub fn close(&self) -> Result<()> {
        let driver = self.driver.lock();
        if self.is_closed() {
            return Ok(());
        }
        let reset = if self.autoreset { self.reset() } else { Ok(()) };
        self.closed.store(true, Ordering::Release);
        debug!("closing output port {:?}", self.name);
        let closed = driver.close();
        reset.and(closed)
    }
}
impl Drop for OutputPort {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
impl fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OutputPort")
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .field("autoreset", &self.autoreset)
            .finish()
    }
}

/// An input and an output opened under one name.
#[derive(Debug)]
pub struct IoPort {
    pub input: InputPort,
    pub output: OutputPort,
}
impl IoPort {
    pub fn open(backend: &dyn Backend, name: Option<&str>, autoreset: bool) -> Result<IoPort> {
        let input = InputPort::open(backend, name)?;
        let output = OutputPort::open(backend, name, autoreset)?;
        Ok(IoPort { input, output })
    }

    pub fn name(&self) -> Option<&str> {
        self.input.name()
    }

    pub fn is_closed(&self) -> bool {
        self.input.is_closed() && self.output.is_closed()
    }

    #[inline]
    pub fn send(&self, msg: &Message) -> Result<()> {
        self.output.send(msg)
    }

    #[inline]
    pub fn receive(&self, block: bool) -> Result<Option<Message>> {
        self.input.receive(block)
    }

    #[inline]
    pub fn poll(&self) -> Result<Option<Message>> {
        self.input.poll()
    }

    pub fn iter_pending(&self) -> impl Iterator<Item = Message> + '_ {
        self.input.iter_pending()
    }

    /// Close both halves, reporting the first error.
    pub fn close(&self) -> Result<()> {
        let input = self.input.close();
        let output = self.output.close();
        input.and(output)
    }
}
