//! Receiving from and sending to several ports at once.

use super::{poll_interval, InputPort, OutputPort};
use crate::{message::Message, prelude::*};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::thread;
use tracing::warn;

/// Several input ports read as one.
///
/// Each round visits the open ports in a fresh random order and takes at most one message from
/// each, so a busy port cannot starve the others.
pub struct MultiInput {
    ports: Vec<InputPort>,
    rng: StdRng,
    ready: Vec<Message>,
}
impl MultiInput {
    pub fn new(ports: Vec<InputPort>) -> MultiInput {
        MultiInput::with_rng(ports, StdRng::from_entropy())
    }

    /// Use a fixed seed for the visiting order.
    pub fn with_seed(ports: Vec<InputPort>, seed: u64) -> MultiInput {
        MultiInput::with_rng(ports, StdRng::seed_from_u64(seed))
    }

    fn with_rng(ports: Vec<InputPort>, rng: StdRng) -> MultiInput {
        MultiInput {
            ports,
            rng,
            ready: Vec::new(),
        }
    }

    pub fn ports(&self) -> &[InputPort] {
        &self.ports
    }

    pub fn into_ports(self) -> Vec<InputPort> {
        self.ports
    }

    /// Whether every port is closed.
    pub fn is_closed(&self) -> bool {
        self.ports.iter().all(InputPort::is_closed)
    }

    /// Run one round over the open ports, queueing what they yield.
    fn round(&mut self) -> Result<()> {
        let mut order: Vec<usize> = (0..self.ports.len()).collect();
        order.shuffle(&mut self.rng);
        let mut found = Vec::new();
        for idx in order {
            let port = &self.ports[idx];
            if port.is_closed() {
                continue;
            }
            match port.poll() {
                Ok(Some(msg)) => found.push(msg),
                Ok(None) => {}
                Err(_) if port.is_closed() => {}
                Err(err) => {
                    //Keep what earlier ports already yielded
                    self.set_ready(found);
                    return Err(err);
                }
            }
        }
        self.set_ready(found);
        Ok(())
    }

    fn set_ready(&mut self, mut found: Vec<Message>) {
        //Popped from the back
        found.reverse();
        self.ready = found;
    }

    /// Receive a message from any port, without blocking.
    pub fn poll(&mut self) -> Result<Option<Message>> {
        if self.ready.is_empty() {
            self.round()?;
        }
        Ok(self.ready.pop())
    }

    /// Receive a message from any port.
    ///
    /// With `block`, waits until one arrives, failing with
    /// [`ErrorKind::PortClosed`](crate::ErrorKind::PortClosed) once every port is closed.
    pub fn receive(&mut self, block: bool) -> Result<Option<Message>> {
        loop {
            if let Some(msg) = self.poll()? {
                return Ok(Some(msg));
            }
            if !block {
                return Ok(None);
            }
            ensure!(!self.is_closed(), Error::PortClosed);
            thread::sleep(poll_interval());
        }
    }

    /// Iterate the messages pending on every port, without blocking.
    pub fn iter_pending(&mut self) -> impl Iterator<Item = Message> + '_ {
        std::iter::from_fn(move || self.poll().ok().flatten())
    }

    /// Close every port, reporting the first error.
    pub fn close(&self) -> Result<()> {
        let mut first = Ok(());
        for port in &self.ports {
            if let Err(err) = port.close() {
                if first.is_ok() {
                    first = Err(err);
                }
            }
        }
        first
    }
}

/// Drain the messages pending on a set of ports, tagged with the index of the port they came
/// from.
///
/// Ports are visited in rounds, one message per port per round, in a random order each round.
pub fn multi_receive(ports: &[InputPort]) -> Result<Vec<(usize, Message)>> {
    let mut rng = StdRng::from_entropy();
    let mut order: Vec<usize> = (0..ports.len()).collect();
    let mut out = Vec::new();
    loop {
        order.shuffle(&mut rng);
        let mut any = false;
        for &idx in &order {
            let port = &ports[idx];
            if port.is_closed() {
                continue;
            }
            if let Some(msg) = port.poll()? {
                out.push((idx, msg));
                any = true;
            }
        }
        if !any {
            return Ok(out);
        }
    }
}

/// Several output ports written as one.
pub struct MultiOutput {
    ports: Vec<OutputPort>,
}
impl MultiOutput {
    pub fn new(ports: Vec<OutputPort>) -> MultiOutput {
        MultiOutput { ports }
    }

    pub fn ports(&self) -> &[OutputPort] {
        &self.ports
    }

    pub fn into_ports(self) -> Vec<OutputPort> {
        self.ports
    }

    /// Send a message to every open port.
    ///
    /// Every port is attempted even if one fails. The first failure is returned and later ones are
    /// logged.
    pub fn send(&self, msg: &Message) -> Result<()> {
        let mut first = Ok(());
        for port in self.ports.iter().filter(|port| !port.is_closed()) {
            if let Err(err) = port.send(msg) {
                if first.is_ok() {
                    first = Err(err);
                } else {
                    warn!("failed to send to output port {:?}: {}", port.name(), err);
                }
            }
        }
        first
    }

    pub fn reset(&self) -> Result<()> {
        self.ports
            .iter()
            .filter(|port| !port.is_closed())
            .try_for_each(OutputPort::reset)
    }

    pub fn panic(&self) -> Result<()> {
        self.ports
            .iter()
            .filter(|port| !port.is_closed())
            .try_for_each(OutputPort::panic)
    }

    pub fn close(&self) -> Result<()> {
        let mut first = Ok(());
        for port in &self.ports {
            if let Err(err) = port.close() {
                if first.is_ok() {
                    first = Err(err);
                }
            }
        }
        first
    }
}
