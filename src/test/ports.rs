//! Ports, multi-ports and the loopback backend.

use super::init_logging;
use crate::{
    ports::{
        multi_receive, poll_interval, set_poll_interval, Backend, DeviceInfo, InputDriver,
        InputPort, IoPort, LoopbackBackend, MultiInput, MultiOutput, OutputDriver, OutputPort,
    },
    Error, ErrorKind, Message, Result,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc,
    },
    thread,
    time::{Duration, Instant},
};

fn same_message(got: &Message, sent: &Message) -> bool {
    got.kind() == sent.kind()
}

fn drain(port: &InputPort) -> Vec<Message> {
    port.iter_pending().collect()
}

#[test]
fn callback_driven_loopback() {
    init_logging();
    let backend = LoopbackBackend::new();
    let input = InputPort::open(&backend, Some("synth")).unwrap();
    let output = OutputPort::open(&backend, Some("synth"), false).unwrap();
    assert_eq!(input.device_type(), Some("loopback"));
    assert_eq!(output.device_type(), Some("loopback"));

    let sent = msg!("note_on channel=3 note=60 velocity=100");
    output.send(&sent).unwrap();
    let got = input.poll().unwrap().unwrap();
    assert!(same_message(&got, &sent));
    //Stamped with the wall clock, in seconds
    assert!(got.time() > 1e9);
    assert!(input.poll().unwrap().is_none());
}

#[test]
fn polling_loopback() {
    let backend = LoopbackBackend::polling();
    let input = InputPort::open(&backend, None).unwrap();
    let output = OutputPort::open(&backend, None, false).unwrap();

    for note in 0..5 {
        output.send(&Message::note_on(0, note, 1).unwrap()).unwrap();
    }
    output.send(&Message::sysex(vec![1, 2, 3]).unwrap()).unwrap();
    let got = drain(&input);
    assert_eq!(got.len(), 6);
    assert_eq!(got[4].get("note").unwrap().as_int(), Some(4));
    assert_eq!(got[5].type_name(), "sysex");

    let err = input.set_callback(Some(Box::new(|_| {}))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
}

#[test]
fn devices_are_separate() {
    let backend = LoopbackBackend::new();
    let a = InputPort::open(&backend, Some("a")).unwrap();
    let b = InputPort::open(&backend, Some("b")).unwrap();
    let a2 = InputPort::open(&backend, Some("a")).unwrap();
    let out = OutputPort::open(&backend, Some("a"), false).unwrap();
    out.send(&msg!("start")).unwrap();
    assert_eq!(drain(&a).len(), 1);
    assert_eq!(drain(&a2).len(), 1);
    assert!(drain(&b).is_empty());

    let names: Vec<String> = backend
        .list_devices()
        .unwrap()
        .into_iter()
        .map(|dev: DeviceInfo| dev.name)
        .collect();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn blocking_receive() {
    let backend = LoopbackBackend::new();
    let input = InputPort::open(&backend, Some("x")).unwrap();
    let output = OutputPort::open(&backend, Some("x"), false).unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            output.send(&msg!("continue")).unwrap();
        });
        let got = input.receive(true).unwrap().unwrap();
        assert_eq!(got.type_name(), "continue");
    });
    assert!(input.receive(false).unwrap().is_none());
}

#[test]
fn close_during_receive() {
    init_logging();
    set_poll_interval(Duration::from_millis(1));
    assert_eq!(poll_interval(), Duration::from_millis(1));

    for backend in [LoopbackBackend::new(), LoopbackBackend::polling()] {
        let input = InputPort::open(&backend, Some("x")).unwrap();
        thread::scope(|s| {
            let waiter = s.spawn(|| input.receive(true));
            thread::sleep(Duration::from_millis(30));
            let closed_at = Instant::now();
            input.close().unwrap();
            let res = waiter.join().unwrap();
            assert!(closed_at.elapsed() < Duration::from_secs(1));
            assert_eq!(res.unwrap_err().kind(), ErrorKind::PortClosed);
        });
        assert!(input.is_closed());
        assert_eq!(input.poll().unwrap_err().kind(), ErrorKind::PortClosed);
        input.close().unwrap();
    }
}

#[test]
fn close_ends_iteration() {
    let backend = LoopbackBackend::new();
    let input = InputPort::open(&backend, Some("x")).unwrap();
    let output = OutputPort::open(&backend, Some("x"), false).unwrap();
    output.send(&msg!("stop")).unwrap();
    output.send(&msg!("stop")).unwrap();
    thread::scope(|s| {
        let reader = s.spawn(|| input.iter().map(|msg| msg.unwrap()).count());
        thread::sleep(Duration::from_millis(30));
        input.close().unwrap();
        assert_eq!(reader.join().unwrap(), 2);
    });
    //Sending to a device without open inputs is fine
    output.send(&msg!("stop")).unwrap();
}

#[test]
fn message_callback() {
    let backend = LoopbackBackend::new();
    let input = InputPort::open(&backend, Some("cb")).unwrap();
    let output = OutputPort::open(&backend, Some("cb"), false).unwrap();
    let (tx, rx) = mpsc::channel();
    input
        .set_callback(Some(Box::new(move |msg| tx.send(msg).unwrap())))
        .unwrap();
    output.send(&msg!("program_change channel=1 program=2")).unwrap();
    assert_eq!(rx.recv().unwrap().bytes(), [0xC1, 0x02]);
    assert!(input.poll().unwrap().is_none());

    input.set_callback(None).unwrap();
    output.send(&msg!("clock")).unwrap();
    assert_eq!(input.poll().unwrap().unwrap().type_name(), "clock");
    assert!(rx.try_recv().is_err());
}

#[test]
fn callback_may_send() {
    let backend = LoopbackBackend::new();
    let input = InputPort::open(&backend, Some("echo")).unwrap();
    let output = Arc::new(OutputPort::open(&backend, Some("echo"), false).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    {
        let output = output.clone();
        let calls = calls.clone();
        input
            .set_callback(Some(Box::new(move |msg| {
                //Echo the first message back into the same device
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    output.send(&msg).unwrap();
                }
            })))
            .unwrap();
    }
    output.send(&msg!("tune_request")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    input.close().unwrap();
}

#[test]
fn closed_output() {
    let backend = LoopbackBackend::new();
    let output = OutputPort::open(&backend, None, false).unwrap();
    output.close().unwrap();
    output.close().unwrap();
    assert!(output.is_closed());
    let err = output.send(&msg!("clock")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PortClosed);
    assert_eq!(output.reset().unwrap_err().kind(), ErrorKind::PortClosed);
}

#[test]
fn reset_and_panic() {
    let backend = LoopbackBackend::polling();
    let input = InputPort::open(&backend, Some("r")).unwrap();
    let output = OutputPort::open(&backend, Some("r"), true).unwrap();

    output.reset().unwrap();
    let got = drain(&input);
    assert_eq!(got.len(), 32);
    assert!(got[..16].iter().all(|msg| msg.is_cc(Some(123))));
    assert!(got[16..].iter().all(|msg| msg.is_cc(Some(121))));
    let channels: Vec<u8> = got[..16].iter().filter_map(Message::channel).collect();
    assert_eq!(channels, (0..16).collect::<Vec<u8>>());

    output.panic().unwrap();
    let got = drain(&input);
    assert_eq!(got.len(), 16);
    assert!(got.iter().all(|msg| msg.is_cc(Some(120))));

    //Autoreset on close
    drop(output);
    assert_eq!(drain(&input).len(), 32);
}

#[test]
fn io_port() {
    let backend = LoopbackBackend::new();
    let port = IoPort::open(&backend, Some("io"), false).unwrap();
    assert_eq!(port.name(), Some("io"));
    port.send(&msg!("song_select song=9")).unwrap();
    assert_eq!(port.poll().unwrap().unwrap().bytes(), [0xF3, 0x09]);
    port.send(&msg!("start")).unwrap();
    assert_eq!(port.receive(true).unwrap().unwrap().type_name(), "start");
    assert_eq!(port.iter_pending().count(), 0);
    port.close().unwrap();
    assert!(port.is_closed());
}

#[test]
fn multi_input_fairness() {
    let backend = LoopbackBackend::new();
    let names = ["p0", "p1", "p2", "p3"];
    let inputs: Vec<InputPort> = names
        .iter()
        .map(|name| InputPort::open(&backend, Some(name)).unwrap())
        .collect();
    let outputs: Vec<OutputPort> = names
        .iter()
        .map(|name| OutputPort::open(&backend, Some(name), false).unwrap())
        .collect();
    for (channel, output) in outputs.iter().enumerate() {
        for note in 0..25 {
            output
                .send(&Message::note_on(channel as u8, note, 1).unwrap())
                .unwrap();
        }
    }

    let mut multi = MultiInput::with_seed(inputs, 7);
    for _round in 0..25 {
        let mut seen: Vec<u8> = (0..names.len())
            .map(|_| multi.receive(true).unwrap().unwrap().channel().unwrap())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, [0, 1, 2, 3]);
    }
    assert!(multi.poll().unwrap().is_none());
    assert_eq!(multi.iter_pending().count(), 0);
}

#[test]
fn multi_input_ordering_per_port() {
    let backend = LoopbackBackend::polling();
    let inputs = vec![
        InputPort::open(&backend, Some("a")).unwrap(),
        InputPort::open(&backend, Some("b")).unwrap(),
    ];
    let out_a = OutputPort::open(&backend, Some("a"), false).unwrap();
    for note in 0..10 {
        out_a.send(&Message::note_on(0, note, 1).unwrap()).unwrap();
    }
    let mut multi = MultiInput::new(inputs);
    let notes: Vec<i64> = multi
        .iter_pending()
        .map(|msg| msg.get("note").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(notes, (0..10).collect::<Vec<i64>>());
}

#[test]
fn multi_input_closed() {
    let backend = LoopbackBackend::new();
    let multi = MultiInput::new(vec![
        InputPort::open(&backend, Some("a")).unwrap(),
        InputPort::open(&backend, Some("b")).unwrap(),
    ]);
    multi.ports()[0].close().unwrap();
    assert!(!multi.is_closed());
    multi.close().unwrap();
    assert!(multi.is_closed());
    let mut multi = multi;
    assert_eq!(multi.receive(true).unwrap_err().kind(), ErrorKind::PortClosed);
}

#[test]
fn multi_receive_drains() {
    let backend = LoopbackBackend::new();
    let inputs = vec![
        InputPort::open(&backend, Some("a")).unwrap(),
        InputPort::open(&backend, Some("b")).unwrap(),
    ];
    let a = OutputPort::open(&backend, Some("a"), false).unwrap();
    let b = OutputPort::open(&backend, Some("b"), false).unwrap();
    a.send(&msg!("start")).unwrap();
    a.send(&msg!("stop")).unwrap();
    b.send(&msg!("clock")).unwrap();
    let got = multi_receive(&inputs).unwrap();
    assert_eq!(got.len(), 3);
    let from_a: Vec<&str> = got
        .iter()
        .filter(|(idx, _)| *idx == 0)
        .map(|(_, msg)| msg.type_name())
        .collect();
    assert_eq!(from_a, ["start", "stop"]);
    assert!(multi_receive(&inputs).unwrap().is_empty());
}

/// A backend whose outputs fail on every send.
struct Broken;
struct BrokenOutput;
impl OutputDriver for BrokenOutput {
    fn send(&self, _bytes: &[u8]) -> Result<()> {
        Err(Error::value("cable unplugged"))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
impl Backend for Broken {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(Vec::new())
    }

    fn open_input(&self, _name: Option<&str>) -> Result<Box<dyn InputDriver>> {
        Err(Error::value("no inputs"))
    }

    fn open_output(&self, _name: Option<&str>) -> Result<Box<dyn OutputDriver>> {
        Ok(Box::new(BrokenOutput))
    }
}

#[test]
fn multi_output() {
    init_logging();
    let backend = LoopbackBackend::polling();
    let input = InputPort::open(&backend, Some("ok")).unwrap();
    let closed = OutputPort::open(&backend, Some("ok"), false).unwrap();
    closed.close().unwrap();
    let multi = MultiOutput::new(vec![
        OutputPort::open(&Broken, None, false).unwrap(),
        closed,
        OutputPort::open(&Broken, None, false).unwrap(),
        OutputPort::open(&backend, Some("ok"), false).unwrap(),
    ]);
    let err = multi.send(&msg!("start")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    //The healthy port still got the message, once
    assert_eq!(drain(&input).len(), 1);

    assert_eq!(InputPort::open(&Broken, None).unwrap_err().kind(), ErrorKind::Value);
    assert_eq!(multi.ports()[0].device_type(), None);
    multi.close().unwrap();
    assert!(multi.ports().iter().all(OutputPort::is_closed));
}

/// A backend whose inputs stay open but fail on every poll.
struct Flaky;
struct FlakyInput;
impl InputDriver for FlakyInput {
    fn poll(&self) -> Result<Vec<u8>> {
        Err(Error::value("device vanished"))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
impl Backend for Flaky {
    fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        Ok(Vec::new())
    }

    fn open_input(&self, _name: Option<&str>) -> Result<Box<dyn InputDriver>> {
        Ok(Box::new(FlakyInput))
    }

    fn open_output(&self, _name: Option<&str>) -> Result<Box<dyn OutputDriver>> {
        Err(Error::value("no outputs"))
    }
}

#[test]
fn multi_input_keeps_messages_on_error() {
    let backend = LoopbackBackend::polling();
    let inputs = vec![
        InputPort::open(&backend, Some("ok")).unwrap(),
        InputPort::open(&Flaky, None).unwrap(),
    ];
    let output = OutputPort::open(&backend, Some("ok"), false).unwrap();
    output.send(&msg!("start")).unwrap();

    let mut multi = MultiInput::with_seed(inputs, 3);
    let mut got = Vec::new();
    let mut errors = 0;
    for _ in 0..64 {
        match multi.poll() {
            Ok(Some(msg)) => got.push(msg),
            Ok(None) => {}
            Err(err) => {
                assert_eq!(err.kind(), ErrorKind::Value);
                errors += 1;
            }
        }
    }
    assert!(errors > 0);
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].type_name(), "start");
}
