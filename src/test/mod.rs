use crate::{Format, Message, MetaMessage, MidiFile, Track, TrackEvent};

/// Parse a message from its text form.
///
/// Reaches the submodules below through textual scope.
macro_rules! msg {
    ($text:expr) => {
        $text
            .parse::<crate::Message>()
            .unwrap_or_else(|err| panic!("bad message {:?}: {}", $text, err))
    };
}

mod codec;
mod ports;
mod syx;

/// Route `tracing` output to the test harness. Safe to call from every test.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Build a raw chunk from its id and payload.
fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = id.to_vec();
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Build a raw header chunk.
fn header(format: u16, tracks: u16, division: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&format.to_be_bytes());
    data.extend_from_slice(&tracks.to_be_bytes());
    data.extend_from_slice(&division.to_be_bytes());
    chunk(b"MThd", &data)
}

fn ev(text: &str, delta: f64) -> TrackEvent {
    msg!(text).with_time(delta).into()
}

fn meta_ev(text: &str, delta: f64) -> TrackEvent {
    text.parse::<MetaMessage>()
        .unwrap_or_else(|err| panic!("bad meta message {:?}: {}", text, err))
        .with_time(delta)
        .into()
}

/// A small two-track song touching most event kinds.
fn song() -> MidiFile {
    let mut file = MidiFile::new(Format::Parallel);
    file.ticks_per_beat = 96;
    let conductor: Track = vec![
        meta_ev("<meta message track_name name=conductor time=0>", 0.0),
        meta_ev("<meta message set_tempo tempo=400000 time=0>", 0.0),
        meta_ev("<meta message time_signature numerator=3 denominator=4 clocks_per_click=24 notated_32nd_notes_per_beat=8 time=0>", 0.0),
        meta_ev("<meta message key_signature key=Bb time=0>", 0.0),
        meta_ev("<meta message set_tempo tempo=600000 time=0>", 192.0),
    ]
    .into();
    file.push_track(conductor);
    let lead: Track = vec![
        meta_ev("<meta message track_name name=lead time=0>", 0.0),
        ev("program_change channel=2 program=40", 0.0),
        ev("control_change channel=2 control=7 value=100", 0.0),
        ev("note_on channel=2 note=60 velocity=90", 0.0),
        ev("note_on channel=2 note=64 velocity=90", 0.0),
        ev("pitchwheel channel=2 pitch=-8192", 48.0),
        ev("pitchwheel channel=2 pitch=8191", 48.0),
        ev("note_off channel=2 note=60 velocity=0", 0.0),
        ev("note_off channel=2 note=64 velocity=0", 0.0),
        ev("sysex data=(65,16,66,18)", 96.0),
        ev("aftertouch channel=2 value=5", 0.0),
        ev("polytouch channel=2 note=60 value=6", 0.0),
        ev("songpos pos=300", 0.0),
        ev("quarter_frame frame_type=3 frame_value=9", 0.0),
        ev("note_on channel=2 note=67 velocity=80", 0.0),
        ev("note_on channel=2 note=67 velocity=0", 96.0),
    ]
    .into();
    file.push_track(lead);
    file
}

/// Every non-meta event of a track, for comparisons that ignore end-of-track handling.
fn midi_events(track: &Track) -> Vec<Message> {
    track.iter().filter_map(TrackEvent::as_midi).cloned().collect()
}
