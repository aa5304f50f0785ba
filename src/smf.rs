//! Specific to the SMF packaging of MIDI streams.

use crate::{
    decode::decode_message,
    encode::encode_into,
    message::{Message, MessageKind},
    meta::{Charset, MetaKind, MetaMessage, DEFAULT_TEMPO, META_STATUS},
    prelude::*,
    primitive::{read_varlen, read_varlen_slice, write_varlen, MAX_VARLEN},
    specs::{spec_by_status, SYSEX_END, SYSEX_START},
    track::{fix_end_of_track, merge_tracks, Track, TrackEvent},
    units::tick2second,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    sync::OnceLock,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// The default resolution of new files.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// The different formats an SMF file can be, also known as its `type`.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default)]
pub enum Format {
    /// Type 0: a single track holding every channel.
    SingleTrack,
    /// Type 1: several tracks played simultaneously.
    #[default]
    Parallel,
    /// Type 2: several independent sequences, one per track.
    Sequential,
}
impl Format {
    /// Convert the numeric file type (`0`, `1` or `2`) into a format.
    pub fn from_type(file_type: u16) -> Result<Format> {
        Ok(match file_type {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => bail!(err_format!("invalid smf format")),
        })
    }

    /// The numeric file type.
    pub fn as_type(self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        }
    }
}

/// Options that affect how MIDI files are read.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct ReadOptions {
    /// Replace data bytes above 127 with 127 instead of failing.
    pub clip: bool,
    /// Encoding of text meta events.
    pub charset: Charset,
}

/// A Standard MIDI File.
///
/// Holds the file format, the timing resolution and a list of tracks. For formats 0 and 1 the
/// tracks can be merged and played back as a single stream of timed events, see
/// [`iter`](MidiFile::iter) and [`play`](MidiFile::play).
///
/// ```
/// use midiwire::{Format, Message, MidiFile};
///
/// let mut file = MidiFile::new(Format::SingleTrack);
/// let track = file.add_track("piano");
/// track.push(Message::note_on(0, 60, 64).unwrap().into());
/// track.push(Message::note_off(0, 60, 64).unwrap().with_time(480.0).into());
///
/// let bytes = file.to_bytes().unwrap();
/// let reread = MidiFile::parse(&bytes).unwrap();
/// assert_eq!(reread.tracks()[0].name(), "piano");
/// assert_eq!(reread.length().unwrap(), 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct MidiFile {
    pub format: Format,
    /// Ticks per quarter note. An SMPTE division is kept as its raw header value.
    pub ticks_per_beat: u16,
    /// Encoding of text meta events when saving.
    pub charset: Charset,
    tracks: Vec<Track>,
    merged: OnceLock<Track>,
}
impl Default for MidiFile {
    fn default() -> MidiFile {
        MidiFile::new(Format::default())
    }
}
impl PartialEq for MidiFile {
    fn eq(&self, other: &MidiFile) -> bool {
        self.format == other.format
            && self.ticks_per_beat == other.ticks_per_beat
            && self.tracks == other.tracks
    }
}
impl MidiFile {
    /// Create an empty file with the default resolution.
    pub fn new(format: Format) -> MidiFile {
        MidiFile {
            format,
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            charset: Charset::default(),
            tracks: Vec::new(),
            merged: OnceLock::new(),
        }
    }

    /// Read a MIDI file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<MidiFile> {
        MidiFile::open_with(path, &ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, opts: &ReadOptions) -> Result<MidiFile> {
        let raw = fs::read(path)?;
        MidiFile::parse_with(&raw, opts)
    }

    /// Parse a MIDI file from its raw bytes.
    pub fn parse(raw: &[u8]) -> Result<MidiFile> {
        MidiFile::parse_with(raw, &ReadOptions::default())
    }

    /// Parse a MIDI file from its raw bytes with explicit options.
    ///
    /// The first chunk must be an `MThd` header and its division must not be 0. Unknown chunks are
    /// skipped, and reading stops once the declared number of tracks has been read or the data runs
    /// out.
    pub fn parse_with(raw: &[u8], opts: &ReadOptions) -> Result<MidiFile> {
        let mut chunks = ChunkIter::read(raw);
        let header = match chunks.next() {
            Some(chunk) => chunk.context("invalid midi header")?,
            None => bail!(err_format!("MThd not found, probably not a midi file")),
        };
        ensure!(
            header.id == *b"MThd",
            err_format!("MThd not found, probably not a midi file")
        );
        let (format, track_count, ticks_per_beat) = read_header(header.data)?;
        ensure!(ticks_per_beat != 0, err_format!("division of 0 ticks per beat"));
        if ticks_per_beat & 0x8000 != 0 {
            warn!(
                "smpte division {:#06X} is kept as ticks per beat, timing will be off",
                ticks_per_beat
            );
        }

        let mut track_chunks = Vec::with_capacity(track_count as usize);
        while track_chunks.len() < track_count as usize {
            match chunks.next() {
                Some(chunk) => {
                    let chunk = chunk.context("invalid track chunk")?;
                    if chunk.id == *b"MTrk" {
                        track_chunks.push(chunk.data);
                    } else {
                        debug!(
                            "skipping unknown chunk {:?}",
                            String::from_utf8_lossy(&chunk.id)
                        );
                    }
                }
                None => {
                    warn!(
                        "header declares {} tracks but the file ends after {}",
                        track_count,
                        track_chunks.len()
                    );
                    break;
                }
            }
        }
        let tracks = read_tracks(track_chunks, opts)?;

        debug!(
            "loaded midi file of type {} with {} tracks and {} ticks per beat",
            format.as_type(),
            tracks.len(),
            ticks_per_beat
        );
        Ok(MidiFile {
            format,
            ticks_per_beat,
            charset: opts.charset,
            tracks,
            merged: OnceLock::new(),
        })
    }

    /// Encode and write the file into the given writer.
    ///
    /// Every track is written with a single trailing `end_of_track`, whatever the track holds.
    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        ensure!(
            self.format != Format::SingleTrack || self.tracks.len() == 1,
            Error::value("type 0 file must have exactly 1 track")
        );
        write_header(self.format, self.tracks.len(), self.ticks_per_beat, out)?;
        //Write tracks into a reusable buffer so that chunk lengths can be written
        let mut track_chunk = Vec::with_capacity(8 * 1024);
        for track in &self.tracks {
            write_track(track, self.charset, &mut track_chunk)?;
            out.write_all(&track_chunk)?;
            track_chunk.clear();
        }
        Ok(())
    }

    /// Encode the file into a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Write the file to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = BufWriter::new(File::create(path)?);
        self.write(&mut out)?;
        out.flush()?;
        debug!(
            "saved midi file of type {} with {} tracks to {}",
            self.format.as_type(),
            self.tracks.len(),
            path.display()
        );
        Ok(())
    }

    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Mutable access to the tracks. Drops the cached merged track.
    pub fn tracks_mut(&mut self) -> &mut Vec<Track> {
        self.merged.take();
        &mut self.tracks
    }

    /// Append an empty track with the given name (none if empty) and return it.
    pub fn add_track(&mut self, name: &str) -> &mut Track {
        let track = if name.is_empty() {
            Track::new()
        } else {
            Track::with_name(name)
        };
        self.push_track(track)
    }

    /// Append a track and return it.
    pub fn push_track(&mut self, track: Track) -> &mut Track {
        let tracks = self.tracks_mut();
        tracks.push(track);
        let last = tracks.len() - 1;
        &mut tracks[last]
    }

    /// All tracks merged into one, cached until the tracks change.
    ///
    /// Fails for type 2 files, whose tracks are not meant to be played together.
    pub fn merged_track(&self) -> Result<&Track> {
        ensure!(
            self.format != Format::Sequential,
            Error::value("can't merge tracks in type 2 (asynchronous) file")
        );
        Ok(self.merged.get_or_init(|| merge_tracks(&self.tracks)))
    }

    /// Iterate the merged track with `time` as seconds since the previous event.
    ///
    /// Tempo changes take effect for the events after them.
    pub fn iter(&self) -> Result<TimedIter<'_>> {
        Ok(TimedIter {
            events: self.merged_track()?.iter(),
            ticks_per_beat: self.ticks_per_beat,
            tempo: DEFAULT_TEMPO,
        })
    }

    /// Total playback time in seconds.
    pub fn length(&self) -> Result<f64> {
        Ok(self.iter()?.map(|ev| ev.time()).sum())
    }

    /// Play the file back in real time, skipping meta messages.
    ///
    /// The returned iterator sleeps until each message is due and then yields it.
    pub fn play(&self) -> Result<Playback<'_, impl FnMut() -> f64>> {
        let start = Instant::now();
        self.play_with(move || start.elapsed().as_secs_f64(), false)
    }

    /// Play the file back against a custom clock, measured in seconds.
    ///
    /// With `meta_messages` set, meta messages are yielded too. `set_tempo` events affect
    /// timing either way.
    pub fn play_with<N: FnMut() -> f64>(
        &self,
        now: N,
        meta_messages: bool,
    ) -> Result<Playback<'_, N>> {
        Ok(Playback {
            events: self.iter()?,
            now,
            start: None,
            input_time: 0.0,
            meta_messages,
        })
    }
}

/// Iterator over the merged events of a file, timed in seconds.
#[derive(Clone, Debug)]
pub struct TimedIter<'a> {
    events: std::slice::Iter<'a, TrackEvent>,
    ticks_per_beat: u16,
    tempo: u32,
}
impl Iterator for TimedIter<'_> {
    type Item = TrackEvent;

    fn next(&mut self) -> Option<TrackEvent> {
        let ev = self.events.next()?;
        let delta = if ev.time() > 0.0 {
            tick2second(ev.time(), self.ticks_per_beat, self.tempo)
        } else {
            0.0
        };
        if let TrackEvent::Meta(meta) = ev {
            if let MetaKind::SetTempo { tempo } = *meta.kind() {
                self.tempo = tempo;
            }
        }
        Some(ev.clone().with_time(delta))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

/// Real-time playback of a file, see [`MidiFile::play_with`].
pub struct Playback<'a, N> {
    events: TimedIter<'a>,
    now: N,
    start: Option<f64>,
    input_time: f64,
    meta_messages: bool,
}
impl<N: FnMut() -> f64> Iterator for Playback<'_, N> {
    type Item = TrackEvent;

    fn next(&mut self) -> Option<TrackEvent> {
        let start = match self.start {
            Some(start) => start,
            None => *self.start.insert((self.now)()),
        };
        loop {
            let ev = self.events.next()?;
            self.input_time += ev.time();
            let playback_time = (self.now)() - start;
            let wait = self.input_time - playback_time;
            //Negative or non-finite waits are skipped
            if let Ok(wait) = Duration::try_from_secs_f64(wait) {
                spin_sleep::sleep(wait);
            }
            if ev.is_meta() && !self.meta_messages {
                continue;
            }
            return Some(ev);
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Chunk<'a> {
    id: [u8; 4],
    data: &'a [u8],
}
impl<'a> Chunk<'a> {
    /// Read one chunk and advance the slice past it.
    /// If we're *exactly* at EOF (slice length 0), returns `None`.
    fn read(raw: &mut &'a [u8]) -> Result<Option<Chunk<'a>>> {
        if raw.is_empty() {
            return Ok(None);
        }
        let id = raw
            .split_checked(4)
            .ok_or(err_format!("failed to read chunk id"))?;
        let len = u32::read(raw).context("failed to read chunk length")?;
        let data = raw
            .split_checked(len as usize)
            .ok_or(err_format!("reached eof before chunk ended"))?;
        Ok(Some(Chunk {
            id: [id[0], id[1], id[2], id[3]],
            data,
        }))
    }
}

#[derive(Copy, Clone, Debug)]
struct ChunkIter<'a> {
    /// Starts at the current index, ends at EOF.
    raw: &'a [u8],
}
impl<'a> ChunkIter<'a> {
    fn read(raw: &'a [u8]) -> ChunkIter<'a> {
        ChunkIter { raw }
    }
}
impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>>;
    fn next(&mut self) -> Option<Result<Chunk<'a>>> {
        match Chunk::read(&mut self.raw) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(err) => {
                //Never read again from the middle of a corrupted chunk
                self.raw = &[];
                Some(Err(err))
            }
        }
    }
}

/// Read the header payload: format, track count and division. Extra bytes are ignored.
fn read_header(mut raw: &[u8]) -> Result<(Format, u16, u16)> {
    let format = Format::from_type(u16::read(&mut raw).context("failed to read file type")?)?;
    let track_count = u16::read(&mut raw).context("failed to read track count")?;
    let division = u16::read(&mut raw).context("failed to read division")?;
    Ok((format, track_count, division))
}

fn write_header<W: Write>(
    format: Format,
    track_count: usize,
    ticks_per_beat: u16,
    out: &mut W,
) -> Result<()> {
    let track_count = u16::try_from(track_count)
        .map_err(|_| Error::value("track count exceeds 16 bit range"))?;
    let mut header_chunk = [0; 4 + 4 + 6];
    header_chunk[0..4].copy_from_slice(b"MThd");
    header_chunk[4..8].copy_from_slice(&6u32.to_be_bytes());
    header_chunk[8..10].copy_from_slice(&format.as_type().to_be_bytes());
    header_chunk[10..12].copy_from_slice(&track_count.to_be_bytes());
    header_chunk[12..14].copy_from_slice(&ticks_per_beat.to_be_bytes());
    out.write_all(&header_chunk)?;
    Ok(())
}

/// Decode track chunks, on several threads when enabled and worthwhile.
fn read_tracks(chunks: Vec<&[u8]>, opts: &ReadOptions) -> Result<Vec<Track>> {
    #[cfg(feature = "parallel")]
    {
        if chunks.len() > 1 {
            use rayon::prelude::*;

            return chunks
                .into_par_iter()
                .map(|raw| read_track(raw, opts))
                .collect::<Result<Vec<Track>>>();
        }
    }
    chunks
        .into_iter()
        .map(|raw| read_track(raw, opts))
        .collect()
}

/// Decode the events of a single track chunk.
pub(crate) fn read_track(mut raw: &[u8], opts: &ReadOptions) -> Result<Track> {
    let mut events = Vec::with_capacity(raw.len() / 3);
    let mut running_status = None;
    while !raw.is_empty() {
        let ev = read_event(&mut raw, &mut running_status, opts).context("failed to read event")?;
        events.push(ev);
    }
    Ok(Track::from(events))
}

/// Advances the slice and updates `running_status`.
fn read_event(
    raw: &mut &[u8],
    running_status: &mut Option<u8>,
    opts: &ReadOptions,
) -> Result<TrackEvent> {
    let delta = read_varlen(raw).context("failed to read event delta time")? as f64;
    let first = u8::read(raw).context("failed to read event status")?;
    let (status, peeked) = if first < 0x80 {
        let status =
            running_status.ok_or(err_format!("running status without last status byte"))?;
        (status, Some(first))
    } else {
        (first, None)
    };
    Ok(match status {
        META_STATUS => {
            let kind = MetaKind::read(raw, opts.charset)?;
            MetaMessage::from_valid(kind, delta).into()
        }
        SYSEX_START | SYSEX_END => {
            let mut data = read_varlen_slice(raw).context("failed to read sysex data")?;
            if let [SYSEX_START, rest @ ..] = data {
                data = rest;
            }
            if let [rest @ .., SYSEX_END] = data {
                data = rest;
            }
            let mut data = data.to_vec();
            clip_data(&mut data, opts.clip)?;
            Message::from_valid(MessageKind::SysEx { data }, delta).into()
        }
        _ => {
            let spec = spec_by_status(status).ok_or(err_format!("undefined status byte"))?;
            let len = spec.length.unwrap_or(1);
            let mut bytes = Vec::with_capacity(len);
            bytes.push(status);
            bytes.extend(peeked);
            let rest = raw
                .split_checked(len.saturating_sub(bytes.len()))
                .ok_or(err_format!("unexpected eof in message"))?;
            bytes.extend_from_slice(rest);
            clip_data(&mut bytes[1..], opts.clip)?;
            if spec.is_channel() {
                *running_status = Some(status);
            }
            Message::from_valid(decode_message(&bytes)?, delta).into()
        }
    })
}

fn clip_data(data: &mut [u8], clip: bool) -> Result<()> {
    for byte in data {
        if *byte > 127 {
            ensure!(clip, err_format!("data byte must be in range 0..127"));
            *byte = 127;
        }
    }
    Ok(())
}

/// Encode a track chunk into `out`, which should be empty.
///
/// Channel messages use running status. Meta and sysex events clear it.
pub(crate) fn write_track(track: &Track, charset: Charset, out: &mut Vec<u8>) -> Result<()> {
    out.extend_from_slice(b"MTrk\0\0\0\0");
    let mut running_status = None;
    let mut msg_bytes = Vec::with_capacity(3);
    for ev in fix_end_of_track(track.iter().cloned()) {
        write_varlen(checked_delta(ev.time())?, out)?;
        match &ev {
            TrackEvent::Meta(meta) => {
                meta.kind().write(charset, out)?;
                running_status = None;
            }
            TrackEvent::Midi(msg) => match msg.kind() {
                MessageKind::SysEx { data } => {
                    out.push(SYSEX_START);
                    let len = u32::try_from(data.len() + 1)
                        .map_err(|_| Error::value("sysex exceeds 32 bit range"))?;
                    write_varlen(len, out)?;
                    out.extend_from_slice(data);
                    out.push(SYSEX_END);
                    running_status = None;
                }
                kind => {
                    ensure!(
                        !msg.is_realtime(),
                        Error::value(format_args!(
                            "realtime message {} is not allowed in a midi file",
                            msg.type_name()
                        ))
                    );
                    msg_bytes.clear();
                    encode_into(kind, &mut msg_bytes);
                    let status = msg_bytes[0];
                    if !msg.is_channel() {
                        running_status = None;
                        out.extend_from_slice(&msg_bytes);
                    } else if running_status == Some(status) {
                        out.extend_from_slice(&msg_bytes[1..]);
                    } else {
                        running_status = Some(status);
                        out.extend_from_slice(&msg_bytes);
                    }
                }
            },
        }
    }
    let len = u32::try_from(out.len() - 8)
        .map_err(|_| Error::value("midi chunk size exceeds 32 bit range"))?;
    out[4..8].copy_from_slice(&len.to_be_bytes());
    Ok(())
}

/// Delta times in a track must be non-negative whole numbers of ticks.
fn checked_delta(time: f64) -> Result<u32> {
    ensure!(
        time >= 0.0 && time.fract() == 0.0,
        Error::value(format_args!(
            "message time must be a non-negative integer, got {}",
            time
        ))
    );
    ensure!(
        time <= MAX_VARLEN as f64,
        Error::range("delta time", 0, MAX_VARLEN as i64, time as i64)
    );
    Ok(time as u32)
}
