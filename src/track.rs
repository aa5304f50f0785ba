//! Tracks: ordered sequences of MIDI and meta events with delta times.

use crate::{
    message::Message,
    meta::{MetaKind, MetaMessage},
};
use std::{
    fmt,
    ops::{Add, Deref, DerefMut, RangeBounds},
};

/// One event in a track: either a MIDI message or a meta message.
///
/// Inside a [`Track`] the `time` of every event is its delta time in ticks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TrackEvent {
    Midi(Message),
    Meta(MetaMessage),
}
impl TrackEvent {
    #[inline]
    pub fn time(&self) -> f64 {
        match self {
            TrackEvent::Midi(msg) => msg.time(),
            TrackEvent::Meta(meta) => meta.time(),
        }
    }

    #[inline]
    pub fn with_time(self, time: f64) -> TrackEvent {
        match self {
            TrackEvent::Midi(msg) => TrackEvent::Midi(msg.with_time(time)),
            TrackEvent::Meta(meta) => TrackEvent::Meta(meta.with_time(time)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            TrackEvent::Midi(msg) => msg.type_name(),
            TrackEvent::Meta(meta) => meta.type_name(),
        }
    }

    #[inline]
    pub fn is_meta(&self) -> bool {
        matches!(self, TrackEvent::Meta(_))
    }

    #[inline]
    pub fn is_end_of_track(&self) -> bool {
        matches!(self, TrackEvent::Meta(meta) if meta.is_end_of_track())
    }

    pub fn as_midi(&self) -> Option<&Message> {
        match self {
            TrackEvent::Midi(msg) => Some(msg),
            TrackEvent::Meta(_) => None,
        }
    }

    pub fn as_meta(&self) -> Option<&MetaMessage> {
        match self {
            TrackEvent::Meta(meta) => Some(meta),
            TrackEvent::Midi(_) => None,
        }
    }
}
impl From<Message> for TrackEvent {
    fn from(msg: Message) -> TrackEvent {
        TrackEvent::Midi(msg)
    }
}
impl From<MetaMessage> for TrackEvent {
    fn from(meta: MetaMessage) -> TrackEvent {
        TrackEvent::Meta(meta)
    }
}
impl fmt::Display for TrackEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrackEvent::Midi(msg) => fmt::Display::fmt(msg, f),
            TrackEvent::Meta(meta) => fmt::Display::fmt(meta, f),
        }
    }
}

/// A track of a MIDI file.
///
/// Dereferences to the underlying `Vec` of events, so it can be indexed, iterated, pushed to and
/// truncated like one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Track {
    events: Vec<TrackEvent>,
}
impl Track {
    pub fn new() -> Track {
        Track::default()
    }

    /// Create a track holding a single `track_name` event.
    pub fn with_name(name: &str) -> Track {
        let mut track = Track::new();
        track.set_name(name);
        track
    }

    /// The text of the first `track_name` event, or `""` if there is none.
    pub fn name(&self) -> &str {
        self.events
            .iter()
            .find_map(|ev| match ev.as_meta()?.kind() {
                MetaKind::TrackName { name } => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or("")
    }

    /// Rename the track, updating the first `track_name` event or inserting one at the start.
    pub fn set_name(&mut self, name: &str) {
        let existing = self
            .events
            .iter()
            .position(|ev| matches!(ev.as_meta().map(MetaMessage::kind), Some(MetaKind::TrackName { .. })));
        match existing {
            Some(idx) => {
                let time = self.events[idx].time();
                self.events[idx] = MetaMessage::track_name(name).with_time(time).into();
            }
            None => self.events.insert(0, MetaMessage::track_name(name).into()),
        }
    }

    /// Copy a range of events into a new track.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Track {
        let range = (range.start_bound().cloned(), range.end_bound().cloned());
        Track {
            events: self.events[range].to_vec(),
        }
    }

    pub fn into_events(self) -> Vec<TrackEvent> {
        self.events
    }
}
impl Deref for Track {
    type Target = Vec<TrackEvent>;

    fn deref(&self) -> &Vec<TrackEvent> {
        &self.events
    }
}
impl DerefMut for Track {
    fn deref_mut(&mut self) -> &mut Vec<TrackEvent> {
        &mut self.events
    }
}
impl From<Vec<TrackEvent>> for Track {
    fn from(events: Vec<TrackEvent>) -> Track {
        Track { events }
    }
}
impl FromIterator<TrackEvent> for Track {
    fn from_iter<I: IntoIterator<Item = TrackEvent>>(iter: I) -> Track {
        Track {
            events: iter.into_iter().collect(),
        }
    }
}
impl Extend<TrackEvent> for Track {
    fn extend<I: IntoIterator<Item = TrackEvent>>(&mut self, iter: I) {
        self.events.extend(iter)
    }
}
impl IntoIterator for Track {
    type Item = TrackEvent;
    type IntoIter = std::vec::IntoIter<TrackEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
impl<'a> IntoIterator for &'a Track {
    type Item = &'a TrackEvent;
    type IntoIter = std::slice::Iter<'a, TrackEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
impl Add for Track {
    type Output = Track;

    /// Concatenate two tracks.
    fn add(mut self, other: Track) -> Track {
        self.events.extend(other.events);
        self
    }
}

/// Remove every `end_of_track` event and append a single one at the end.
///
/// The delta times of removed events carry over to the event that follows them, so the
/// absolute time of every other event is preserved.
pub fn fix_end_of_track(events: impl IntoIterator<Item = TrackEvent>) -> Vec<TrackEvent> {
    let events = events.into_iter();
    let mut out = Vec::with_capacity(events.size_hint().0 + 1);
    let mut accum = 0.0;
    for ev in events {
        if ev.is_end_of_track() {
            accum += ev.time();
        } else if accum != 0.0 {
            let time = accum + ev.time();
            out.push(ev.with_time(time));
            accum = 0.0;
        } else {
            out.push(ev);
        }
    }
    out.push(MetaMessage::end_of_track().with_time(accum).into());
    out
}

/// Convert delta times into absolute times.
pub fn to_abs(events: impl IntoIterator<Item = TrackEvent>) -> impl Iterator<Item = TrackEvent> {
    let mut now = 0.0;
    events.into_iter().map(move |ev| {
        now += ev.time();
        ev.with_time(now)
    })
}

/// Convert absolute times into delta times.
pub fn to_rel(events: impl IntoIterator<Item = TrackEvent>) -> impl Iterator<Item = TrackEvent> {
    let mut last = 0.0;
    events.into_iter().map(move |ev| {
        let time = ev.time();
        let delta = time - last;
        last = time;
        ev.with_time(delta)
    })
}

/// Merge tracks into a single track, keeping the absolute time of every event.
///
/// Events with equal absolute times keep their relative order, with earlier tracks first. The
/// result ends with a single `end_of_track`.
pub fn merge_tracks<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Track {
    let mut events: Vec<TrackEvent> = tracks
        .into_iter()
        .flat_map(|track| to_abs(track.iter().cloned()))
        .collect();
    events.sort_by(|a, b| a.time().total_cmp(&b.time()));
    Track::from(fix_end_of_track(to_rel(events)))
}
