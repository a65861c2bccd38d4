//! Raw track events and the running-status state machine that decodes them.

use crate::{
    prelude::*,
    primitive::skip_varlen_slice,
    tempo::{TempoMap, TempoMode, TickClock},
};

/// The meta-event type carrying a tempo, in microseconds per quarter note.
pub(crate) const META_TEMPO: u8 = 0x51;

/// Represents a decoded SMF track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event) and the raw event
/// bytes, status byte included.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TrackEvent<'a> {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u64,
    /// The raw bytes of the event.
    pub bytes: EventBytes<'a>,
}

/// The raw bytes of a single event, always starting with its status byte.
///
/// Meta events are laid out as `FF <type> <varlen length> <payload>`, SysEx events as
/// `F0|F7 <varlen length> <payload>` and channel events as `<status> <data...>`.
///
/// Events are borrowed from the file whenever they are stored contiguously.
/// Channel events written using running status lack their status byte in the file, so they are
/// rebuilt and stored inline instead.
#[derive(Copy, Clone)]
pub struct EventBytes<'a>(Repr<'a>);

#[derive(Copy, Clone)]
enum Repr<'a> {
    Borrowed(&'a [u8]),
    Inline { buf: [u8; 3], len: u8 },
}

impl<'a> EventBytes<'a> {
    /// Get the raw event bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self.0 {
            Repr::Borrowed(bytes) => bytes,
            Repr::Inline { ref buf, len } => &buf[..len as usize],
        }
    }

    /// The status byte of the event.
    #[inline]
    pub fn status(&self) -> u8 {
        self.as_bytes()[0]
    }

    /// Whether this is a meta event (status `0xFF`).
    #[inline]
    pub fn is_meta(&self) -> bool {
        self.status() == 0xFF
    }

    /// Whether this is a SysEx event or SysEx escape (status `0xF0` or `0xF7`).
    #[inline]
    pub fn is_sysex(&self) -> bool {
        matches!(self.status(), 0xF0 | 0xF7)
    }

    /// Whether this is a channel voice event (status in `0x80..=0xEF`).
    #[inline]
    pub fn is_channel(&self) -> bool {
        self.status() < 0xF0
    }

    /// The meta type of a meta event, or `None` for other events.
    #[inline]
    pub fn meta_type(&self) -> Option<u8> {
        if self.is_meta() {
            self.as_bytes().get(1).copied()
        } else {
            None
        }
    }

    /// The data carried by a meta or SysEx event, without the length prefix.
    ///
    /// Returns `None` for channel events.
    pub fn payload(&self) -> Option<&[u8]> {
        let bytes = self.as_bytes();
        let mut rest = if self.is_meta() {
            bytes.get(2..)?
        } else if self.is_sysex() {
            &bytes[1..]
        } else {
            return None;
        };
        read_varlen(&mut rest).ok()?;
        Some(rest)
    }

    /// The tempo stored in a tempo meta event, in microseconds per quarter note.
    ///
    /// Returns `None` if this is not a tempo event, or if its payload is not 3 bytes long.
    pub fn tempo(&self) -> Option<u32> {
        if self.meta_type() != Some(META_TEMPO) {
            return None;
        }
        match self.payload()? {
            &[a, b, c] => Some(u32::from_be_bytes([0, a, b, c])),
            _ => None,
        }
    }

    #[inline]
    fn inline(buf: [u8; 3], len: usize) -> EventBytes<'a> {
        EventBytes(Repr::Inline {
            buf,
            len: len as u8,
        })
    }
}
impl core::ops::Deref for EventBytes<'_> {
    type Target = [u8];
    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl AsRef<[u8]> for EventBytes<'_> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl PartialEq for EventBytes<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for EventBytes<'_> {}
impl core::hash::Hash for EventBytes<'_> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}
impl fmt::Debug for EventBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EventBytes({:02X?})", self.as_bytes())
    }
}

/// The running status of a track: the last channel status byte seen, if any.
///
/// Meta and SysEx events cancel running status.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum RunningStatus {
    /// No channel event has set a status yet, or a meta/SysEx event cancelled it.
    NoStatus,
    /// Channel events may omit this status byte.
    Voice(u8),
}
impl Default for RunningStatus {
    fn default() -> RunningStatus {
        RunningStatus::NoStatus
    }
}

/// Amount of data bytes following a channel status byte.
#[inline]
fn channel_data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}

/// Advances the slice and updates `running_status`.
///
/// In case of failure the slice might be left in the middle of an event!
pub(crate) fn read_event<'a>(
    raw: &mut &'a [u8],
    running_status: &mut RunningStatus,
) -> Result<TrackEvent<'a>> {
    let delta = read_varlen(raw).context(err_malformed!("failed to read event deltatime"))?;
    let start: &'a [u8] = *raw;
    let status = read_u8(raw).ok_or(err_malformed!("failed to read event status"))?;
    let consumed =
        move |raw: &[u8]| EventBytes(Repr::Borrowed(&start[..start.len() - raw.len()]));
    let bytes = match status {
        0xFF => {
            *running_status = RunningStatus::NoStatus;
            read_u8(raw).ok_or(err_malformed!("failed to read meta type"))?;
            skip_varlen_slice(raw).context(err_malformed!("failed to read meta event"))?;
            consumed(*raw)
        }
        0xF0 | 0xF7 => {
            *running_status = RunningStatus::NoStatus;
            skip_varlen_slice(raw).context(err_malformed!("failed to read sysex event"))?;
            consumed(*raw)
        }
        0x80..=0xEF => {
            *running_status = RunningStatus::Voice(status);
            raw.split_checked(channel_data_len(status))
                .ok_or(err_malformed!("channel event runs past end of track"))?;
            consumed(*raw)
        }
        0xF1..=0xFE => bail!(err_malformed!("invalid channel event status")),
        0x00..=0x7F => {
            //Running status! The byte just read is the first data byte
            let prev = match *running_status {
                RunningStatus::Voice(prev) => prev,
                RunningStatus::NoStatus => bail!(err_malformed!(
                    "event missing status with no running status active"
                )),
            };
            let len = channel_data_len(prev);
            let rest = raw
                .split_checked(len - 1)
                .ok_or(err_malformed!("channel event runs past end of track"))?;
            let mut buf = [prev, status, 0];
            buf[2..2 + rest.len()].copy_from_slice(rest);
            EventBytes::inline(buf, 1 + len)
        }
    };
    Ok(TrackEvent { delta, bytes })
}

/// Byte bounds of a track's event stream within the file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct TrackBounds {
    pub offset: usize,
    pub len: usize,
}
impl TrackBounds {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// The decoding state of a single track.
#[derive(Clone, Debug)]
pub(crate) struct TrackCursor {
    bounds: TrackBounds,
    pos: usize,
    status: RunningStatus,
    tick_seconds: f64,
    /// Ticks accumulated so far, only maintained when following a shared tempo map.
    ticks: u64,
    tempo_index: usize,
}
impl TrackCursor {
    pub fn new(bounds: TrackBounds, tick_seconds: f64) -> TrackCursor {
        TrackCursor {
            bounds,
            pos: bounds.offset,
            status: RunningStatus::NoStatus,
            tick_seconds,
            ticks: 0,
            tempo_index: 0,
        }
    }

    #[inline]
    pub fn bounds(&self) -> TrackBounds {
        self.bounds
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn running_status(&self) -> RunningStatus {
        self.status
    }

    #[inline]
    pub fn tick_seconds(&self) -> f64 {
        self.tick_seconds
    }

    pub fn rewind(&mut self, tick_seconds: f64) {
        *self = TrackCursor::new(self.bounds, tick_seconds);
    }

    /// Decode the next event without applying any tempo logic.
    ///
    /// Returns `None` once the cursor reaches the end of the track.
    /// On failure the cursor is left untouched, pointing at the start of the broken event.
    pub fn read<'a>(&mut self, raw: &'a [u8]) -> Result<Option<TrackEvent<'a>>> {
        if self.pos >= self.bounds.end() {
            return Ok(None);
        }
        let mut unread = raw
            .get(self.pos..self.bounds.end())
            .ok_or(err_malformed!("track cursor out of bounds"))?;
        let origlen = unread.len();
        let mut status = self.status;
        let ev = read_event(&mut unread, &mut status).map_err(|err| err.at_position(self.pos))?;
        self.pos += origlen - unread.len();
        self.status = status;
        Ok(Some(ev))
    }

    /// Decode the next event and update the tick rate of the track.
    pub fn advance<'a>(
        &mut self,
        raw: &'a [u8],
        clock: &TickClock,
        mode: TempoMode,
        tempo_map: &TempoMap,
    ) -> Result<Option<TrackEvent<'a>>> {
        let ev = match self.read(raw)? {
            Some(ev) => ev,
            None => return Ok(None),
        };
        match mode {
            TempoMode::Fixed => {}
            TempoMode::PerTrack => {
                if let Some(micros) = ev.bytes.tempo() {
                    self.tick_seconds = clock.tempo_tick_seconds(micros);
                } else if ev.bytes.meta_type() == Some(META_TEMPO) {
                    tracing::warn!(
                        position = self.pos,
                        "ignoring tempo event without a 3-byte payload"
                    );
                }
            }
            TempoMode::Shared => {
                self.ticks = self.ticks.wrapping_add(ev.delta);
                let changes = tempo_map.changes();
                while let Some(next) = changes.get(self.tempo_index + 1) {
                    if self.ticks < next.tick {
                        break;
                    }
                    self.tempo_index += 1;
                    self.tick_seconds = next.tick_seconds;
                }
            }
        }
        Ok(Some(ev))
    }
}

/// An iterator over the events of a single track.
/// Yielded by [`Smf::events`](struct.Smf.html#method.events).
///
/// This iterator is lazy, it decodes events as it goes, and therefore produces
/// `Result<TrackEvent>` rather than `TrackEvent`.
/// It has its own cursor, independent from the cursors stored in the `Smf`.
/// After an error it stops yielding events.
#[derive(Clone, Debug)]
pub struct EventIter<'a> {
    raw: &'a [u8],
    cursor: TrackCursor,
    track: usize,
    clock: TickClock,
    mode: TempoMode,
    tempo_map: &'a TempoMap,
    failed: bool,
}
impl<'a> EventIter<'a> {
    pub(crate) fn new(
        raw: &'a [u8],
        cursor: TrackCursor,
        track: usize,
        clock: TickClock,
        mode: TempoMode,
        tempo_map: &'a TempoMap,
    ) -> EventIter<'a> {
        EventIter {
            raw,
            cursor,
            track,
            clock,
            mode,
            tempo_map,
            failed: false,
        }
    }

    /// Get the remaining unread bytes of the track.
    #[inline]
    pub fn unread(&self) -> &'a [u8] {
        let end = self.cursor.bounds().end();
        &self.raw[self.cursor.position().min(end)..end]
    }

    /// Get the current running status of the track.
    #[inline]
    pub fn running_status(&self) -> RunningStatus {
        self.cursor.running_status()
    }

    /// The seconds-per-tick rate in effect after the last yielded event.
    #[inline]
    pub fn tick_seconds(&self) -> f64 {
        self.cursor.tick_seconds()
    }
}
impl<'a> Iterator for EventIter<'a> {
    type Item = Result<TrackEvent<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let res = self
            .cursor
            .advance(self.raw, &self.clock, self.mode, self.tempo_map)
            .map_err(|err| err.at_track(self.track));
        if res.is_err() {
            self.failed = true;
        }
        res.transpose()
    }
}
