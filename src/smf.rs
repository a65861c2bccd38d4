//! Specific to the SMF packaging of MIDI streams.

use crate::{
    event::{EventIter, RunningStatus, TrackBounds, TrackCursor, TrackEvent},
    prelude::*,
    primitive::{Format, Timing},
    tempo::{TempoMap, TempoMode, TickClock},
};

/// Size of the `MThd` chunk, including its id and length.
const HEADER_CHUNK_LEN: usize = 4 + 4 + 6;

/// A MIDI file header.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Header {
    /// How the tracks of the file relate to each other.
    pub format: Format,
    /// The division field: ticks per beat, or SMPTE frames and ticks per frame.
    pub timing: Timing,
}
impl Header {
    pub fn new(format: Format, timing: Timing) -> Header {
        Header { format, timing }
    }

    /// Read both the header and the track count from the start of the file.
    ///
    /// The slice is advanced past the header chunk.
    pub(crate) fn read(raw: &mut &[u8]) -> Result<(Header, u16)> {
        let id = raw
            .split_checked(4)
            .ok_or(err_invalid!("failed to read header chunk id"))?;
        ensure!(id == b"MThd", err_invalid!("invalid header chunk id, expected MThd"));
        let len = read_u32(raw).context(err_invalid!("failed to read header chunk length"))?;
        ensure!(len == 6, err_invalid!("header chunk length is not 6"));
        let format = read_u16(raw).context(err_invalid!("failed to read smf format"))?;
        let format = Format::from_bits(format)?;
        let track_count = read_u16(raw).context(err_invalid!("failed to read track count"))?;
        ensure!(
            format != Format::SingleTrack || track_count == 1,
            err_invalid!("singletrack format file must have exactly one track")
        );
        let timing = Timing::read(raw)?;
        Ok((Header::new(format, timing), track_count))
    }
}

/// Locate `track_count` consecutive `MTrk` chunks, starting at byte `offset` of `raw`.
fn index_tracks(raw: &[u8], offset: usize, track_count: u16) -> Result<Vec<TrackBounds>> {
    let mut unread = raw.get(offset..).unwrap_or(&[]);
    let mut tracks = Vec::with_capacity(track_count as usize);
    for track in 0..track_count as usize {
        let chunk_start = raw.len() - unread.len();
        let read_chunk = |unread: &mut &[u8]| -> Result<TrackBounds> {
            let id = unread
                .split_checked(4)
                .ok_or(err_invalid!("reached eof before track chunk"))?;
            ensure!(id == b"MTrk", err_invalid!("invalid track chunk id, expected MTrk"));
            let len =
                read_u32(unread).context(err_invalid!("failed to read track chunk length"))?;
            let offset = raw.len() - unread.len();
            usize::try_from(len)
                .ok()
                .and_then(|len| unread.split_checked(len))
                .ok_or(err_invalid!("track chunk runs past end of file"))?;
            Ok(TrackBounds {
                offset,
                len: len as usize,
            })
        };
        let bounds = read_chunk(&mut unread)
            .map_err(|err| err.at_track(track).at_position(chunk_start))?;
        tracks.push(bounds);
    }
    Ok(tracks)
}

fn no_such_track(track: usize) -> Error {
    Error::from(err_usage!("track index out of range")).at_track(track)
}

/// A Standard Midi File, indexed and ready to be decoded track by track.
///
/// The `Smf` borrows the raw file bytes, so these must be loaded beforehand.
/// Each track has an independent cursor: the position of the next event, the running status and
/// the current seconds-per-tick rate.
///
/// Tracks are identified by their index, in file order. Using an index equal or larger than
/// [`track_count`](#method.track_count) produces an error of kind `ErrorKind::Usage`.
#[derive(Clone, Debug)]
pub struct Smf<'a> {
    raw: &'a [u8],
    header: Header,
    clock: TickClock,
    mode: TempoMode,
    tempo_map: TempoMap,
    cursors: Vec<TrackCursor>,
}
impl<'a> Smf<'a> {
    /// Parse the header, locate every track and, for format 1 files with metrical timing, build
    /// the shared tempo map out of the first track.
    ///
    /// Any structural problem aborts parsing. A corrupted first track also aborts parsing when
    /// the tempo map is built out of it.
    pub fn parse(raw: &'a [u8]) -> Result<Smf<'a>> {
        let mut unread = raw;
        let (header, track_count) = Header::read(&mut unread)
            .map_err(|err| err.at_position(0))
            .context(err_invalid!("invalid midi header"))?;
        let tracks = index_tracks(raw, HEADER_CHUNK_LEN, track_count)?;

        let clock = TickClock::new(header.timing);
        let mode = TempoMode::select(header.format, header.timing);
        let tempo_map = match (mode, tracks.first()) {
            (TempoMode::Shared, Some(&track0)) => TempoMap::build(raw, track0, &clock)
                .context(err_malformed!("failed to build tempo map"))?,
            _ => TempoMap::new(clock.default_tick_seconds()),
        };
        let initial = tempo_map.initial();
        let cursors = tracks
            .into_iter()
            .map(|bounds| TrackCursor::new(bounds, initial))
            .collect::<Vec<_>>();

        tracing::debug!(
            format = ?header.format,
            timing = ?header.timing,
            tracks = cursors.len(),
            tempo_changes = tempo_map.len(),
            "parsed midi file"
        );
        Ok(Smf {
            raw,
            header,
            clock,
            mode,
            tempo_map,
            cursors,
        })
    }

    #[inline]
    fn cursor(&self, track: usize) -> Result<&TrackCursor> {
        self.cursors.get(track).ok_or_else(|| no_such_track(track))
    }

    #[inline]
    fn cursor_mut(&mut self, track: usize) -> Result<&mut TrackCursor> {
        self.cursors.get_mut(track).ok_or_else(|| no_such_track(track))
    }

    /// Decode the next event of a track and advance its cursor.
    ///
    /// Returns `Ok(None)` once the cursor reaches the declared end of the track, and keeps doing
    /// so on later calls.
    /// Events always include their status byte, even if the file relied on running status.
    ///
    /// If the event is corrupted an error of kind `ErrorKind::Malformed` is returned and the
    /// cursor stays at the start of the broken event.
    pub fn next_event(&mut self, track: usize) -> Result<Option<TrackEvent<'a>>> {
        let raw = self.raw;
        let clock = self.clock;
        let mode = self.mode;
        let cursor = self.cursors.get_mut(track).ok_or_else(|| no_such_track(track))?;
        cursor
            .advance(raw, &clock, mode, &self.tempo_map)
            .map_err(|err| err.at_track(track))
    }

    /// Like [`next_event`](#method.next_event), but skips meta and SysEx events, yielding only
    /// channel events.
    ///
    /// Skipped events are discarded along with their delta-times: the returned delta is the one
    /// stored with the channel event itself. Tempo events are still applied to the tick rate.
    pub fn next_midi_event(&mut self, track: usize) -> Result<Option<TrackEvent<'a>>> {
        while let Some(ev) = self.next_event(track)? {
            if ev.bytes.is_channel() {
                return Ok(Some(ev));
            }
        }
        Ok(None)
    }

    /// Move the cursor of a track back to its first event.
    ///
    /// Running status is cleared and the tick rate goes back to the initial entry of the tempo
    /// map.
    pub fn rewind_track(&mut self, track: usize) -> Result<()> {
        let initial = self.tempo_map.initial();
        self.cursor_mut(track)?.rewind(initial);
        Ok(())
    }

    /// The seconds-per-tick rate at the current cursor position of a track.
    pub fn tick_seconds(&self, track: usize) -> Result<f64> {
        Ok(self.cursor(track)?.tick_seconds())
    }

    /// An independent iterator over the events of a track, starting from its first event.
    ///
    /// The cursor stored in the `Smf` for this track is not affected.
    pub fn events(&self, track: usize) -> Result<EventIter<'_>> {
        let mut cursor = self.cursor(track)?.clone();
        cursor.rewind(self.tempo_map.initial());
        Ok(EventIter::new(
            self.raw,
            cursor,
            track,
            self.clock,
            self.mode,
            &self.tempo_map,
        ))
    }

    #[inline]
    pub fn header(&self) -> Header {
        self.header
    }

    #[inline]
    pub fn format(&self) -> Format {
        self.header.format
    }

    #[inline]
    pub fn timing(&self) -> Timing {
        self.header.timing
    }

    /// Whether the file division uses SMPTE timecode.
    #[inline]
    pub fn is_timecode(&self) -> bool {
        self.header.timing.is_timecode()
    }

    /// The number of tracks in the file.
    #[inline]
    pub fn track_count(&self) -> usize {
        self.cursors.len()
    }

    #[inline]
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// The tempo map shared by all tracks.
    ///
    /// Only format 1 files with metrical timing have more than the initial entry.
    #[inline]
    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    /// The raw file bytes.
    #[inline]
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    /// The byte range of the event stream of a track, within the raw file bytes.
    pub fn track_bounds(&self, track: usize) -> Result<Range<usize>> {
        Ok(self.cursor(track)?.bounds().range())
    }

    /// The absolute byte position of the next event of a track.
    ///
    /// Equals the end of [`track_bounds`](#method.track_bounds) once the track is exhausted.
    pub fn track_position(&self, track: usize) -> Result<usize> {
        Ok(self.cursor(track)?.position())
    }

    pub fn running_status(&self, track: usize) -> Result<RunningStatus> {
        Ok(self.cursor(track)?.running_status())
    }
}
