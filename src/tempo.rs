//! Tick rates and the tempo map.

use crate::{
    event::{TrackBounds, TrackCursor},
    prelude::*,
    primitive::{Format, Timing},
};

/// The tempo assumed before any tempo event, in microseconds per quarter note (120 BPM).
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Converts ticks to seconds for a given file division.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TickClock {
    timing: Timing,
}
impl TickClock {
    pub fn new(timing: Timing) -> TickClock {
        TickClock { timing }
    }

    #[inline]
    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Ticks per quarter note for metrical timing, or ticks per second for timecode.
    pub fn tick_rate(&self) -> f64 {
        match self.timing {
            Timing::Metrical(tpb) => f64::from(tpb & 0x7FFF),
            Timing::Timecode(fps, subframe) => fps.as_f64() * f64::from(subframe),
        }
    }

    /// Seconds per tick before any tempo event applies.
    ///
    /// For metrical timing this assumes [`DEFAULT_TEMPO`](constant.DEFAULT_TEMPO.html).
    pub fn default_tick_seconds(&self) -> f64 {
        match self.timing {
            Timing::Metrical(_) => self.tempo_tick_seconds(DEFAULT_TEMPO),
            Timing::Timecode(..) => 1.0 / self.tick_rate(),
        }
    }

    /// Seconds per tick under the given tempo, in microseconds per quarter note.
    ///
    /// Timecode files ignore tempo, so the default rate is returned for them.
    pub fn tempo_tick_seconds(&self, micros_per_beat: u32) -> f64 {
        match self.timing {
            Timing::Metrical(_) => 0.000_001 * f64::from(micros_per_beat) / self.tick_rate(),
            Timing::Timecode(..) => self.default_tick_seconds(),
        }
    }
}

/// How the tick rate of each track evolves while decoding.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum TempoMode {
    /// Timecode files: the rate never changes.
    Fixed,
    /// Tempo events update the rate of the track they belong to.
    PerTrack,
    /// All tracks follow the tempo map built from the first track.
    Shared,
}
impl TempoMode {
    pub fn select(format: Format, timing: Timing) -> TempoMode {
        match (format, timing) {
            (_, Timing::Timecode(..)) => TempoMode::Fixed,
            (Format::Parallel, Timing::Metrical(_)) => TempoMode::Shared,
            _ => TempoMode::PerTrack,
        }
    }
}

/// A tempo change at an absolute tick position.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct TempoChange {
    /// Absolute tick where the change applies.
    pub tick: u64,
    /// Seconds per tick from this point on.
    pub tick_seconds: f64,
}

/// The ordered list of tempo changes shared by all tracks of a format 1 file.
///
/// There is always at least one entry, at tick 0.
/// For other formats the map only holds this initial entry.
#[derive(Clone, PartialEq, Debug)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}
impl TempoMap {
    pub(crate) fn new(initial: f64) -> TempoMap {
        TempoMap {
            changes: vec![TempoChange {
                tick: 0,
                tick_seconds: initial,
            }],
        }
    }

    /// Run a throwaway cursor over the first track, collecting every tempo event.
    pub(crate) fn build(raw: &[u8], track0: TrackBounds, clock: &TickClock) -> Result<TempoMap> {
        let mut map = TempoMap::new(clock.default_tick_seconds());
        let mut cursor = TrackCursor::new(track0, map.initial());
        let mut ticks: u64 = 0;
        while let Some(ev) = cursor.read(raw).map_err(|err| err.at_track(0))? {
            ticks = ticks.wrapping_add(ev.delta);
            if let Some(micros) = ev.bytes.tempo() {
                let tick_seconds = clock.tempo_tick_seconds(micros);
                tracing::trace!(tick = ticks, micros, "tempo change");
                map.push(ticks, tick_seconds);
            }
        }
        Ok(map)
    }

    /// Append a change, replacing the last one if it happens at the same tick.
    fn push(&mut self, tick: u64, tick_seconds: f64) {
        let change = TempoChange { tick, tick_seconds };
        match self.changes.last_mut() {
            Some(last) if last.tick >= tick => *last = change,
            _ => self.changes.push(change),
        }
    }

    /// All changes, sorted by tick. The first one is always at tick 0.
    #[inline]
    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// The seconds-per-tick rate at tick 0.
    #[inline]
    pub fn initial(&self) -> f64 {
        self.changes[0].tick_seconds
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always `false`, there is at least an initial entry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The seconds-per-tick rate in effect at the given absolute tick.
    pub fn rate_at(&self, tick: u64) -> f64 {
        let idx = self.changes.partition_point(|change| change.tick <= tick);
        self.changes[idx.saturating_sub(1)].tick_seconds
    }

    /// Wall-clock time, in seconds, of the given absolute tick.
    pub fn seconds_at(&self, tick: u64) -> f64 {
        let mut secs = 0.0;
        for (i, change) in self.changes.iter().enumerate() {
            if change.tick >= tick {
                break;
            }
            let until = match self.changes.get(i + 1) {
                Some(next) if next.tick < tick => next.tick,
                _ => tick,
            };
            secs += (until - change.tick) as f64 * change.tick_seconds;
        }
        secs
    }
}
