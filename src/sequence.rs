//! Owned, absolute-tick view of a whole file.

use crate::{
    prelude::*,
    primitive::{Format, Timing},
    smf::Smf,
    tempo::TempoMap,
};

/// The meta-event type carrying the name of a track.
const META_TRACK_NAME: u8 = 0x03;

/// How many bytes must a MIDI file have in order to enable multithreading.
#[cfg(feature = "parallel")]
const PARALLEL_ENABLE_THRESHOLD: usize = 3 * 1024;

/// How many events per byte to estimate when allocating memory for events.
///
/// Real-world files sit a little above 3 bytes per event when running status is used.
const BYTES_TO_EVENTS: f32 = 1.0 / 3.0;

/// A raw event placed at an absolute tick.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct TimedEvent {
    /// Ticks since the start of the track.
    pub tick: u64,
    /// The raw event bytes, status byte included.
    pub bytes: Vec<u8>,
}

/// All the events of a track, with absolute ticks.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SequenceTrack {
    /// The contents of the first track name meta event, if there is one.
    pub name: Option<String>,
    pub events: Vec<TimedEvent>,
}
impl SequenceTrack {
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The absolute tick of the last event, that is, the length of the track in ticks.
    pub fn end_tick(&self) -> u64 {
        self.events.last().map(|ev| ev.tick).unwrap_or(0)
    }
}

/// A fully decoded file: every track collected into a list of events with absolute ticks.
///
/// Unlike [`Smf`](struct.Smf.html), a `Sequence` owns all of its data.
#[derive(Clone, PartialEq, Debug)]
pub struct Sequence {
    pub format: Format,
    pub timing: Timing,
    pub tempo_map: TempoMap,
    pub tracks: Vec<SequenceTrack>,
}
impl Sequence {
    /// Decode every track of the file.
    ///
    /// Any malformed track fails the whole operation.
    /// With the `parallel` feature, tracks of large files are decoded on several threads.
    pub fn from_smf(smf: &Smf) -> Result<Sequence> {
        let tracks = collect_tracks(smf)?;
        Ok(Sequence {
            format: smf.format(),
            timing: smf.timing(),
            tempo_map: smf.tempo_map().clone(),
            tracks,
        })
    }

    /// Parse and decode a file held in memory.
    pub fn parse(raw: &[u8]) -> Result<Sequence> {
        Sequence::from_smf(&Smf::parse(raw)?)
    }

    /// Read a file from a reader until EOF, then parse and decode it.
    #[cfg(feature = "std")]
    pub fn read<R: std::io::Read>(mut reader: R) -> std::io::Result<Sequence> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Sequence::parse(&raw)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    /// Load, parse and decode a `.mid` file.
    #[cfg(feature = "std")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Sequence> {
        fn open_impl(path: &std::path::Path) -> std::io::Result<Sequence> {
            Sequence::read(std::fs::File::open(path)?)
        }
        open_impl(path.as_ref())
    }
}

fn collect_tracks(smf: &Smf) -> Result<Vec<SequenceTrack>> {
    //Attempt to use multiple threads if possible and advantageous
    #[cfg(feature = "parallel")]
    {
        if smf.raw().len() >= PARALLEL_ENABLE_THRESHOLD {
            use rayon::prelude::*;

            return (0..smf.track_count())
                .into_par_iter()
                .map(|track| collect_track(smf, track))
                .collect::<Result<Vec<_>>>();
        }
    }
    //Fall back to single-threaded
    (0..smf.track_count())
        .map(|track| collect_track(smf, track))
        .collect::<Result<Vec<_>>>()
}

fn collect_track(smf: &Smf, track: usize) -> Result<SequenceTrack> {
    let track_len = smf.track_bounds(track)?.len();
    let mut out = SequenceTrack {
        name: None,
        events: Vec::with_capacity((track_len as f32 * BYTES_TO_EVENTS) as usize),
    };
    let mut tick: u64 = 0;
    for ev in smf.events(track)? {
        let ev = ev?;
        tick = tick.wrapping_add(ev.delta);
        if out.name.is_none() && ev.bytes.meta_type() == Some(META_TRACK_NAME) {
            out.name = ev
                .bytes
                .payload()
                .map(|name| String::from_utf8_lossy(name).into_owned());
        }
        out.events.push(TimedEvent {
            tick,
            bytes: ev.bytes.to_vec(),
        });
    }
    Ok(out)
}
