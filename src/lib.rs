//! # Overview
//!
//! `smfread` is a low-level Standard Midi File (SMF) decoder.
//! It indexes the tracks of a `.mid` file held in memory and hands out raw events one at a time,
//! together with the delta-time since the previous event and the current seconds-per-tick rate.
//!
//! ```rust
//! use smfread::Smf;
//!
//! # fn read_file() -> Vec<u8> {
//! #     b"MThd\0\0\0\x06\0\0\0\x01\x01\xE0MTrk\0\0\0\x04\0\xFF\x2F\0".to_vec()
//! # }
//! let bytes = read_file();
//! let mut smf = Smf::parse(&bytes).unwrap();
//!
//! let mut tick = 0;
//! while let Some(ev) = smf.next_event(0).unwrap() {
//!     tick += ev.delta;
//!     println!("{} {:02X?} ({}s/tick)", tick, ev.bytes.as_bytes(), smf.tick_seconds(0).unwrap());
//! }
//! ```
//!
//! # Cursors
//!
//! Every track has its own cursor inside the [`Smf`](struct.Smf.html) value, advanced with
//! [`Smf::next_event`](struct.Smf.html#method.next_event) and reset with
//! [`Smf::rewind_track`](struct.Smf.html#method.rewind_track).
//! Cursors keep the MIDI running status and the tick rate, so events come out with their status
//! byte always present, even if the file omitted it.
//!
//! When several independent readers are needed, [`Smf::events`](struct.Smf.html#method.events)
//! builds a fresh iterator that does not touch the cursors of the `Smf`.
//!
//! # Timing
//!
//! The seconds-per-tick rate depends on the file division and on tempo meta-events:
//!
//! - Timecode files have a fixed rate, `1 / (fps * ticks_per_frame)`.
//! - Format 0 and 2 files update the rate of a track as soon as a tempo event is read from it.
//! - Format 1 files share a [`TempoMap`](struct.TempoMap.html), built from the first track while
//!   parsing. Every track adopts the tempo changes once its own tick count reaches them.
//!
//! # About features
//!
//! - The `std` feature (enabled by default)
//!
//!   Implements `std::error::Error` for [`Error`](struct.Error.html) and enables loading a
//!   [`Sequence`](struct.Sequence.html) straight from a file or reader.
//!   Disabling this feature makes the crate `no_std + alloc`.
//!
//! - The `parallel` feature (enabled by default)
//!
//!   Collects the tracks of large files into a `Sequence` using several threads, through the
//!   `rayon` dependency.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{Error, ErrorKind, Result, ResultExt, StdResult},
        primitive::{read_u16, read_u32, read_u8, read_varlen, SplitChecked},
    };
    pub(crate) use alloc::{string::String, vec, vec::Vec};
    pub(crate) use core::{convert::TryFrom, fmt, ops::Range};
}

mod event;
mod primitive;
mod sequence;
mod smf;
mod tempo;

pub use crate::{
    error::{Error, ErrorKind, Result},
    event::{EventBytes, EventIter, RunningStatus, TrackEvent},
    primitive::{decode_varlen, Format, Fps, Timing},
    sequence::{Sequence, SequenceTrack, TimedEvent},
    smf::{Header, Smf},
    tempo::{TempoChange, TempoMap, TickClock, DEFAULT_TEMPO},
};
