//! Simple building-block data that can be read in one go.
//! Primitives advance the slice they are read from.

use crate::prelude::*;

pub(crate) trait SplitChecked: Sized {
    fn split_checked(&mut self, at: usize) -> Option<Self>;
}
impl<'a> SplitChecked for &'a [u8] {
    #[inline]
    fn split_checked(&mut self, at: usize) -> Option<&'a [u8]> {
        if at > self.len() {
            None
        } else {
            let (extracted, remainder) = self.split_at(at);
            *self = remainder;
            Some(extracted)
        }
    }
}

/// Implement simple big endian integer reads.
macro_rules! impl_read_int {
    {$( $name:ident : $int:ty ),*} => {
        $(
            #[inline]
            pub(crate) fn $name(raw: &mut &[u8]) -> StdResult<$int, &'static ErrorKind> {
                let bytes = raw
                    .split_checked(core::mem::size_of::<$int>())
                    .ok_or(err_invalid!("failed to read the expected integer"))?;
                Ok(bytes.iter().fold(0, |acc, byte| acc << 8 | *byte as $int))
            }
        )*
    }
}
impl_read_int! {read_u16: u16, read_u32: u32}

#[inline]
pub(crate) fn read_u8(raw: &mut &[u8]) -> Option<u8> {
    raw.split_checked(1).map(|byte| byte[0])
}

/// Reads a variable-length quantity: 7 bits per byte, most significant group first, with the top
/// bit of every byte but the last one set.
///
/// There is no limit on the amount of bytes. Bits beyond the 64th are shifted out.
pub(crate) fn read_varlen(raw: &mut &[u8]) -> StdResult<u64, &'static ErrorKind> {
    let mut int: u64 = 0;
    loop {
        let byte = read_u8(raw).ok_or(err_malformed!("varlen integer runs past end of data"))?;
        int = int << 7 | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok(int);
        }
    }
}

/// Decode a variable-length quantity from `buf`, starting at byte `offset`.
///
/// Returns the decoded value along with the offset of the first byte after it.
/// Fails if `offset` is out of range, or if the buffer ends before the last byte of the integer
/// (the one with the top bit clear).
///
/// ```rust
/// # use smfread::decode_varlen;
/// let buf = [0x00, 0x81, 0x00, 0x7F];
/// assert_eq!(decode_varlen(&buf, 1).unwrap(), (128, 3));
/// assert_eq!(decode_varlen(&buf, 3).unwrap(), (127, 4));
/// ```
pub fn decode_varlen(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut raw = buf
        .get(offset..)
        .ok_or(err_usage!("varlen offset out of range"))?;
    let origlen = raw.len();
    let int = read_varlen(&mut raw).map_err(|err| Error::from(err).at_position(offset))?;
    Ok((int, offset + origlen - raw.len()))
}

/// Skips a slice represented in the input as a varlen length followed by that many bytes.
pub(crate) fn skip_varlen_slice(raw: &mut &[u8]) -> Result<()> {
    let len = read_varlen(raw).context(err_malformed!("failed to read varlen slice length"))?;
    usize::try_from(len)
        .ok()
        .and_then(|len| raw.split_checked(len))
        .ok_or(err_malformed!("varlen slice runs past end of track"))?;
    Ok(())
}

/// The order in which tracks should be laid out when playing back this SMF file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
#[repr(u8)]
pub enum Format {
    /// This file should have a single track only.
    SingleTrack,
    /// This file has several tracks that should be played simultaneously.
    ///
    /// The first track carries the tempo map shared by all tracks.
    Parallel,
    /// This file has several tracks, each one a separate song.
    ///
    /// The tracks should be played sequentially, as completely separate MIDI tracks packaged
    /// within a single SMF file.
    Sequential,
}
impl Format {
    pub fn from_bits(bits: u16) -> Result<Format> {
        Ok(match bits {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => bail!(err_invalid!("invalid smf format")),
        })
    }

    pub fn as_bits(&self) -> u16 {
        *self as u8 as u16
    }
}

/// The timing for an SMF file.
/// This can be in ticks/beat or ticks/second.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Timing {
    /// Specifies ticks/beat as a 15-bit integer.
    ///
    /// The length of a beat is not fixed, tempo meta-events define it. Until the first tempo
    /// event a beat lasts half a second (120 beats per minute).
    Metrical(u16),
    /// Specifies ticks/second by dividing a second into frames and then into subframes.
    /// Therefore the length of of a tick is `1/fps/subframe`.
    Timecode(Fps, u8),
}
impl Timing {
    pub(crate) fn read(raw: &mut &[u8]) -> Result<Timing> {
        let raw = read_u16(raw).context(err_invalid!("unexpected eof when reading midi timing"))?;
        if raw & 0x8000 != 0 {
            //Timecode
            let fps = ((raw >> 8) as i8).wrapping_neg();
            let subframe = (raw & 0xFF) as u8;
            let fps = Fps::from_int(fps as u8).ok_or(err_invalid!("invalid smpte fps"))?;
            ensure!(subframe != 0, err_invalid!("zero ticks per frame"));
            Ok(Timing::Timecode(fps, subframe))
        } else {
            //Metrical
            ensure!(raw != 0, err_invalid!("zero ticks per beat"));
            Ok(Timing::Metrical(raw))
        }
    }

    /// Get back the raw 16-bit division field, as stored in the header.
    pub fn as_bits(&self) -> u16 {
        match *self {
            Timing::Metrical(ticksperbeat) => ticksperbeat & 0x7FFF,
            Timing::Timecode(framespersec, ticksperframe) => {
                let fps = (framespersec.as_int() as i8).wrapping_neg() as u8;
                u16::from_be_bytes([fps, ticksperframe])
            }
        }
    }

    /// Whether this timing uses SMPTE timecode rather than ticks per beat.
    #[inline]
    pub fn is_timecode(&self) -> bool {
        matches!(self, Timing::Timecode(..))
    }
}

/// One of the four FPS values available for SMPTE times, as defined by the MIDI standard.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Fps {
    /// 24 frames per second.
    Fps24,
    /// 25 frames per second.
    Fps25,
    /// Actually `29.97` frames per second (drop-frame).
    Fps29,
    /// 30 frames per second.
    Fps30,
}
impl Fps {
    /// Converts an integer representing the semantic fps to an `Fps` value (ie. `24` -> `Fps24`).
    #[inline]
    pub fn from_int(raw: u8) -> Option<Fps> {
        Some(match raw {
            24 => Fps::Fps24,
            25 => Fps::Fps25,
            29 => Fps::Fps29,
            30 => Fps::Fps30,
            _ => return None,
        })
    }

    /// Get the integral approximate fps out.
    #[inline]
    pub fn as_int(self) -> u8 {
        match self {
            Fps::Fps24 => 24,
            Fps::Fps25 => 25,
            Fps::Fps29 => 29,
            Fps::Fps30 => 30,
        }
    }

    /// Get the actual `f64` fps out.
    #[inline]
    pub fn as_f64(self) -> f64 {
        match self {
            Fps::Fps24 => 24.0,
            Fps::Fps25 => 25.0,
            Fps::Fps29 => 29.97,
            Fps::Fps30 => 30.0,
        }
    }
}
impl From<Fps> for f64 {
    fn from(x: Fps) -> Self {
        x.as_f64()
    }
}
impl From<Fps> for u8 {
    fn from(x: Fps) -> Self {
        x.as_int()
    }
}
