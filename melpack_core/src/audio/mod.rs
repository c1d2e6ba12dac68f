//! Audio loading: symphonia decode, offset/duration trimming, mono
//! downmix, rubato resampling.

mod decode;

pub use decode::{decode_file, DecodeOptions, Waveform};
