use std::path::Path;

use anyhow::{anyhow, Context, Result};

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

use crate::config::RunConfig;

/// How to load one file: taken from the run configuration.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Target sample rate; `None` keeps the file's native rate.
    pub sample_rate: Option<u32>,
    /// Downmix all channels to mono. When false, channel 0 is kept as-is.
    pub mono: bool,
    /// Seconds to skip from the start of the file.
    pub offset: f64,
    /// Maximum seconds to load; `None` loads the whole file.
    pub duration: Option<f64>,
}

impl From<&RunConfig> for DecodeOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            mono: config.mono,
            offset: config.offset,
            duration: config.duration,
        }
    }
}

/// A single-channel waveform and the rate it ended up at.
#[derive(Debug, Clone)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file to mono f32 samples, honoring offset, duration,
/// downmix, and target sample rate.
pub fn decode_file(path: &Path, opts: &DecodeOptions) -> Result<Waveform> {
    let (interleaved, sr_in, channels) = decode_interleaved(path)?;

    let trimmed = trim(interleaved, sr_in, channels, opts.offset, opts.duration);
    if trimmed.is_empty() {
        return Err(anyhow!("no samples left after applying offset/duration"));
    }

    let mono = to_single_channel(trimmed, channels, opts.mono);

    match opts.sample_rate {
        Some(target) if target != sr_in => {
            let samples = resample(&mono, sr_in, target)?;
            Ok(Waveform { samples, sample_rate: target })
        }
        Some(target) => Ok(Waveform { samples: mono, sample_rate: target }),
        None => Ok(Waveform { samples: mono, sample_rate: sr_in }),
    }
}

/// Decode the whole file with symphonia into interleaved f32.
fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, u32, usize)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint from extension (optional but helps).
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("unsupported format or failed to probe container")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio tracks found"))?;

    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder for selected track")?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = track.codec_params.sample_rate;
    let mut channels: Option<usize> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("decoder reset required (chained streams)"));
            }
            Err(SymphoniaError::IoError(_)) => break, // end of file
            Err(e) => return Err(e).context("error reading next packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::IoError(_)) => continue,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("decoder reset required mid-stream"));
            }
            Err(e) => return Err(e).context("unrecoverable decode error"),
        };

        sample_rate.get_or_insert(decoded.spec().rate);
        channels.get_or_insert(decoded.spec().channels.count());

        let mut sbuf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sbuf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sbuf.samples());
    }

    let sr = sample_rate.ok_or_else(|| anyhow!("could not determine input sample rate"))?;
    let ch = channels.ok_or_else(|| anyhow!("could not determine channel count"))?;
    if interleaved.is_empty() {
        return Err(anyhow!("decoded audio was empty"));
    }

    Ok((interleaved, sr, ch))
}

/// Apply start offset and maximum duration at the native rate, in whole
/// frames so channels stay aligned.
fn trim(
    interleaved: Vec<f32>,
    sample_rate: u32,
    channels: usize,
    offset: f64,
    duration: Option<f64>,
) -> Vec<f32> {
    let total_frames = interleaved.len() / channels;
    let skip = ((offset * sample_rate as f64) as usize).min(total_frames);
    let take = duration
        .map(|d| (d * sample_rate as f64) as usize)
        .unwrap_or(total_frames - skip)
        .min(total_frames - skip);

    if skip == 0 && take == total_frames {
        return interleaved;
    }
    interleaved[skip * channels..(skip + take) * channels].to_vec()
}

/// Downmix to mono by averaging, or keep channel 0 when downmix is off.
fn to_single_channel(interleaved: Vec<f32>, channels: usize, downmix: bool) -> Vec<f32> {
    if channels == 1 {
        return interleaved;
    }
    let frames = interleaved.len() / channels;
    let mut out = Vec::with_capacity(frames);
    if downmix {
        for f in 0..frames {
            let base = f * channels;
            let sum: f32 = interleaved[base..base + channels].iter().sum();
            out.push(sum / channels as f32);
        }
    } else {
        for f in 0..frames {
            out.push(interleaved[f * channels]);
        }
    }
    out
}

/// Resample a mono clip with rubato's FFT resampler.
fn resample(mono: &[f32], sr_in: u32, sr_out: u32) -> Result<Vec<f32>> {
    // For offline processing a fixed input chunk of 1024 frames is fine.
    let chunk_size: usize = 1024;
    let sub_chunks: usize = 1;

    let mut resampler = Fft::<f32>::new(
        sr_in as usize,
        sr_out as usize,
        chunk_size,
        sub_chunks,
        1, // mono
        FixedSync::Input,
    )
    .context("failed to construct FFT resampler")?;

    let input_frames = mono.len();
    let out_frames = resampler.process_all_needed_output_len(input_frames);
    let mut out = vec![0.0f32; out_frames];

    let input_adapter =
        InterleavedSlice::new(mono, 1, input_frames).context("bad input adapter")?;
    let mut output_adapter =
        InterleavedSlice::new_mut(&mut out, 1, out_frames).context("bad output adapter")?;

    let (_frames_read, frames_written) = resampler.process_all_into_buffer(
        &input_adapter,
        &mut output_adapter,
        input_frames,
        None,
    )?;

    out.truncate(frames_written);
    Ok(out)
}
