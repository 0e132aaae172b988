// Loop decoding - WAV (hound) and FLAC (claxon) into interleaved f32

use std::path::Path;

use claxon::FlacReader;
use hound::{SampleFormat, WavReader};

use crate::assets::AssetLoadError;
use crate::audio::buffer::AudioBuffer;

/// Decode an audio file into a loop-ready buffer
///
/// The format is picked from the extension (`wav` or `flac`, case-insensitive).
/// Decoding is blocking; async callers go through `spawn_blocking`.
pub fn decode_file(path: &Path) -> Result<AudioBuffer, AssetLoadError> {
    if !path.is_file() {
        return Err(AssetLoadError::NotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();

    let buffer = match extension.as_str() {
        "wav" => decode_wav(path)?,
        "flac" => decode_flac(path)?,
        _ => return Err(AssetLoadError::Unsupported(extension)),
    };

    if buffer.is_empty() {
        return Err(AssetLoadError::Empty(path.display().to_string()));
    }
    Ok(buffer)
}

fn wav_error(error: hound::Error) -> AssetLoadError {
    match error {
        hound::Error::IoError(e) => AssetLoadError::Io(e),
        other => AssetLoadError::Decode(other.to_string()),
    }
}

fn flac_error(error: claxon::Error) -> AssetLoadError {
    match error {
        claxon::Error::IoError(e) => AssetLoadError::Io(e),
        other => AssetLoadError::Decode(other.to_string()),
    }
}

fn decode_wav(path: &Path) -> Result<AudioBuffer, AssetLoadError> {
    let reader = WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wav_error)?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(wav_error)?
        }
    };

    Ok(AudioBuffer::new(samples, spec.channels, spec.sample_rate))
}

fn decode_flac(path: &Path) -> Result<AudioBuffer, AssetLoadError> {
    let mut reader = FlacReader::open(path).map_err(flac_error)?;
    let info = reader.streaminfo();
    let scale = 1.0 / (1u64 << (info.bits_per_sample.max(1) - 1)) as f32;

    let samples = reader
        .samples()
        .map(|s| s.map(|v| v as f32 * scale))
        .collect::<Result<Vec<_>, _>>()
        .map_err(flac_error)?;

    Ok(AudioBuffer::new(samples, info.channels as u16, info.sample_rate))
}
