// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Decoding compressed or PCM audio into an [`AudioAsset`].

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use crate::asset::AudioAsset;

/// Errors loading a sample.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to decode audio: {0}")]
    Decode(#[from] SymphoniaError),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("sample rate not specified")]
    UnknownSampleRate,

    #[error("sample contains no audio")]
    Empty,
}

/// Reads and decodes the file at `path`. The path becomes the asset id.
pub fn decode_file(path: &Path) -> Result<AudioAsset, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let extension = path.extension().and_then(|ext| ext.to_str());
    decode_bytes(&path.display().to_string(), bytes, extension)
}

/// Decodes an in-memory file. `extension` is a hint for the format probe.
pub fn decode_bytes(
    id: &str,
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<AudioAsset, LoadError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(LoadError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut planar: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) if !planar.is_empty() => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if decoded.frames() == 0 {
            continue;
        }
        sample_rate.get_or_insert(spec.rate);

        let mut buffer = AudioBuffer::<f32>::new(decoded.capacity() as u64, spec);
        decoded.convert(&mut buffer);

        let channels = spec.channels.count();
        if planar.is_empty() {
            planar = vec![Vec::new(); channels];
        }
        for (ch, samples) in planar.iter_mut().enumerate().take(channels) {
            samples.extend_from_slice(buffer.chan(ch));
        }
    }

    let sample_rate = sample_rate.ok_or(LoadError::UnknownSampleRate)?;
    let asset = AudioAsset::from_planar(id, sample_rate, planar)
        .filter(|asset| asset.frames() > 0)
        .ok_or(LoadError::Empty)?;
    debug!(
        id,
        sample_rate,
        channels = asset.source_channels(),
        frames = asset.frames(),
        "Decoded sample"
    );
    Ok(asset)
}
