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
//! The cpal output stream that renders the shared graph.

use std::fmt;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::config;

use super::graph::SharedGraph;

/// Errors opening or listing output devices.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("unable to silence the audio backend: {0}")]
    Shh(#[from] std::io::Error),

    #[error("audio host unavailable: {0}")]
    HostUnavailable(#[from] cpal::HostUnavailable),

    #[error("unable to list devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("unable to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("unable to query device configuration: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("no output device found with name {0}")]
    NoDevice(String),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// An output device as reported by cpal.
pub struct DeviceInfo {
    /// The name of the device.
    pub name: String,
    /// The maximum number of channels the device supports.
    pub max_channels: u16,
    /// The host ID of the device.
    pub host_id: cpal::HostId,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Lists every output device of every available host.
pub fn list_devices() -> Result<Vec<DeviceInfo>, OutputError> {
    Ok(list_cpal_devices()?
        .into_iter()
        .map(|(info, _)| info)
        .collect())
}

fn list_cpal_devices() -> Result<Vec<(DeviceInfo, cpal::Device)>, OutputError> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);

            if max_channels > 0 {
                devices.push((
                    DeviceInfo {
                        name: device.name()?,
                        max_channels,
                        host_id,
                    },
                    device,
                ));
            }
        }
    }

    devices.sort_by_key(|(info, _)| info.name.to_string());
    Ok(devices)
}

/// A running output stream. Rendering stops when this is dropped.
pub struct Output {
    name: String,
    channels: u16,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, SampleRate={})",
            self.name, self.channels, self.sample_rate
        )
    }
}

impl Output {
    /// Opens the configured device (or the default output) and starts
    /// rendering the shared graph into it. While the graph slot is empty the
    /// stream plays silence.
    pub fn open(config: &config::Audio, graph: SharedGraph) -> Result<Output, OutputError> {
        let (name, device) = match config.device() {
            Some(name) => list_cpal_devices()?
                .into_iter()
                .find(|(info, _)| info.name.trim() == name)
                .map(|(info, device)| (info.name, device))
                .ok_or_else(|| OutputError::NoDevice(name.to_string()))?,
            None => {
                let device = cpal::default_host()
                    .default_output_device()
                    .ok_or_else(|| OutputError::NoDevice("default".to_string()))?;
                (device.name()?, device)
            }
        };

        let default_config = device.default_output_config()?;
        let channels = default_config.channels();
        let sample_rate = config.sample_rate();
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate,
            buffer_size: match config.buffer_size() {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, graph, channels)?
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, graph, channels)?
            }
            cpal::SampleFormat::I32 => {
                build_stream::<i32>(&device, &stream_config, graph, channels)?
            }
            format => return Err(OutputError::UnsupportedFormat(format)),
        };
        stream.play()?;

        info!(
            device = %name,
            channels, sample_rate, "CPAL output stream started successfully"
        );

        Ok(Output {
            name,
            channels,
            sample_rate,
            _stream: stream,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: SharedGraph,
    channels: u16,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            match graph.lock().as_mut() {
                Some(graph) => graph.process_into_output(&mut scratch, channels as usize),
                None => scratch.fill(0.0),
            }
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}
