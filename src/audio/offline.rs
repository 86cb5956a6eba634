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
//! Faster than real time rendering of the shared graph into a WAV file.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::graph::SharedGraph;

/// Renders the shared graph into a stereo 32 bit float WAV stream.
pub struct WavRenderer<W: Write + Seek> {
    writer: WavWriter<W>,
    graph: SharedGraph,
    scratch: Vec<f32>,
    frames_written: u64,
}

impl WavRenderer<BufWriter<File>> {
    pub fn create(
        path: &Path,
        sample_rate: u32,
        graph: SharedGraph,
    ) -> Result<WavRenderer<BufWriter<File>>, hound::Error> {
        let writer = WavWriter::create(path, spec(sample_rate))?;
        Ok(WavRenderer::from_writer(writer, graph))
    }
}

impl<W: Write + Seek> WavRenderer<W> {
    pub fn new(inner: W, sample_rate: u32, graph: SharedGraph) -> Result<Self, hound::Error> {
        Ok(WavRenderer::from_writer(
            WavWriter::new(inner, spec(sample_rate))?,
            graph,
        ))
    }

    fn from_writer(writer: WavWriter<W>, graph: SharedGraph) -> Self {
        WavRenderer {
            writer,
            graph,
            scratch: Vec::new(),
            frames_written: 0,
        }
    }

    /// Renders and writes `frames` frames. Writes silence while the graph
    /// slot is empty.
    pub fn render(&mut self, frames: usize) -> Result<(), hound::Error> {
        self.scratch.resize(frames * 2, 0.0);
        match self.graph.lock().as_mut() {
            Some(graph) => graph.process_into_output(&mut self.scratch, 2),
            None => self.scratch.fill(0.0),
        }
        for sample in self.scratch.iter() {
            self.writer.write_sample(*sample)?;
        }
        self.frames_written += frames as u64;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn finalize(self) -> Result<(), hound::Error> {
        self.writer.finalize()
    }
}

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}
