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
//! Text commands for driving a session from a terminal.
//!
//! Each line stands for one [`UiEvent`], or for the three events of a drag.
//! Pads are numbered the way they are labelled: `pad 0` is the start pad and
//! `pad 1` to `pad 4` are the trigger pads.

use crate::effects::ParseError;
use crate::selection::Handle;
use crate::session::UiEvent;
use crate::triggers::TRIGGER_SLOTS;

/// Errors parsing a command line.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{command} is missing its {argument}")]
    MissingArgument {
        command: String,
        argument: &'static str,
    },

    #[error("not a number: {0}")]
    InvalidNumber(String),

    #[error("expected on or off, got {0}")]
    InvalidToggle(String),

    #[error("no such pad: {0}")]
    InvalidPad(usize),

    #[error("{0}")]
    InvalidName(#[from] ParseError),

    #[error("unknown handle: {0}")]
    InvalidHandle(String),

    #[error("line {line}: {source}")]
    Script {
        line: usize,
        source: Box<CommandError>,
    },
}

/// Usage lines for the interactive prompt.
pub const HELP: &str = "\
start [offset]             play from offset seconds (default 0)
pad <0-4>                  play the start pad or a trigger pad
play                       toggle playback
stop                       stop playback
mark                       store the playhead in the next trigger pad
clear                      clear the selection and every trigger pad
speed <value>              playback speed (0.25 to 4.0)
pitch <semitones>          pitch shift
volume <0-1>               master volume
fx <name> on|off           engage or release a dub effect
filter <param> <value>     lowpass, lowpassq, highpass, highpassq
mod <effect> on|off        flanger, phaser, chorus, tremolo
modset <effect> <param> <value>
resetfilters               return the filters to rest
select <start> <end>       select a region in seconds
unselect                   clear the selection
handle left|right <x>      drag a selection handle to pixel x
trigger <1-4> <x>          drag a trigger pad's point to pixel x
playsel                    play the selection
loop                       toggle selection looping
width <pixels>             set the waveform width";

struct Args<'a> {
    command: &'a str,
    words: std::str::SplitWhitespace<'a>,
}

impl<'a> Args<'a> {
    fn word(&mut self, argument: &'static str) -> Result<&'a str, CommandError> {
        self.words.next().ok_or_else(|| CommandError::MissingArgument {
            command: self.command.to_string(),
            argument,
        })
    }

    fn number(&mut self, argument: &'static str) -> Result<f64, CommandError> {
        parse_number(self.word(argument)?)
    }

    fn toggle(&mut self) -> Result<bool, CommandError> {
        match self.word("state")?.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(true),
            "off" | "false" | "0" => Ok(false),
            other => Err(CommandError::InvalidToggle(other.to_string())),
        }
    }
}

/// Converts a 1-based trigger pad number to a slot index.
fn trigger_slot(word: &str) -> Result<usize, CommandError> {
    match word.parse::<usize>() {
        Ok(pad) if (1..=TRIGGER_SLOTS).contains(&pad) => Ok(pad - 1),
        Ok(pad) => Err(CommandError::InvalidPad(pad)),
        Err(_) => Err(CommandError::InvalidNumber(word.to_string())),
    }
}

fn parse_number(word: &str) -> Result<f64, CommandError> {
    word.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(word.to_string()))
}

/// Parses one command line into the events it stands for. Drags expand to
/// their start, move and end events.
pub fn parse_command(line: &str) -> Result<Vec<UiEvent>, CommandError> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or(CommandError::Empty)?;
    let mut args = Args { command, words };

    let event = match command.to_ascii_lowercase().as_str() {
        "start" => match args.words.next() {
            Some(offset) => UiEvent::StartAt(parse_number(offset)?),
            None => UiEvent::StartAt(0.0),
        },
        "pad" => match args.word("pad number")? {
            "0" => UiEvent::StartAt(0.0),
            word => UiEvent::StartPad(trigger_slot(word)?),
        },
        "play" => UiEvent::TogglePlay,
        "stop" => UiEvent::Stop,
        "mark" => UiEvent::Mark,
        "clear" => UiEvent::ClearAll,
        "speed" => UiEvent::SetSpeed(args.number("speed")?),
        "pitch" => UiEvent::SetPitchShiftSemitones(args.number("semitones")?),
        "volume" => UiEvent::SetMasterVolume(args.number("volume")? as f32),
        "fx" => UiEvent::EffectEngage {
            name: args.word("effect")?.parse()?,
            active: args.toggle()?,
        },
        "filter" => UiEvent::FilterSet {
            param: args.word("parameter")?.parse()?,
            value: args.number("value")? as f32,
        },
        "mod" => UiEvent::ModulationToggle {
            effect: args.word("effect")?.parse()?,
            active: args.toggle()?,
        },
        "modset" => UiEvent::ModulationSet {
            effect: args.word("effect")?.parse()?,
            param: args.word("parameter")?.parse()?,
            value: args.number("value")? as f32,
        },
        "resetfilters" => UiEvent::ResetFilters,
        "select" => UiEvent::Select {
            start: args.number("start")?,
            end: args.number("end")?,
        },
        "unselect" => UiEvent::ClearSelection,
        "handle" => {
            let word = args.word("handle")?;
            let handle: Handle = word
                .parse()
                .map_err(|_| CommandError::InvalidHandle(word.to_string()))?;
            let x = args.number("x")?;
            return Ok(vec![
                UiEvent::HandleDragStart(handle),
                UiEvent::HandleDrag(x),
                UiEvent::HandleDragEnd,
            ]);
        }
        "trigger" => {
            let slot = trigger_slot(args.word("pad number")?)?;
            let x = args.number("x")?;
            return Ok(vec![
                UiEvent::TriggerDragStart(slot),
                UiEvent::TriggerDrag(x),
                UiEvent::TriggerDragEnd,
            ]);
        }
        "playsel" => UiEvent::PlaySelection,
        "loop" => UiEvent::ToggleLoopSelection,
        "width" => UiEvent::Resize(args.number("width")?),
        _ => return Err(CommandError::Unknown(command.to_string())),
    };
    Ok(vec![event])
}

/// Events scheduled at a point in render time.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Seconds from the start of the render.
    pub at: f64,
    pub events: Vec<UiEvent>,
}

/// Parses a render script. Each line is `<seconds> <command>`; blank lines
/// and lines starting with `#` are skipped. Cues come back ordered by time,
/// keeping file order for equal times.
pub fn parse_script(text: &str) -> Result<Vec<Cue>, CommandError> {
    let mut cues = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let wrap = |source| CommandError::Script {
            line: index + 1,
            source: Box::new(source),
        };
        let (at, command) = line.split_once(char::is_whitespace).ok_or_else(|| {
            wrap(CommandError::MissingArgument {
                command: line.to_string(),
                argument: "command",
            })
        })?;
        let at = parse_number(at).map_err(wrap)?;
        if at < 0.0 {
            return Err(wrap(CommandError::InvalidNumber(at.to_string())));
        }
        cues.push(Cue {
            at,
            events: parse_command(command).map_err(wrap)?,
        });
    }
    cues.sort_by(|a, b| a.at.total_cmp(&b.at));
    Ok(cues)
}
