use anyhow::{anyhow, bail, Context, Result};
use glam::Vec3;
use serde::Deserialize;
use sfxkit_audio::PlayParams;
use std::{collections::VecDeque, fs, path::Path, str::FromStr};

#[derive(Debug, Deserialize)]
struct CommandScriptFile {
    steps: Vec<CommandScriptStepDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommandScriptStepDef {
    tick: u64,
    command: String,
}

#[derive(Debug, Clone)]
struct CommandScriptStep {
    tick: u64,
    command: SoundCommand,
}

/// One scripted request against the audio runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundCommand {
    /// `play NAME [VOLUME [PITCH [VOLVAR [PITCHVAR]]]]`
    Play { sound: String, params: PlayParams },
    /// `play_at NAME X Y Z [VOLUME]`
    PlayAt {
        sound: String,
        position: Vec3,
        params: PlayParams,
    },
    /// `enter STATE`
    Enter(String),
    /// `exit STATE`
    Exit(String),
    /// `music`
    Music,
}

fn parse_f32(token: Option<&str>, what: &str, default: f32) -> Result<f32> {
    let Some(raw) = token else {
        return Ok(default);
    };
    let value = raw
        .parse::<f32>()
        .with_context(|| format!("invalid {what} `{raw}`"))?;
    if !value.is_finite() {
        bail!("{what} must be finite, got `{raw}`");
    }
    Ok(value)
}

fn required<'a>(token: Option<&'a str>, what: &str, verb: &str) -> Result<&'a str> {
    token.ok_or_else(|| anyhow!("`{verb}` requires {what}"))
}

impl FromStr for SoundCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| anyhow!("empty command"))?;
        let command = match verb {
            "play" => {
                let sound = required(parts.next(), "a sound name", verb)?.to_string();
                let params = PlayParams::with_volume(parse_f32(parts.next(), "volume", 1.0)?)
                    .pitch(parse_f32(parts.next(), "pitch", 1.0)?)
                    .variance(
                        parse_f32(parts.next(), "volume variance", 0.0)?,
                        parse_f32(parts.next(), "pitch variance", 0.0)?,
                    );
                SoundCommand::Play { sound, params }
            }
            "play_at" => {
                let sound = required(parts.next(), "a sound name", verb)?.to_string();
                let x = parse_f32(Some(required(parts.next(), "x", verb)?), "x", 0.0)?;
                let y = parse_f32(Some(required(parts.next(), "y", verb)?), "y", 0.0)?;
                let z = parse_f32(Some(required(parts.next(), "z", verb)?), "z", 0.0)?;
                let params = PlayParams::with_volume(parse_f32(parts.next(), "volume", 1.0)?);
                SoundCommand::PlayAt {
                    sound,
                    position: Vec3::new(x, y, z),
                    params,
                }
            }
            "enter" => SoundCommand::Enter(required(parts.next(), "a state", verb)?.to_string()),
            "exit" => SoundCommand::Exit(required(parts.next(), "a state", verb)?.to_string()),
            "music" => SoundCommand::Music,
            other => bail!("unknown command `{other}`"),
        };
        if let Some(extra) = parts.next() {
            bail!("unexpected argument `{extra}` for `{verb}`");
        }
        Ok(command)
    }
}

/// Deterministic command script runner.
///
/// Scripts are a simple list of `{tick, command}` steps, executed in file order.
/// Every command is parsed up front so a bad script fails before playback starts.
#[derive(Debug)]
pub struct CommandScriptPlayer {
    pending: VecDeque<CommandScriptStep>,
}

impl CommandScriptPlayer {
    /// Load a command script from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read command script {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Load a command script from an in-memory JSON string.
    pub fn from_json(contents: &str) -> Result<Self> {
        let file: CommandScriptFile = serde_json::from_str(contents)?;
        if file.steps.is_empty() {
            bail!("command script contains no steps");
        }

        let mut pending = VecDeque::with_capacity(file.steps.len());
        let mut last_tick: Option<u64> = None;
        for step in file.steps {
            let line = step.command.trim();
            if line.is_empty() {
                bail!("command script contains an empty command");
            }

            if let Some(prev) = last_tick {
                if step.tick < prev {
                    bail!("command script steps must be sorted by tick");
                }
            }
            last_tick = Some(step.tick);

            let command = line
                .parse::<SoundCommand>()
                .with_context(|| format!("tick {}: `{line}`", step.tick))?;
            pending.push_back(CommandScriptStep {
                tick: step.tick,
                command,
            });
        }

        Ok(Self { pending })
    }

    /// Drain and return all commands scheduled for ticks `<= tick`.
    pub fn drain_ready_commands(&mut self, tick: u64) -> Vec<SoundCommand> {
        let mut commands = Vec::new();
        while self.pending.front().is_some_and(|step| step.tick <= tick) {
            if let Some(step) = self.pending.pop_front() {
                commands.push(step.command);
            }
        }
        commands
    }

    pub fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }
}
