//! Transport command surface

use super::effects::Effect;
use super::sequencer::Sequencer;
use flashdeck_common::models::Folder;

/// User-driven commands accepted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    OpenFolder { folder: Folder, autoplay: bool },
    Leave,
    Unlock,
    Play,
    Pause,
    Toggle,
    Next,
    Prev,
    JumpTo(usize),
    ReplayCurrent,
    RevealTerm,
    SetShuffle(bool),
    SetHideTerm(bool),
    SetPreferAudio(bool),
    SetReadDescription(bool),
    SetRate(f32),
    SetRepeatCount(i64),
}

impl TransportCommand {
    /// Run the command against the sequencer
    pub fn apply(self, sequencer: &mut Sequencer) -> Vec<Effect> {
        match self {
            TransportCommand::OpenFolder { folder, autoplay } => sequencer.open_folder(folder, autoplay),
            TransportCommand::Leave => sequencer.leave(),
            TransportCommand::Unlock => sequencer.unlock(),
            TransportCommand::Play => sequencer.play(),
            TransportCommand::Pause => sequencer.pause(),
            TransportCommand::Toggle => sequencer.toggle(),
            TransportCommand::Next => sequencer.next(),
            TransportCommand::Prev => sequencer.prev(),
            TransportCommand::JumpTo(position) => sequencer.jump_to(position),
            TransportCommand::ReplayCurrent => sequencer.replay_current(),
            TransportCommand::RevealTerm => sequencer.reveal_term(),
            TransportCommand::SetShuffle(on) => sequencer.set_shuffle(on),
            TransportCommand::SetHideTerm(on) => sequencer.set_hide_term(on),
            TransportCommand::SetPreferAudio(on) => sequencer.set_prefer_audio(on),
            TransportCommand::SetReadDescription(on) => sequencer.set_read_description(on),
            TransportCommand::SetRate(rate) => sequencer.set_rate(rate),
            TransportCommand::SetRepeatCount(count) => sequencer.set_repeat_count(count),
        }
    }

    /// Parse a terminal command line such as `jump 3` or `shuffle on`
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();

        let flag = |arg: Option<&str>| match arg {
            Some("on") | Some("true") | Some("1") => Ok(true),
            Some("off") | Some("false") | Some("0") => Ok(false),
            other => Err(format!("'{}' expects on|off, got {:?}", verb, other.unwrap_or(""))),
        };

        let command = match verb {
            "play" => TransportCommand::Play,
            "pause" => TransportCommand::Pause,
            "toggle" | "p" => TransportCommand::Toggle,
            "next" | "n" => TransportCommand::Next,
            "prev" | "b" => TransportCommand::Prev,
            "replay" | "r" => TransportCommand::ReplayCurrent,
            "reveal" => TransportCommand::RevealTerm,
            "unlock" => TransportCommand::Unlock,
            "leave" => TransportCommand::Leave,
            "jump" => TransportCommand::JumpTo(
                arg.and_then(|a| a.parse().ok())
                    .ok_or_else(|| "'jump' expects a position".to_string())?,
            ),
            "shuffle" => TransportCommand::SetShuffle(flag(arg)?),
            "hide" => TransportCommand::SetHideTerm(flag(arg)?),
            "audio" => TransportCommand::SetPreferAudio(flag(arg)?),
            "desc" => TransportCommand::SetReadDescription(flag(arg)?),
            "rate" => TransportCommand::SetRate(
                arg.and_then(|a| a.parse().ok())
                    .ok_or_else(|| "'rate' expects a number".to_string())?,
            ),
            "repeat" => TransportCommand::SetRepeatCount(
                arg.and_then(|a| a.parse().ok())
                    .ok_or_else(|| "'repeat' expects an integer".to_string())?,
            ),
            other => return Err(format!("unknown command '{}'", other)),
        };

        Ok(command)
    }
}
