use std::io::BufRead;
use std::thread;

use crossbeam_channel::{Receiver, unbounded};
use tracing::{debug, warn};

/// Runtime commands. Keyboard input maps to these in the event loop;
/// the stdin listener accepts them as text lines so the frame can be
/// driven from a pipe or remote shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Next,
    Back,
    TogglePause,
    Pause,
    Resume,
    Reload,
    Brightness(f32),
    DisplayOn,
    DisplayOff,
    Quit,
}

pub fn parse_command(line: &str) -> Option<PlayerCommand> {
    let mut words = line.split_whitespace();
    let verb = words.next()?.to_ascii_lowercase();
    let arg = words.next();
    let cmd = match verb.as_str() {
        "next" => PlayerCommand::Next,
        "back" | "prev" => PlayerCommand::Back,
        "pause" => PlayerCommand::Pause,
        "resume" | "play" => PlayerCommand::Resume,
        "toggle" => PlayerCommand::TogglePause,
        "reload" => PlayerCommand::Reload,
        "brightness" => {
            let v: f32 = arg?.parse().ok()?;
            PlayerCommand::Brightness(v.clamp(0.0, 1.0))
        }
        "display" => match arg?.to_ascii_lowercase().as_str() {
            "on" => PlayerCommand::DisplayOn,
            "off" => PlayerCommand::DisplayOff,
            _ => return None,
        },
        "quit" | "exit" => PlayerCommand::Quit,
        _ => return None,
    };
    Some(cmd)
}

/// Line-oriented command listener on stdin. The reader thread lives for
/// the process; it parks on a closed pipe and is reaped at exit.
pub struct InputListener {
    rx: Receiver<PlayerCommand>,
}

impl InputListener {
    pub fn spawn_stdin() -> std::io::Result<Self> {
        let (tx, rx) = unbounded();
        thread::Builder::new()
            .name("stdin-input".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    match parse_command(&line) {
                        Some(cmd) => {
                            debug!(?cmd, "stdin command");
                            if tx.send(cmd).is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => warn!(line, "unrecognized command"),
                    }
                }
            })?;
        Ok(Self { rx })
    }

    pub fn try_recv(&self) -> Option<PlayerCommand> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_verbs() {
        assert_eq!(parse_command("next"), Some(PlayerCommand::Next));
        assert_eq!(parse_command("  BACK "), Some(PlayerCommand::Back));
        assert_eq!(parse_command("toggle"), Some(PlayerCommand::TogglePause));
        assert_eq!(parse_command("quit"), Some(PlayerCommand::Quit));
    }

    #[test]
    fn brightness_takes_a_clamped_argument() {
        assert_eq!(
            parse_command("brightness 0.4"),
            Some(PlayerCommand::Brightness(0.4))
        );
        assert_eq!(
            parse_command("brightness 7"),
            Some(PlayerCommand::Brightness(1.0))
        );
        assert_eq!(parse_command("brightness"), None);
        assert_eq!(parse_command("brightness dim"), None);
    }

    #[test]
    fn display_requires_on_or_off() {
        assert_eq!(parse_command("display on"), Some(PlayerCommand::DisplayOn));
        assert_eq!(parse_command("display off"), Some(PlayerCommand::DisplayOff));
        assert_eq!(parse_command("display sideways"), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_command("frobnicate"), None);
        assert_eq!(parse_command(""), None);
    }
}
