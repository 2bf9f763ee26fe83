use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded, unbounded};
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::config::VideoOptions;

/// Where the external player currently is. `Ended` is also the resting
/// state of a bridge whose helper is missing or dead, so video slots
/// degrade to timed slides instead of wedging the show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

#[derive(Debug)]
enum HelperEvent {
    Playing,
    Paused,
    Ended,
    Exited,
}

fn parse_state_line(line: &str) -> Option<HelperEvent> {
    match line.trim() {
        "STATE:PLAYING" => Some(HelperEvent::Playing),
        "STATE:PAUSED" => Some(HelperEvent::Paused),
        "STATE:ENDED" => Some(HelperEvent::Ended),
        _ => None,
    }
}

/// Driver for the long-lived video helper process. Commands go down its
/// stdin one line at a time; a reader thread turns its stdout state
/// lines into events drained by `poll`.
pub struct VideoBridge {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    events: Option<Receiver<HelperEvent>>,
    state: PlaybackState,
    loading_since: Option<Instant>,
    startup_grace: Duration,
}

impl VideoBridge {
    pub fn new(options: &VideoOptions) -> Self {
        Self::spawn(
            &options.player_command,
            &options.player_args,
            options.startup_grace,
        )
    }

    fn spawn(command: &str, args: &[String], startup_grace: Duration) -> Self {
        let mut bridge = Self {
            child: None,
            stdin: None,
            events: None,
            state: PlaybackState::Idle,
            loading_since: None,
            startup_grace,
        };
        let spawned = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                warn!(command, %err, "video helper unavailable, videos show as stills");
                return bridge;
            }
        };
        bridge.stdin = child.stdin.take();
        if let Some(stdout) = child.stdout.take() {
            let (tx, rx) = unbounded();
            let spawn = thread::Builder::new()
                .name("video-helper-out".into())
                .spawn(move || {
                    for line in BufReader::new(stdout).lines() {
                        let Ok(line) = line else { break };
                        if let Some(event) = parse_state_line(&line) {
                            if tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    let _ = tx.send(HelperEvent::Exited);
                });
            if spawn.is_ok() {
                bridge.events = Some(rx);
            }
        }
        info!(command, "video helper started");
        bridge.child = Some(child);
        bridge
    }

    pub fn available(&self) -> bool {
        self.stdin.is_some()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Hand a file to the helper. Without a helper the clip "ends"
    /// immediately and the slot runs on the image timer.
    pub fn load(&mut self, path: &Path) {
        if !self.available() {
            self.state = PlaybackState::Ended;
            return;
        }
        debug!(path = %path.display(), "loading video");
        self.send(&format!("load {}", path.display()));
        self.state = PlaybackState::Loading;
        self.loading_since = Some(Instant::now());
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.send("pause");
            self.state = PlaybackState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.send("resume");
            self.state = PlaybackState::Playing;
        }
    }

    pub fn stop(&mut self) {
        if matches!(
            self.state,
            PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Paused
        ) {
            self.send("stop");
        }
        self.state = PlaybackState::Idle;
        self.loading_since = None;
    }

    /// Absorb helper events. A helper that says nothing during startup
    /// is assumed playing once the grace period passes; a dead helper
    /// ends the current clip.
    pub fn poll(&mut self, now: Instant) -> PlaybackState {
        let mut exited = false;
        if let Some(events) = &self.events {
            while let Ok(event) = events.try_recv() {
                match event {
                    HelperEvent::Playing => {
                        self.state = PlaybackState::Playing;
                        self.loading_since = None;
                    }
                    HelperEvent::Paused => self.state = PlaybackState::Paused,
                    HelperEvent::Ended => {
                        self.state = PlaybackState::Ended;
                        self.loading_since = None;
                    }
                    HelperEvent::Exited => exited = true,
                }
            }
        }
        if exited {
            warn!("video helper exited");
            self.stdin = None;
            self.events = None;
            if self.state != PlaybackState::Idle {
                self.state = PlaybackState::Ended;
            }
        }
        if self.state == PlaybackState::Loading {
            if let Some(since) = self.loading_since {
                if now.duration_since(since) >= self.startup_grace {
                    self.state = PlaybackState::Playing;
                    self.loading_since = None;
                }
            }
        }
        self.state
    }

    pub fn shutdown(&mut self) {
        if self.available() {
            self.send("stop");
        }
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            // Give it a moment to exit on its own before killing.
            thread::sleep(Duration::from_millis(100));
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }

    fn send(&mut self, line: &str) {
        if let Some(stdin) = &mut self.stdin {
            if writeln!(stdin, "{line}").and_then(|_| stdin.flush()).is_err() {
                warn!("video helper pipe closed");
                self.stdin = None;
                if self.state != PlaybackState::Idle {
                    self.state = PlaybackState::Ended;
                }
            }
        }
    }
}

impl Drop for VideoBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// First frame of a clip via ffmpeg, used as the poster the cross-fade
/// lands on before the helper takes over. Extraction runs on its own
/// thread so a stuck ffmpeg costs at most `timeout`.
pub fn first_frame(path: &Path, ffmpeg: &str, timeout: Duration) -> Option<RgbaImage> {
    let (tx, rx) = bounded(1);
    let ffmpeg = ffmpeg.to_string();
    let path = path.to_path_buf();
    let spawn = thread::Builder::new()
        .name("video-poster".into())
        .spawn(move || {
            let result = Command::new(&ffmpeg)
                .args(["-v", "error", "-i"])
                .arg(&path)
                .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
                .stderr(Stdio::null())
                .output();
            let frame = match result {
                Ok(out) if out.status.success() && !out.stdout.is_empty() => {
                    image::load_from_memory(&out.stdout)
                        .map(|img| img.to_rgba8())
                        .ok()
                }
                _ => None,
            };
            let _ = tx.send(frame);
        });
    if spawn.is_err() {
        return None;
    }
    match rx.recv_timeout(timeout) {
        Ok(frame) => frame,
        Err(_) => {
            debug!(timeout_ms = timeout.as_millis() as u64, "poster extraction timed out");
            None
        }
    }
}
