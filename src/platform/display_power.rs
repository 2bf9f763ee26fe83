use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::{DisplayPowerBackend, DisplayPowerOptions};

/// Turns the physical display on and off through whichever mechanism the
/// host offers. The `None` backend is a no-op that always reports the
/// display as on, so the rest of the player never special-cases hosts
/// without power control.
#[derive(Debug)]
pub struct DisplayPower {
    backend: DisplayPowerBackend,
    output: String,
    is_on: bool,
}

impl DisplayPower {
    pub fn new(options: &DisplayPowerOptions) -> Self {
        Self {
            backend: options.backend,
            output: options.output.clone(),
            is_on: true,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn set_on(&mut self, on: bool) -> Result<()> {
        if on == self.is_on {
            return Ok(());
        }
        match self.backend {
            DisplayPowerBackend::Pi => {
                run(
                    "vcgencmd",
                    &["display_power", if on { "1" } else { "0" }],
                )?;
            }
            DisplayPowerBackend::XDpms => {
                run("xset", &["dpms", "force", if on { "on" } else { "off" }])?;
            }
            DisplayPowerBackend::WlrRandr => {
                run(
                    "wlr-randr",
                    &["--output", &self.output, if on { "--on" } else { "--off" }],
                )?;
            }
            DisplayPowerBackend::None => {
                debug!("display power backend disabled, ignoring request");
                return Ok(());
            }
        }
        info!(on, backend = ?self.backend, "display power switched");
        self.is_on = on;
        Ok(())
    }
}

fn run(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("running {program}"))?;
    anyhow::ensure!(status.success(), "{program} exited with {status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_backend_stays_reported_on() {
        let mut power = DisplayPower::new(&DisplayPowerOptions::default());
        assert!(power.is_on());
        power.set_on(false).unwrap();
        // No backend means the request is a no-op.
        assert!(power.is_on());
    }
}
