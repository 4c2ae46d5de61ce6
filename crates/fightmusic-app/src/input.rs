//! Global mouse hook delivering trigger presses.

use std::fmt;

use fightmusic_core::{Error, Result};
use rdev::{Button, EventType};
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, trace};

// Platform codes for the side buttons
#[cfg(target_os = "windows")]
const X1_CODE: u8 = 1;
#[cfg(target_os = "windows")]
const X2_CODE: u8 = 2;
#[cfg(not(target_os = "windows"))]
const X1_CODE: u8 = 8;
#[cfg(not(target_os = "windows"))]
const X2_CODE: u8 = 9;

/// A press edge of the trigger button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Press;

/// Mouse button that toggles playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "ButtonSpec")]
pub enum TriggerButton {
    /// First side button ("back").
    #[default]
    X1,
    /// Second side button ("forward").
    X2,
    Middle,
    /// Raw platform button code.
    Code(u8),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ButtonSpec {
    Name(String),
    Code(u8),
}

impl TryFrom<ButtonSpec> for TriggerButton {
    type Error = Error;

    fn try_from(spec: ButtonSpec) -> Result<Self> {
        match spec {
            ButtonSpec::Code(code) => Ok(Self::Code(code)),
            ButtonSpec::Name(name) => match name.to_ascii_lowercase().as_str() {
                "x1" | "back" | "mouse4" => Ok(Self::X1),
                "x2" | "forward" | "mouse5" => Ok(Self::X2),
                "middle" => Ok(Self::Middle),
                other => Err(Error::Config(format!("unknown trigger button '{other}'"))),
            },
        }
    }
}

impl TriggerButton {
    pub const fn to_rdev(self) -> Button {
        match self {
            Self::X1 => Button::Unknown(X1_CODE),
            Self::X2 => Button::Unknown(X2_CODE),
            Self::Middle => Button::Middle,
            Self::Code(code) => Button::Unknown(code),
        }
    }
}

impl fmt::Display for TriggerButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X1 => f.write_str("mouse button 4 (side button)"),
            Self::X2 => f.write_str("mouse button 5 (side button)"),
            Self::Middle => f.write_str("the middle mouse button"),
            Self::Code(code) => write!(f, "mouse button code {code}"),
        }
    }
}

/// Whether `event` is the press edge of `trigger`. Releases never match.
pub fn is_trigger_press(event: &EventType, trigger: Button) -> bool {
    matches!(event, EventType::ButtonPress(button) if *button == trigger)
}

/// Start the global mouse hook on its own thread.
///
/// The hook only forwards presses onto the returned channel, so input
/// capture is never held up by playback work. The channel closes if the
/// hook stops.
pub fn spawn_listener(trigger: TriggerButton) -> Result<UnboundedReceiver<Press>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let button = trigger.to_rdev();

    std::thread::Builder::new()
        .name("input-listener".to_string())
        .spawn(move || {
            debug!("Listening for {button:?}");
            let result = rdev::listen(move |event| {
                if is_trigger_press(&event.event_type, button) {
                    trace!("Trigger pressed");
                    if tx.send(Press).is_err() {
                        debug!("Press receiver dropped");
                    }
                }
            });

            if let Err(e) = result {
                error!("Mouse listener stopped: {e:?}");
            }
        })?;

    Ok(rx)
}
