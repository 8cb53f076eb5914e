//! [`GilrsBackend`] – physical gamepads through `gilrs`.
//!
//! `gilrs` names its inputs rather than numbering them, so the backend
//! exposes them in the conventional SDL order:
//!
//! | Index | Axis | Button |
//! |---|---|---|
//! | 0 | left stick X | south |
//! | 1 | left stick Y | east |
//! | 2 | left Z | west |
//! | 3 | right stick X | north |
//! | 4 | right stick Y | left trigger |
//! | 5 | right Z | right trigger |
//! | 6 | d-pad X | select |
//! | 7 | d-pad Y | start |
//! | 8 | | mode |
//! | 9 | | left thumb |
//! | 10 | | right thumb |

use gcs_types::GcsError;
use gilrs::{Axis, Button, EventType, GamepadId, Gilrs};
use tracing::debug;

use crate::backend::{DeviceInfo, InputBackend};

const AXES: [Axis; 8] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::LeftZ,
    Axis::RightStickX,
    Axis::RightStickY,
    Axis::RightZ,
    Axis::DPadX,
    Axis::DPadY,
];

const BUTTONS: [Button; 11] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::Select,
    Button::Start,
    Button::Mode,
    Button::LeftThumb,
    Button::RightThumb,
];

pub struct GilrsBackend {
    gilrs: Gilrs,
    active: Option<GamepadId>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, GcsError> {
        let gilrs = Gilrs::new().map_err(|e| GcsError::Device(format!("gamepad init: {e}")))?;
        Ok(Self {
            gilrs,
            active: None,
        })
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.gilrs.next_event() {
            if Some(event.id) == self.active && event.event == EventType::Disconnected {
                debug!(id = %event.id, "active gamepad disconnected");
                self.active = None;
            }
        }
    }
}

impl InputBackend for GilrsBackend {
    fn device_count(&mut self) -> usize {
        self.drain_events();
        self.gilrs.gamepads().filter(|(_, g)| g.is_connected()).count()
    }

    fn open(&mut self, index: usize) -> Result<DeviceInfo, GcsError> {
        let (id, pad) = self
            .gilrs
            .gamepads()
            .filter(|(_, g)| g.is_connected())
            .nth(index)
            .ok_or_else(|| GcsError::Device(format!("no gamepad at index {index}")))?;
        let info = DeviceInfo {
            name: pad.name().to_string(),
            num_axes: AXES.len(),
            num_buttons: BUTTONS.len(),
        };
        self.active = Some(id);
        Ok(info)
    }

    fn pump(&mut self) -> Result<(), GcsError> {
        self.drain_events();
        match self.active {
            Some(id) if self.gilrs.connected_gamepad(id).is_some() => Ok(()),
            _ => Err(GcsError::Device("gamepad disconnected".to_string())),
        }
    }

    fn axis(&self, index: usize) -> f64 {
        match (self.active, AXES.get(index)) {
            (Some(id), Some(axis)) => f64::from(self.gilrs.gamepad(id).value(*axis)),
            _ => 0.0,
        }
    }

    fn button(&self, index: usize) -> bool {
        match (self.active, BUTTONS.get(index)) {
            (Some(id), Some(button)) => self.gilrs.gamepad(id).is_pressed(*button),
            _ => false,
        }
    }

    fn close(&mut self) {
        self.active = None;
    }
}
