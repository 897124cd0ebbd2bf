//! evdev keyboard feed
//!
//! One blocking listener thread per keyboard device turns key presses into
//! [`HostEvent::Input`] events. Modifiers are read from the live key state
//! after each batch, so batched events cannot reorder them.
//!
//! Under lockdown each keyboard is grabbed and every key the gate does not
//! suppress is re-emitted through a uinput keyboard, so suppressed shortcuts
//! never reach the browser.

use std::collections::HashSet;
use std::thread;

use anyhow::{Context, Result};
use evdev::uinput::VirtualDevice;
use evdev::{AttributeSetRef, Device, EventType, InputEvent, KeyCode};
use tracing::{debug, error, info, trace, warn};

use crate::constants::{input, paths, permissions};
use crate::events::{EventSender, HostEvent, KioskEvent};
use crate::input_gate::{InputGate, InputVerdict, KeyInput};

const KEY_NAMES: [(KeyCode, &str); 52] = [
    (KeyCode::KEY_A, "a"),
    (KeyCode::KEY_B, "b"),
    (KeyCode::KEY_C, "c"),
    (KeyCode::KEY_D, "d"),
    (KeyCode::KEY_E, "e"),
    (KeyCode::KEY_F, "f"),
    (KeyCode::KEY_G, "g"),
    (KeyCode::KEY_H, "h"),
    (KeyCode::KEY_I, "i"),
    (KeyCode::KEY_J, "j"),
    (KeyCode::KEY_K, "k"),
    (KeyCode::KEY_L, "l"),
    (KeyCode::KEY_M, "m"),
    (KeyCode::KEY_N, "n"),
    (KeyCode::KEY_O, "o"),
    (KeyCode::KEY_P, "p"),
    (KeyCode::KEY_Q, "q"),
    (KeyCode::KEY_R, "r"),
    (KeyCode::KEY_S, "s"),
    (KeyCode::KEY_T, "t"),
    (KeyCode::KEY_U, "u"),
    (KeyCode::KEY_V, "v"),
    (KeyCode::KEY_W, "w"),
    (KeyCode::KEY_X, "x"),
    (KeyCode::KEY_Y, "y"),
    (KeyCode::KEY_Z, "z"),
    (KeyCode::KEY_0, "0"),
    (KeyCode::KEY_1, "1"),
    (KeyCode::KEY_2, "2"),
    (KeyCode::KEY_3, "3"),
    (KeyCode::KEY_4, "4"),
    (KeyCode::KEY_5, "5"),
    (KeyCode::KEY_6, "6"),
    (KeyCode::KEY_7, "7"),
    (KeyCode::KEY_8, "8"),
    (KeyCode::KEY_9, "9"),
    (KeyCode::KEY_F1, "F1"),
    (KeyCode::KEY_F2, "F2"),
    (KeyCode::KEY_F3, "F3"),
    (KeyCode::KEY_F4, "F4"),
    (KeyCode::KEY_F5, "F5"),
    (KeyCode::KEY_F6, "F6"),
    (KeyCode::KEY_F7, "F7"),
    (KeyCode::KEY_F8, "F8"),
    (KeyCode::KEY_F9, "F9"),
    (KeyCode::KEY_F10, "F10"),
    (KeyCode::KEY_F11, "F11"),
    (KeyCode::KEY_F12, "F12"),
    (KeyCode::KEY_ESC, "Escape"),
    (KeyCode::KEY_ENTER, "Enter"),
    (KeyCode::KEY_TAB, "Tab"),
    (KeyCode::KEY_SPACE, " "),
];

const MODIFIER_KEYS: [KeyCode; 8] = [
    KeyCode::KEY_LEFTCTRL,
    KeyCode::KEY_RIGHTCTRL,
    KeyCode::KEY_LEFTSHIFT,
    KeyCode::KEY_RIGHTSHIFT,
    KeyCode::KEY_LEFTALT,
    KeyCode::KEY_RIGHTALT,
    KeyCode::KEY_LEFTMETA,
    KeyCode::KEY_RIGHTMETA,
];

pub fn key_name(code: KeyCode) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, name)| *name)
}

/// Build the input event for a pressed key from the held modifiers
///
/// Modifier keys themselves and unmapped keys produce nothing.
pub fn key_input(code: KeyCode, held: &AttributeSetRef<KeyCode>) -> Option<KeyInput> {
    if MODIFIER_KEYS.contains(&code) {
        return None;
    }
    let name = key_name(code)?;
    Some(KeyInput {
        key: name.to_string(),
        control: held.contains(KeyCode::KEY_LEFTCTRL) || held.contains(KeyCode::KEY_RIGHTCTRL),
        meta: held.contains(KeyCode::KEY_LEFTMETA) || held.contains(KeyCode::KEY_RIGHTMETA),
        shift: held.contains(KeyCode::KEY_LEFTSHIFT) || held.contains(KeyCode::KEY_RIGHTSHIFT),
        alt: held.contains(KeyCode::KEY_LEFTALT) || held.contains(KeyCode::KEY_RIGHTALT),
    })
}

/// Splits raw key events into those passed on and presses reported to the loop
///
/// A suppressed press swallows its repeats and its release too.
pub struct KeyFilter {
    gate: InputGate,
    swallowed: HashSet<KeyCode>,
}

impl KeyFilter {
    pub fn new(gate: InputGate) -> Self {
        Self {
            gate,
            swallowed: HashSet::new(),
        }
    }

    /// Only a lockdown gate needs the keyboard grabbed
    pub fn grabs(&self) -> bool {
        self.gate.lockdown()
    }

    /// Returns the key events to re-emit and the presses to report
    ///
    /// Non-key events are dropped; the virtual keyboard appends its own sync.
    fn split(
        &mut self,
        batch: &[InputEvent],
        held: &AttributeSetRef<KeyCode>,
    ) -> (Vec<InputEvent>, Vec<KeyInput>) {
        let mut forward = Vec::new();
        let mut presses = Vec::new();

        for event in batch.iter().filter(|event| event.event_type() == EventType::KEY) {
            let code = KeyCode::new(event.code());
            if event.value() == input::KEY_PRESS {
                if let Some(key) = key_input(code, held) {
                    let suppress = self.gate.decide(&key) == InputVerdict::Suppress;
                    presses.push(key);
                    if suppress {
                        self.swallowed.insert(code);
                        continue;
                    }
                }
            } else if self.swallowed.contains(&code) {
                if event.value() == input::KEY_RELEASE {
                    self.swallowed.remove(&code);
                }
                continue;
            }
            forward.push(*event);
        }

        (forward, presses)
    }
}

/// Find all keyboard devices (anything that reports a Tab key)
fn find_all_keyboard_devices() -> Result<Vec<Device>> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();
    let entries = std::fs::read_dir(paths::DEV_INPUT).with_context(|| {
        format!(
            "Failed to read {} - are you in the '{}' group?",
            paths::DEV_INPUT,
            permissions::INPUT_GROUP
        )
    })?;

    for entry in entries {
        let path = entry?.path();
        let Ok(device) = Device::open(&path) else {
            continue;
        };
        if let Some(keys) = device.supported_keys()
            && keys.contains(KeyCode::KEY_TAB)
        {
            info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
            devices.push(device);
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");
    Ok(devices)
}

/// Spawn one listener thread per keyboard device
pub fn spawn_listener(
    events: EventSender,
    gate: &InputGate,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let devices = find_all_keyboard_devices()?;
    let mut handles = Vec::new();

    for device in devices {
        let events = events.clone();
        let filter = KeyFilter::new(gate.clone());
        let handle = thread::Builder::new()
            .name("kiosk-keyboard".to_string())
            .spawn(move || {
                info!(device = ?device.name(), grab = filter.grabs(), "Keyboard listener started");
                if let Err(e) = listen(device, filter, events) {
                    error!(error = ?e, "Keyboard listener error");
                }
            })
            .context("Failed to spawn keyboard listener thread")?;
        handles.push(handle);
    }

    Ok(handles)
}

/// Grab the keyboard behind a virtual one carrying the same keys
fn passthrough(device: &mut Device) -> Result<VirtualDevice> {
    let keys = device
        .supported_keys()
        .context("Keyboard reports no keys")?;
    let output = VirtualDevice::builder()
        .and_then(|builder| builder.name(input::VIRTUAL_KEYBOARD_NAME).with_keys(keys))
        .and_then(|builder| builder.build())
        .context("Failed to create virtual keyboard - is /dev/uinput writable?")?;
    device.grab().context("Failed to grab keyboard")?;
    Ok(output)
}

fn listen(mut device: Device, mut filter: KeyFilter, events: EventSender) -> Result<()> {
    let mut output = None;
    if filter.grabs() {
        match passthrough(&mut device) {
            Ok(virtual_device) => {
                info!(device = ?device.name(), "Keyboard grabbed, shortcuts are blocked");
                output = Some(virtual_device);
            }
            Err(e) => warn!(error = ?e, "Shortcuts cannot be blocked, observing keyboard only"),
        }
    }

    loop {
        // Events are collected first; the key state query needs the device again
        let batch: Vec<InputEvent> = device
            .fetch_events()
            .context("Failed to fetch events")?
            .inspect(|event| trace!(code = event.code(), value = event.value(), "Input event"))
            .collect();

        if !batch.iter().any(|event| event.event_type() == EventType::KEY) {
            continue;
        }

        let held = device
            .get_key_state()
            .context("Failed to get keyboard state")?;
        let (forward, presses) = filter.split(&batch, &held);

        if let Some(output) = output.as_mut()
            && !forward.is_empty()
        {
            output.emit(&forward).context("Failed to re-emit keys")?;
        }

        for input in presses {
            debug!(key = %input.key, control = input.control, shift = input.shift, "Key press");
            if events.send(KioskEvent::Host(HostEvent::Input(input))).is_err() {
                debug!("Event loop gone, stopping keyboard listener");
                return Ok(());
            }
        }
    }
}

/// Check if keyboard input is available (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}

/// Log a helpful error if permissions are missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "The debug exit requires group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without keyboard input...");
}
