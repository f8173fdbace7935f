use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use global_hotkey::hotkey::HotKey;
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};

use super::{ShortcutAction, ShortcutBackend, ShortcutError};
use crate::macros::Hotkey;

type Bindings = Arc<Mutex<HashMap<u32, ShortcutAction>>>;

/// OS global shortcuts through the `global-hotkey` crate.
///
/// Pressed events are read on a dedicated thread and handed to `on_trigger`.
pub struct GlobalHotkeyBackend {
    manager: GlobalHotKeyManager,
    active: Vec<HotKey>,
    bindings: Bindings,
}

impl GlobalHotkeyBackend {
    pub fn new<F>(on_trigger: F) -> Result<Self, ShortcutError>
    where
        F: Fn(ShortcutAction) + Send + 'static,
    {
        let manager = GlobalHotKeyManager::new().map_err(|err| ShortcutError::Unavailable {
            message: err.to_string(),
        })?;
        let bindings: Bindings = Arc::default();
        spawn_event_pump(bindings.clone(), on_trigger)?;

        Ok(Self {
            manager,
            active: Vec::new(),
            bindings,
        })
    }
}

fn spawn_event_pump<F>(bindings: Bindings, on_trigger: F) -> Result<(), ShortcutError>
where
    F: Fn(ShortcutAction) + Send + 'static,
{
    std::thread::Builder::new()
        .name("ft-capture-hotkeys".to_string())
        .spawn(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            while let Ok(event) = receiver.recv() {
                if !matches!(event.state, HotKeyState::Pressed) {
                    continue;
                }
                let action = bindings
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(&event.id)
                    .copied();
                match action {
                    Some(action) => on_trigger(action),
                    None => tracing::debug!(id = event.id, "ignoring unbound hotkey event"),
                }
            }
        })
        .map(|_| ())
        .map_err(|err| ShortcutError::Unavailable {
            message: format!("failed to start hotkey listener: {err}"),
        })
}

impl ShortcutBackend for GlobalHotkeyBackend {
    fn unregister_all(&mut self) -> Result<(), ShortcutError> {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let active = std::mem::take(&mut self.active);
        self.manager
            .unregister_all(&active)
            .map_err(|err| ShortcutError::Unavailable {
                message: err.to_string(),
            })
    }

    fn register(&mut self, hotkey: &Hotkey, action: ShortcutAction) -> Result<(), ShortcutError> {
        let rejected = |message: String| ShortcutError::Rejected {
            hotkey: hotkey.clone(),
            message,
        };
        let key: HotKey = hotkey
            .as_str()
            .parse()
            .map_err(|err: global_hotkey::hotkey::HotKeyParseError| rejected(err.to_string()))?;
        self.manager
            .register(key)
            .map_err(|err| rejected(err.to_string()))?;

        self.active.push(key);
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.id(), action);
        Ok(())
    }
}
