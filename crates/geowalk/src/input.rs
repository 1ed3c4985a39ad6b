//! Input state tracking and action definitions.
//!
//! Movement keys flow through [`PressedKeys`], an owned set of held key codes
//! updated from raw keyboard events and read by the simulation tick each
//! frame. Discrete UI-level actions (cursor grab, UI toggle, the Escape mode
//! exit) use `leafwing-input-manager` action maps with centralized input
//! focus management.

use std::collections::HashSet;

use bevy::{
    input::{ButtonState, keyboard::KeyboardInput},
    prelude::*,
    window::{CursorGrabMode, CursorOptions},
};
use bevy_egui::EguiContexts;
use leafwing_input_manager::{plugin::InputManagerSystem, prelude::*};

// ============================================================================
// Pressed key set
// ============================================================================

/// The set of currently held keyboard keys.
///
/// Holding a key fires repeated key-down events; re-inserting an
/// already-present code is a no-op, so the set always reflects net key state.
#[derive(Resource, Default)]
pub struct PressedKeys {
    keys: HashSet<KeyCode>,
}

impl PressedKeys {
    /// Record a key press.
    pub fn on_key_down(&mut self, code: KeyCode) {
        self.keys.insert(code);
    }

    /// Record a key release.
    pub fn on_key_up(&mut self, code: KeyCode) {
        self.keys.remove(&code);
    }

    /// Membership test for a single key.
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        self.keys.contains(&code)
    }

    /// Read-only view of the held key codes.
    pub fn pressed(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.keys.iter().copied()
    }

    /// Number of distinct held keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Release every held key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Signed axis value from a positive and a negative key.
    ///
    /// Both keys held cancel to zero.
    pub fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let pos = if self.is_pressed(positive) { 1.0 } else { 0.0 };
        let neg = if self.is_pressed(negative) { 1.0 } else { 0.0 };
        pos - neg
    }
}

/// Key bindings for the navigation modes.
#[derive(Resource, Clone)]
pub struct KeyBindings {
    pub forward: KeyCode,
    pub back: KeyCode,
    pub left: KeyCode,
    pub right: KeyCode,
    pub ascend: KeyCode,
    pub descend: KeyCode,
    pub yaw_left: KeyCode,
    pub yaw_right: KeyCode,
    pub pitch_up: KeyCode,
    pub pitch_down: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            ascend: KeyCode::Space,
            descend: KeyCode::ControlLeft,
            yaw_left: KeyCode::ArrowLeft,
            yaw_right: KeyCode::ArrowRight,
            pitch_up: KeyCode::ArrowUp,
            pitch_down: KeyCode::ArrowDown,
        }
    }
}

// ============================================================================
// Action enums
// ============================================================================

/// Discrete navigation actions outside the per-frame movement path.
#[derive(Actionlike, PartialEq, Eq, Hash, Clone, Copy, Debug, Reflect)]
pub enum NavAction {
    /// Grab the cursor (left click while in first-person without the grab).
    GrabCursor,
    /// Exit first-person mode (Escape).
    ExitFirstPerson,
    /// Toggle the navigation panel (Q).
    ToggleUi,
}

/// Create the default input map for navigation actions.
pub fn default_nav_input_map() -> InputMap<NavAction> {
    InputMap::default()
        .with(NavAction::GrabCursor, MouseButton::Left)
        .with(NavAction::ExitFirstPerson, KeyCode::Escape)
        .with(NavAction::ToggleUi, KeyCode::KeyQ)
}

// ============================================================================
// Plugin
// ============================================================================

/// Plugin for input state tracking and focus management.
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(InputManagerPlugin::<NavAction>::default())
            .init_resource::<PressedKeys>()
            .init_resource::<KeyBindings>()
            .add_systems(
                PreUpdate,
                (track_pressed_keys, manage_input_focus)
                    .chain()
                    .after(InputManagerSystem::Update),
            );
    }
}

/// Feed raw keyboard events into the pressed-key set.
///
/// While egui owns the keyboard (a focused text field), the set is cleared so
/// navigation does not consume characters typed into the UI.
fn track_pressed_keys(
    mut events: MessageReader<KeyboardInput>,
    mut pressed: ResMut<PressedKeys>,
    mut contexts: EguiContexts,
) {
    let egui_wants_kb = contexts
        .ctx_mut()
        .ok()
        .is_some_and(|ctx| ctx.wants_keyboard_input());

    if egui_wants_kb {
        pressed.clear();
        events.clear();
        return;
    }

    for event in events.read() {
        match event.state {
            ButtonState::Pressed => pressed.on_key_down(event.key_code),
            ButtonState::Released => pressed.on_key_up(event.key_code),
        }
    }
}

/// Manage which discrete actions are live for the current cursor state.
///
/// `GrabCursor` is only meaningful while the cursor is free. `ExitFirstPerson`
/// and `ToggleUi` stay available regardless (Escape must exit first-person
/// even after the windowing system released the grab on its own).
fn manage_input_focus(
    mut query: Query<&mut ActionState<NavAction>>,
    cursor: Single<&CursorOptions>,
) {
    let is_grabbed = matches!(
        cursor.grab_mode,
        CursorGrabMode::Locked | CursorGrabMode::Confined
    );

    for mut action_state in &mut query {
        action_state.enable_action(&NavAction::ToggleUi);
        action_state.enable_action(&NavAction::ExitFirstPerson);
        if is_grabbed {
            action_state.disable_action(&NavAction::GrabCursor);
        } else {
            action_state.enable_action(&NavAction::GrabCursor);
        }
    }
}

// ============================================================================
// Cursor grab helpers
// ============================================================================

/// Set cursor grab state, centering the cursor when grabbing.
pub fn set_cursor_grab(cursor: &mut CursorOptions, window: &mut Window, grabbed: bool) {
    if grabbed {
        // Native: Locked gives true mouse capture.
        // WASM: Confined (Locked is not supported in browsers).
        #[cfg(not(target_family = "wasm"))]
        {
            cursor.grab_mode = CursorGrabMode::Locked;
        }
        #[cfg(target_family = "wasm")]
        {
            cursor.grab_mode = CursorGrabMode::Confined;
        }
        cursor.visible = false;
        let center = Vec2::new(window.width() / 2.0, window.height() / 2.0);
        window.set_cursor_position(Some(center));
    } else {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
    }
}

/// Run condition: cursor is currently grabbed.
pub fn cursor_is_grabbed(cursor: Single<&CursorOptions>) -> bool {
    matches!(
        cursor.grab_mode,
        CursorGrabMode::Locked | CursorGrabMode::Confined
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_down_is_a_no_op() {
        let mut pressed = PressedKeys::default();
        pressed.on_key_down(KeyCode::KeyW);
        pressed.on_key_down(KeyCode::KeyW);
        pressed.on_key_down(KeyCode::KeyW);
        assert_eq!(pressed.len(), 1);
        assert!(pressed.is_pressed(KeyCode::KeyW));
    }

    #[test]
    fn key_up_reflects_net_state() {
        let mut pressed = PressedKeys::default();
        pressed.on_key_down(KeyCode::KeyW);
        pressed.on_key_down(KeyCode::KeyA);
        pressed.on_key_up(KeyCode::KeyW);
        assert!(!pressed.is_pressed(KeyCode::KeyW));
        assert!(pressed.is_pressed(KeyCode::KeyA));
        // Releasing a key that was never held is harmless.
        pressed.on_key_up(KeyCode::KeyX);
        assert_eq!(pressed.len(), 1);
    }

    #[test]
    fn pressed_view_reflects_held_keys() {
        let mut pressed = PressedKeys::default();
        pressed.on_key_down(KeyCode::KeyW);
        pressed.on_key_down(KeyCode::Space);
        let held: Vec<_> = pressed.pressed().collect();
        assert_eq!(held.len(), 2);
        assert!(held.contains(&KeyCode::KeyW));
        assert!(held.contains(&KeyCode::Space));
    }

    #[test]
    fn clear_empties_the_set() {
        let mut pressed = PressedKeys::default();
        pressed.on_key_down(KeyCode::KeyW);
        pressed.on_key_down(KeyCode::KeyS);
        pressed.clear();
        assert!(pressed.is_empty());
    }

    #[test]
    fn opposite_keys_cancel_on_an_axis() {
        let mut pressed = PressedKeys::default();
        pressed.on_key_down(KeyCode::KeyW);
        assert_eq!(pressed.axis(KeyCode::KeyW, KeyCode::KeyS), 1.0);
        pressed.on_key_down(KeyCode::KeyS);
        assert_eq!(pressed.axis(KeyCode::KeyW, KeyCode::KeyS), 0.0);
        pressed.on_key_up(KeyCode::KeyW);
        assert_eq!(pressed.axis(KeyCode::KeyW, KeyCode::KeyS), -1.0);
    }
}
