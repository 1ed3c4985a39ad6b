//! Navigation panel UI.
//!
//! Hosts the mode-selection buttons, the location search, and the settings
//! editor. The panel only requests mode transitions; all mode side effects
//! live in the view-mode controller.

use bevy::{ecs::system::SystemParam, prelude::*};
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass, egui};
use leafwing_input_manager::prelude::*;

use crate::async_runtime::TaskSpawner;
use crate::coords::ecef_to_geodetic;
use crate::floating_origin::FloatingOriginCamera;
use crate::geo::{FlyToAnimation, FlyToState, GeocodingState, HttpClient};
use crate::input::NavAction;
use crate::sim::NavSettings;
use crate::view_mode::{
    CursorGrabRequest, SceneProjection, SceneProjectionMode, ScreenSpaceController, ViewMode,
    ViewModeState, ViewModeTransitions,
};

/// Resource controlling whether the navigation panel is visible.
#[derive(Resource)]
pub struct UiVisible(pub bool);

impl Default for UiVisible {
    fn default() -> Self {
        Self(true)
    }
}

/// Plugin for the navigation panel.
pub struct NavUiPlugin;

impl Plugin for NavUiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .init_resource::<UiVisible>()
            .add_systems(Update, toggle_ui_visible)
            .add_systems(
                EguiPrimaryContextPass,
                nav_panel_system.run_if(|visible: Res<UiVisible>| visible.0),
            );
    }
}

/// Toggle panel visibility with Q.
#[allow(clippy::needless_pass_by_value)]
fn toggle_ui_visible(
    action_query: Query<&ActionState<NavAction>>,
    mut visible: ResMut<UiVisible>,
) {
    let Ok(action_state) = action_query.single() else {
        return;
    };
    if action_state.just_pressed(&NavAction::ToggleUi) {
        visible.0 = !visible.0;
    }
}

/// Resources for the mode row and status readout.
#[derive(SystemParam)]
struct ModeParams<'w> {
    state: Res<'w, ViewModeState>,
    transitions: ResMut<'w, ViewModeTransitions>,
    controller: Res<'w, ScreenSpaceController>,
    animation: Res<'w, FlyToAnimation>,
    grab_request: Res<'w, CursorGrabRequest>,
}

/// Resources for the location search section.
#[derive(SystemParam)]
struct SearchParams<'w, 's> {
    geocoding: ResMut<'w, GeocodingState>,
    fly_to: ResMut<'w, FlyToState>,
    client: Res<'w, HttpClient>,
    spawner: TaskSpawner<'w, 's>,
}

/// Resources for the settings editor.
#[derive(SystemParam)]
struct SettingsParams<'w> {
    nav: ResMut<'w, NavSettings>,
    scene: ResMut<'w, SceneProjection>,
}

/// Render the navigation panel.
#[allow(clippy::needless_pass_by_value)]
fn nav_panel_system(
    mut contexts: EguiContexts,
    time: Res<Time>,
    camera_query: Query<&FloatingOriginCamera>,
    mut mode: ModeParams,
    mut search: SearchParams,
    mut settings: SettingsParams,
) -> Result {
    let ctx = contexts.ctx_mut()?;

    egui::Window::new("Navigation")
        .default_pos([10.0, 10.0])
        .show(ctx, |ui| {
            render_mode_row(ui, &mut mode);
            ui.separator();
            render_status(ui, &mode, &camera_query);
            ui.separator();
            render_search(ui, &time, &mut search);

            if mode.state.current() == ViewMode::Settings {
                ui.separator();
                render_settings(ui, &mut settings);
            }
        });

    Ok(())
}

/// The mode-selection button row.
fn render_mode_row(ui: &mut egui::Ui, mode: &mut ModeParams) {
    let current = mode.state.current();
    ui.horizontal_wrapped(|ui| {
        for (target, label) in [
            (ViewMode::Orbit, "Orbit"),
            (ViewMode::Explore, "Explore"),
            (ViewMode::FirstPerson, "First person"),
            (ViewMode::Car, "Car"),
            (ViewMode::Flight, "Flight"),
            (ViewMode::Settings, "Settings"),
        ] {
            if ui.selectable_label(current == target, label).clicked() {
                mode.transitions.request(target);
            }
        }
    });
}

/// Current position, mode hint, and fly-to progress.
fn render_status(
    ui: &mut egui::Ui,
    mode: &ModeParams,
    camera_query: &Query<&FloatingOriginCamera>,
) {
    if let Ok(camera) = camera_query.single() {
        if let Some(geo) = ecef_to_geodetic(camera.position) {
            ui.label(format!(
                "{:.5}°, {:.5}°  ·  {:.0} m",
                geo.lat, geo.lon, geo.height
            ));
        }
    }

    let hint = match mode.state.current() {
        ViewMode::Orbit | ViewMode::Explore => {
            if mode.controller.all_enabled() {
                "Drag to rotate, scroll to zoom, right-drag to tilt"
            } else {
                "Native controls disabled"
            }
        }
        ViewMode::FirstPerson => {
            if mode.grab_request.is_pending() {
                "Acquiring mouse control"
            } else {
                "WASD to walk, mouse to look, Esc to exit"
            }
        }
        ViewMode::Car => "W/S throttle, A/D steer",
        ViewMode::Flight => "WASD + Space/Ctrl to fly, arrows to turn",
        ViewMode::Settings => "Simulation paused",
    };
    ui.label(hint);

    if let Some(progress) = mode.animation.progress() {
        ui.add(egui::ProgressBar::new(progress).text("Flying"));
    }
}

/// Location search with fly-to on result click.
fn render_search(ui: &mut egui::Ui, time: &Time, search: &mut SearchParams) {
    ui.horizontal(|ui| {
        ui.text_edit_singleline(&mut search.geocoding.search_text);
        let search_clicked = ui.button("Search").clicked();
        let enter_pressed =
            ui.input(|i| i.key_pressed(egui::Key::Enter)) && !search.geocoding.search_text.is_empty();
        if search_clicked || enter_pressed {
            search
                .geocoding
                .start_request(time.elapsed_secs_f64(), &search.client, &search.spawner);
        }
    });

    if search.geocoding.is_loading {
        ui.label("Searching…");
    }
    if let Some(error) = &search.geocoding.error {
        ui.colored_label(egui::Color32::LIGHT_RED, error);
    }

    let results: Vec<_> = search.geocoding.results.clone();
    for result in results {
        if ui.link(&result.display_name).clicked() {
            search
                .fly_to
                .request(result.lat, result.lon, &search.client, &search.spawner);
        }
    }
    if search.fly_to.is_pending() {
        ui.label("Locating destination…");
    }
    if let Some(error) = &search.fly_to.error {
        ui.colored_label(egui::Color32::LIGHT_RED, error);
    }
}

/// Settings editor shown in Settings mode.
fn render_settings(ui: &mut egui::Ui, settings: &mut SettingsParams) {
    egui::Grid::new("nav_settings").num_columns(2).show(ui, |ui| {
        ui.label("Walk speed:");
        ui.add(egui::Slider::new(&mut settings.nav.walk_speed, 1.0..=20.0).suffix(" m/s"));
        ui.end_row();

        ui.label("Car speed:");
        ui.add(egui::Slider::new(&mut settings.nav.car_speed, 5.0..=80.0).suffix(" m/s"));
        ui.end_row();

        ui.label("Flight speed:");
        ui.add(
            egui::Slider::new(&mut settings.nav.flight_speed, 10.0..=1000.0)
                .logarithmic(true)
                .suffix(" m/s"),
        );
        ui.end_row();

        ui.label("Turn speed:");
        ui.add(egui::Slider::new(&mut settings.nav.turn_speed, 0.5..=4.0).suffix(" rad/s"));
        ui.end_row();

        ui.label("Walk eye height:");
        ui.add(egui::Slider::new(&mut settings.nav.walk_eye_height, 1.0..=3.0).suffix(" m"));
        ui.end_row();

        ui.label("Car eye height:");
        ui.add(egui::Slider::new(&mut settings.nav.car_eye_height, 1.0..=5.0).suffix(" m"));
        ui.end_row();
    });

    ui.horizontal(|ui| {
        ui.label("Scene view:");
        ui.selectable_value(
            &mut settings.scene.mode,
            SceneProjectionMode::Globe3D,
            "3D globe",
        );
        ui.selectable_value(
            &mut settings.scene.mode,
            SceneProjectionMode::Map2D,
            "2D map",
        );
    });
}
