//! Launch parameter parsing for the viewer.
//!
//! On native, parameters come from the command line via clap. On WASM,
//! defaults are used.

use bevy::prelude::*;

use crate::view_mode::ViewMode;

/// Default starting latitude (NYC).
const DEFAULT_LAT: f64 = 40.7;
/// Default starting longitude (NYC).
const DEFAULT_LON: f64 = -74.0;
/// Default starting altitude in meters.
const DEFAULT_ALTITUDE: f64 = 300.0;

/// Launch parameters for the viewer.
#[derive(Resource, Debug)]
pub struct LaunchParams {
    /// Starting latitude in degrees.
    pub lat: f64,
    /// Starting longitude in degrees.
    pub lon: f64,
    /// Starting altitude above the ellipsoid in meters.
    pub altitude: f64,
    /// Initial view mode.
    pub mode: ViewMode,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            lat: DEFAULT_LAT,
            lon: DEFAULT_LON,
            altitude: DEFAULT_ALTITUDE,
            mode: ViewMode::default(),
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    #[command(about = "Globe scene viewer with simulated navigation modes")]
    struct CliArgs {
        /// Starting latitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LAT)]
        lat: f64,

        /// Starting longitude in degrees.
        #[arg(long, default_value_t = DEFAULT_LON)]
        lon: f64,

        /// Starting altitude above the ellipsoid in meters.
        #[arg(long, default_value_t = DEFAULT_ALTITUDE)]
        altitude: f64,

        /// Initial view mode.
        #[arg(long, value_enum, default_value_t = ViewMode::default())]
        mode: ViewMode,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();
        LaunchParams {
            lat: args.lat,
            lon: args.lon,
            altitude: args.altitude,
            mode: args.mode,
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
