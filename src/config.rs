use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Rendering parameters supplied by the host shell and read by the core at
/// the start of each pass. The core never writes these.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    // target pass count of a convergence run
    pub num_samples: u32,
    pub num_bounces: u32,
    // degrees
    pub camera_fov: f32,
    // 0 == albedo preview, 1 == path traced
    pub shading: u32,
}

pub const SHADING_ALBEDO: u32 = 0;
pub const SHADING_PATH_TRACED: u32 = 1;

impl Default for RenderSettings {
    fn default() -> RenderSettings {
        RenderSettings {
            num_samples: 256,
            num_bounces: 4,
            camera_fov: 45.0,
            shading: SHADING_PATH_TRACED,
        }
    }
}

impl RenderSettings {
    /// Loads settings from a JSON file, falling back to the defaults when
    /// the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<RenderSettings, RenderError> {
        if !path.exists() {
            return Ok(RenderSettings::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_renderable() {
        let settings = RenderSettings::default();
        assert!(settings.num_samples > 0);
        assert!(settings.camera_fov > 0.0);
        assert_eq!(settings.shading, SHADING_PATH_TRACED);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "num_samples": 16, "shading": 0 }"#).unwrap();
        assert_eq!(settings.num_samples, 16);
        assert_eq!(settings.shading, SHADING_ALBEDO);
        assert_eq!(settings.num_bounces, RenderSettings::default().num_bounces);
        assert_eq!(settings.camera_fov, RenderSettings::default().camera_fov);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let settings =
            RenderSettings::load_or_default(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, RenderSettings::default());
    }
}
