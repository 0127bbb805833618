// SPDX-License-Identifier: GPL-3.0-only

//! Torch LED control via Linux sysfs
//!
//! Discovers LEDs exposed at `/sys/class/leds/*:flash` or `*:torch` and
//! drives them through the `brightness` file, which is group-writable on
//! most phones. Intensity is continuous when `max_brightness` is above 1.

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default sysfs LED class directory
pub const SYSFS_LEDS: &str = "/sys/class/leds";

/// A torch-capable LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct TorchLed {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Maximum brightness value (from `max_brightness` file)
    max_brightness: u32,
    /// Directory basename
    name: String,
}

impl TorchLed {
    /// Scan `leds_dir` for writable flash/torch LEDs
    pub fn discover(leds_dir: &Path) -> Vec<TorchLed> {
        let Ok(entries) = std::fs::read_dir(leds_dir) else {
            debug!(dir = %leds_dir.display(), "LED class directory unreadable, no torch");
            return Vec::new();
        };

        let mut leds = Vec::new();

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name_str) = name.to_str() else {
                continue;
            };

            if !name_str.ends_with(":flash") && !name_str.ends_with(":torch") {
                continue;
            }

            let led_path = entry.path();
            let max_brightness_path = led_path.join("max_brightness");

            let max_brightness = match std::fs::read_to_string(&max_brightness_path) {
                Ok(s) => match s.trim().parse::<u32>() {
                    Ok(v) if v > 0 => v,
                    _ => {
                        warn!(
                            path = %max_brightness_path.display(),
                            "Invalid max_brightness value"
                        );
                        continue;
                    }
                },
                Err(e) => {
                    warn!(
                        path = %max_brightness_path.display(),
                        error = %e,
                        "Cannot read max_brightness"
                    );
                    continue;
                }
            };

            let brightness_path = led_path.join("brightness");
            if let Err(e) = std::fs::OpenOptions::new()
                .write(true)
                .open(&brightness_path)
            {
                warn!(
                    path = %brightness_path.display(),
                    error = %e,
                    "Torch LED found but not writable"
                );
                continue;
            }

            info!(name = name_str, max_brightness, "Discovered torch LED");

            leds.push(TorchLed {
                path: led_path,
                max_brightness,
                name: name_str.to_string(),
            });
        }

        // Deterministic order (white before yellow)
        leds.sort_by(|a, b| a.name.cmp(&b.name));
        leds
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether intermediate levels exist
    pub fn is_continuous(&self) -> bool {
        self.max_brightness > 1
    }

    fn set_brightness(&self, value: u32) -> io::Result<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
    }

    pub fn off(&self) -> io::Result<()> {
        self.set_brightness(0)
    }

    /// Turn on at a fraction of max brightness; returns the level applied
    pub fn torch(&self, intensity: f32) -> io::Result<f32> {
        let clamped = intensity.clamp(0.0, 1.0);
        let mut value = (clamped * self.max_brightness as f32).round() as u32;
        if clamped > 0.0 && value == 0 {
            value = 1;
        }
        self.set_brightness(value)?;
        Ok(value as f32 / self.max_brightness as f32)
    }
}

/// Apply a level to every LED; `None` switches them off
pub fn apply(leds: &[TorchLed], level: Option<f32>) -> io::Result<()> {
    let mut last_err = None;
    for led in leds {
        let result = match level {
            Some(level) => led.torch(level).map(|_| ()),
            None => led.off(),
        };
        if let Err(e) = result {
            warn!(led = %led.name, error = %e, "Failed to drive torch LED");
            last_err = Some(e);
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("max_brightness"), max).unwrap();
        std::fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let root = tempfile::tempdir().unwrap();
        fake_led(root.path(), "yellow:flash", "255\n");
        fake_led(root.path(), "white:torch", "1");
        fake_led(root.path(), "input3::capslock", "1");
        fake_led(root.path(), "broken:flash", "zero");

        let leds = TorchLed::discover(root.path());
        let names: Vec<&str> = leds.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["white:torch", "yellow:flash"]);
        assert!(!leds[0].is_continuous());
        assert!(leds[1].is_continuous());
    }

    #[test]
    fn test_torch_writes_scaled_brightness() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_led(root.path(), "white:flash", "200");
        let leds = TorchLed::discover(root.path());

        let applied = leds[0].torch(0.5).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "100");
        assert!((applied - 0.5).abs() < f32::EPSILON);

        apply(&leds, None).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "0");
    }

    #[test]
    fn test_missing_directory_yields_nothing() {
        let leds = TorchLed::discover(Path::new("/nonexistent/leds"));
        assert!(leds.is_empty());
    }
}
