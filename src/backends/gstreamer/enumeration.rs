// SPDX-License-Identifier: GPL-3.0-only

//! Camera and microphone discovery through the GStreamer device monitor

use super::super::types::*;
use gstreamer as gst;
use tracing::{debug, info, warn};

/// Device id prefix for PipeWire object serials
pub const SERIAL_PREFIX: &str = "pipewire-serial-";

/// Read a property that PipeWire may expose as a string or an integer
fn prop_string(props: &gst::StructureRef, key: &str) -> Option<String> {
    if let Ok(value) = props.get::<String>(key) {
        return Some(value);
    }
    if let Ok(value) = props.get::<i32>(key) {
        return Some(value.to_string());
    }
    props.get::<i64>(key).ok().map(|v| v.to_string())
}

fn monitor_devices(class: &str) -> Vec<gst::Device> {
    let monitor = gst::DeviceMonitor::new();
    if monitor.add_filter(Some(class), None).is_none() {
        warn!(class, "Device monitor rejected filter");
        return Vec::new();
    }
    if let Err(e) = monitor.start() {
        warn!(class, error = %e, "Failed to start device monitor");
        return Vec::new();
    }
    let devices: Vec<gst::Device> = monitor.devices().into_iter().collect();
    monitor.stop();
    devices
}

/// Enumerate cameras; `torch_available` marks back cameras as torch-capable
pub fn enumerate_cameras(torch_available: bool, continuous_torch: bool) -> Vec<DeviceDescriptor> {
    let mut cameras = Vec::new();

    for device in monitor_devices("Video/Source") {
        let name = device.display_name().to_string();
        let Some(props) = device.properties() else {
            debug!(name = %name, "Camera without properties, skipping");
            continue;
        };

        let id = match (
            prop_string(&props, "object.serial"),
            prop_string(&props, "object.path"),
        ) {
            (Some(serial), _) => format!("{}{}", SERIAL_PREFIX, serial),
            (None, Some(path)) => path,
            (None, None) => {
                debug!(name = %name, "Camera without serial or path, skipping");
                continue;
            }
        };

        let position = prop_string(&props, "api.libcamera.location")
            .map(|loc| CameraPosition::from_location(&loc))
            .unwrap_or(CameraPosition::External);
        let sensor_orientation = prop_string(&props, "api.libcamera.rotation")
            .and_then(|r| r.parse::<i32>().ok())
            .map(SensorRotation::from_degrees_int)
            .unwrap_or_default();
        let has_torch = torch_available && position == CameraPosition::Back;

        info!(id = %id, name = %name, %position, rotation = %sensor_orientation, "Found camera");
        cameras.push(DeviceDescriptor {
            id,
            name,
            position,
            device_type: if position == CameraPosition::External {
                DeviceType::External
            } else {
                DeviceType::WideAngle
            },
            has_flash: has_torch,
            has_torch,
            continuous_torch: has_torch && continuous_torch,
            min_zoom: 1.0,
            max_zoom: 1.0,
            sensor_orientation,
            is_active: false,
        });
    }

    // Built-in cameras first so the default device is a phone camera
    cameras.sort_by_key(|c| c.position == CameraPosition::External);
    cameras
}

/// Whether any audio capture device is present
pub fn has_microphone() -> bool {
    !monitor_devices("Audio/Source").is_empty()
}

/// pipewiresrc property selecting `device_id`
pub fn source_target(device_id: &str) -> String {
    match device_id.strip_prefix(SERIAL_PREFIX) {
        Some(serial) => format!("target-object={} ", serial),
        None if device_id.is_empty() => String::new(),
        None => format!("path={} ", device_id),
    }
}
