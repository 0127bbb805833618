// SPDX-License-Identifier: GPL-3.0-only

//! Device resolution policy

use crate::backends::{CameraPosition, DeviceDescriptor, DeviceType};
use crate::config::SessionConfiguration;
use crate::errors::{CameraError, CameraResult};
use tracing::debug;

/// Multi-lens device types, best first
const MULTI_LENS_PREFERENCE: [DeviceType; 3] = [
    DeviceType::TripleCamera,
    DeviceType::DualWideCamera,
    DeviceType::DualCamera,
];

/// Pick the device a session should bind
///
/// An explicit id wins. Otherwise the preferred types are tried in order at
/// the requested position, then any device at that position, then the first
/// camera the platform lists.
pub fn resolve_device(
    devices: &[DeviceDescriptor],
    config: &SessionConfiguration,
) -> CameraResult<DeviceDescriptor> {
    if let Some(id) = &config.device_id {
        return devices
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| CameraError::DeviceUnavailable(format!("no camera with id '{}'", id)));
    }

    if let Some(device) =
        select_for_position(devices, config.position, &config.preferred_device_types)
    {
        return Ok(device);
    }

    let fallback = devices
        .first()
        .cloned()
        .ok_or_else(|| CameraError::DeviceUnavailable("no camera devices".to_string()))?;
    debug!(
        requested = %config.position,
        fallback = %fallback.id,
        "No camera at requested position, using default device"
    );
    Ok(fallback)
}

/// Best device at `position` honouring the type preference order
pub fn select_for_position(
    devices: &[DeviceDescriptor],
    position: CameraPosition,
    preferred: &[DeviceType],
) -> Option<DeviceDescriptor> {
    let at_position = || devices.iter().filter(move |d| d.position == position);

    preferred
        .iter()
        .find_map(|device_type| at_position().find(|d| d.device_type == *device_type))
        .or_else(|| at_position().find(|d| d.lens_count() == 1))
        .or_else(|| at_position().next())
        .cloned()
}

/// Best multi-lens device at `position`, if any
pub fn best_multi_lens(
    devices: &[DeviceDescriptor],
    position: CameraPosition,
) -> Option<DeviceDescriptor> {
    MULTI_LENS_PREFERENCE.iter().find_map(|device_type| {
        devices
            .iter()
            .find(|d| d.position == position && d.device_type == *device_type)
            .cloned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::synthetic::default_devices;

    #[test]
    fn test_explicit_id_wins() {
        let devices = default_devices();
        let config = SessionConfiguration {
            device_id: Some("synthetic:front".into()),
            position: CameraPosition::Back,
            ..SessionConfiguration::default()
        };
        assert_eq!(resolve_device(&devices, &config).unwrap().id, "synthetic:front");
    }

    #[test]
    fn test_unknown_id_is_unavailable() {
        let config = SessionConfiguration {
            device_id: Some("nope".into()),
            ..SessionConfiguration::default()
        };
        let err = resolve_device(&default_devices(), &config).unwrap_err();
        assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_preference_order() {
        let devices = default_devices();
        let config = SessionConfiguration {
            preferred_device_types: vec![DeviceType::Telephoto, DeviceType::UltraWide],
            ..SessionConfiguration::default()
        };
        assert_eq!(
            resolve_device(&devices, &config).unwrap().id,
            "synthetic:back-ultrawide"
        );
    }

    #[test]
    fn test_no_preference_prefers_single_lens() {
        let devices = default_devices();
        let picked = select_for_position(&devices, CameraPosition::Back, &[]).unwrap();
        assert_eq!(picked.id, "synthetic:back-wide");
    }

    #[test]
    fn test_missing_position_falls_back_to_first_device() {
        let devices: Vec<_> = default_devices()
            .into_iter()
            .filter(|d| d.position == CameraPosition::Back)
            .collect();
        let config = SessionConfiguration::with_position(CameraPosition::Front);
        assert_eq!(
            resolve_device(&devices, &config).unwrap().id,
            "synthetic:back-wide"
        );
        assert!(select_for_position(&devices, CameraPosition::Front, &[]).is_none());
    }

    #[test]
    fn test_empty_device_list() {
        let err = resolve_device(&[], &SessionConfiguration::default()).unwrap_err();
        assert!(matches!(err, CameraError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_multi_lens_lookup() {
        let devices = default_devices();
        assert_eq!(
            best_multi_lens(&devices, CameraPosition::Back).unwrap().id,
            "synthetic:back-triple"
        );
        assert!(best_multi_lens(&devices, CameraPosition::Front).is_none());
    }
}
