//! Physical device selection and logical device creation.

use crate::error::{GpuError, Result};
use crate::instance::find_missing;
use crate::surface::SurfaceContext;
use ash::vk;
use std::ffi::{c_char, CStr, CString};

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [ash::khr::swapchain::NAME];

/// Queue family indices found on a physical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both a graphics and a present family were found.
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// The distinct families a logical device needs queues from.
    pub fn unique(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        families.dedup();
        families
    }
}

/// Scan queue families in order, keeping the latest graphics-capable and
/// present-capable family, and stop once both are known.
pub fn find_queue_families(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }
        if family.queue_count > 0 && supports_present(i) {
            indices.present = Some(i);
        }
        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// What was learned about one physical device while screening it.
#[derive(Clone, Debug, Default)]
pub struct DeviceCandidate {
    pub queue_families: QueueFamilyIndices,
    pub extensions_supported: bool,
    pub format_count: usize,
    pub present_mode_count: usize,
}

impl DeviceCandidate {
    /// A device is usable when it can draw and present, has the swapchain
    /// extension, and advertises at least one format and present mode.
    pub const fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.extensions_supported
            && self.format_count > 0
            && self.present_mode_count > 0
    }
}

/// Index of the first suitable candidate.
pub fn select_candidate(candidates: &[DeviceCandidate]) -> Option<usize> {
    candidates.iter().position(DeviceCandidate::is_suitable)
}

/// Gather the selection inputs for one physical device.
///
/// # Safety
/// The instance, device and surface must be valid.
unsafe fn screen_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface: &SurfaceContext,
) -> Result<DeviceCandidate> {
    let families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
    let queue_families = find_queue_families(&families, |i| {
        surface
            .supports_present(physical_device, i)
            .unwrap_or(false)
    });

    let extensions =
        unsafe { instance.enumerate_device_extension_properties(physical_device)? };
    let names: Vec<CString> = extensions
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
        .collect();
    let names: Vec<&CStr> = names.iter().map(CString::as_c_str).collect();
    let extensions_supported = find_missing(&names, &REQUIRED_DEVICE_EXTENSIONS).is_none();

    // Surface support is only meaningful once the swapchain extension exists.
    let (format_count, present_mode_count) = if extensions_supported {
        let support = surface.support(physical_device)?;
        (support.formats.len(), support.present_modes.len())
    } else {
        (0, 0)
    };

    Ok(DeviceCandidate {
        queue_families,
        extensions_supported,
        format_count,
        present_mode_count,
    })
}

/// Pick the first physical device that can render to `surface`.
///
/// # Safety
/// The instance and surface must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    surface: &SurfaceContext,
) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        return Err(GpuError::NoDevices);
    }

    let mut candidates = Vec::with_capacity(devices.len());
    for &device in &devices {
        let candidate = unsafe { screen_device(instance, device, surface)? };
        let name = unsafe {
            let properties = instance.get_physical_device_properties(device);
            CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned()
        };
        tracing::debug!("{name}: suitable = {}", candidate.is_suitable());
        candidates.push(candidate);
    }

    let index = select_candidate(&candidates).ok_or(GpuError::NoSuitableDevice)?;
    Ok((devices[index], candidates[index].queue_families))
}

/// Create the logical device with one queue per distinct family.
///
/// # Safety
/// The instance and physical device must be valid and `families` complete.
pub unsafe fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let (Some(graphics), Some(present)) = (families.graphics, families.present) else {
        return Err(GpuError::NoSuitableDevice);
    };

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = families
        .unique()
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &create_info, None)? };

    let graphics_queue = unsafe { device.get_device_queue(graphics, 0) };
    let present_queue = unsafe { device.get_device_queue(present, 0) };

    Ok((device, graphics_queue, present_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_does_everything() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = find_queue_families(&families, |_| true);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn split_graphics_and_present() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let indices = find_queue_families(&families, |i| i == 1);
        assert_eq!(indices.graphics, Some(0));
        assert_eq!(indices.present, Some(1));
        assert_eq!(indices.unique(), vec![0, 1]);
    }

    #[test]
    fn later_family_overwrites_until_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        // Present only on family 1: graphics is overwritten to 1, then the scan stops.
        let indices = find_queue_families(&families, |i| i == 1);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(1));
    }

    #[test]
    fn missing_present_is_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = find_queue_families(&families, |_| false);
        assert!(!indices.is_complete());
    }

    #[test]
    fn empty_families_are_skipped() {
        let families = [vk::QueueFamilyProperties {
            queue_flags: vk::QueueFlags::GRAPHICS,
            queue_count: 0,
            ..Default::default()
        }];
        assert_eq!(find_queue_families(&families, |_| true), QueueFamilyIndices::default());
    }

    #[test]
    fn first_suitable_device_wins() {
        let complete = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        let no_formats = DeviceCandidate {
            queue_families: complete,
            extensions_supported: true,
            format_count: 0,
            present_mode_count: 2,
        };
        let no_swapchain = DeviceCandidate {
            queue_families: complete,
            extensions_supported: false,
            ..Default::default()
        };
        let good = DeviceCandidate {
            queue_families: complete,
            extensions_supported: true,
            format_count: 3,
            present_mode_count: 1,
        };

        assert_eq!(
            select_candidate(&[no_formats.clone(), no_swapchain, good.clone(), good]),
            Some(2)
        );
        assert_eq!(select_candidate(&[no_formats]), None);
        assert_eq!(select_candidate(&[]), None);
    }
}
