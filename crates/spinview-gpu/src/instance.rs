//! Vulkan instance creation.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, CStr, CString};

/// Layer enabled when validation is requested.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Return the first name in `required` that is absent from `available`.
pub fn find_missing<'a>(available: &[&CStr], required: &[&'a CStr]) -> Option<&'a CStr> {
    required
        .iter()
        .copied()
        .find(|name| !available.contains(name))
}

/// Collect the names of the installed instance layers.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
unsafe fn available_layers(entry: &ash::Entry) -> Result<Vec<CString>> {
    let properties = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(properties
        .iter()
        .map(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) }.to_owned())
        .collect())
}

/// Create a Vulkan instance able to present to `display`.
///
/// With `enable_validation` the Khronos validation layer and the debug utils
/// extension are enabled; a missing layer is an error.
///
/// # Safety
/// The entry must be a valid Vulkan entry point and `display` a live display handle.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|e| GpuError::InvalidState(format!("Application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"spinview")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    let mut extension_names: Vec<*const c_char> =
        ash_window::enumerate_required_extensions(display)?.to_vec();
    if enable_validation {
        extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    #[cfg(target_os = "macos")]
    extension_names.push(ash::khr::portability_enumeration::NAME.as_ptr());

    let layers: &[&CStr] = if enable_validation {
        &[VALIDATION_LAYER]
    } else {
        &[]
    };

    if !layers.is_empty() {
        let installed = unsafe { available_layers(entry)? };
        let installed: Vec<&CStr> = installed.iter().map(CString::as_c_str).collect();
        if let Some(missing) = find_missing(&installed, layers) {
            return Err(GpuError::ValidationLayerMissing(
                missing.to_string_lossy().into_owned(),
            ));
        }
    }

    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = unsafe { entry.create_instance(&create_info, None)? };

    tracing::debug!(
        "Instance created ({} extensions, validation: {})",
        extension_names.len(),
        enable_validation
    );

    Ok(instance)
}
