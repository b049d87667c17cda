//! GPU context management.

use crate::debug::DebugMessenger;
use crate::device::{create_logical_device, select_physical_device, QueueFamilyIndices};
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use crate::memory::GpuAllocator;
use crate::surface::{SurfaceContext, SurfaceSupport};
use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;
use std::sync::Arc;

/// Connection to the graphics backend for one window.
///
/// Owns the instance, optional debug messenger, presentation surface, the
/// selected physical device, the logical device with its queues, and the
/// memory allocator. Dropping it waits for the device to go idle and then
/// releases everything in reverse creation order.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug: Option<DebugMessenger>,
    surface: SurfaceContext,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    allocator: Mutex<GpuAllocator>,
    queue_families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &SurfaceContext {
        &self.surface
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Query the surface against the selected device.
    pub fn surface_support(&self) -> Result<SurfaceSupport> {
        self.surface.support(self.physical_device)
    }

    /// Graphics and present queue family indices.
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.queue_families.graphics.unwrap_or_default()
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Allocator memory must go before the device that owns it
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(debug) = &self.debug {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "spinview".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context for `window`.
    ///
    /// # Safety
    /// The window must outlive the returned context.
    pub unsafe fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::EntryLoad(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.enable_validation)? };

        // From here on every failure must release what was already created.
        let debug = if self.enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(debug) => Some(debug),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let release_instance = |debug: &Option<DebugMessenger>| unsafe {
            if let Some(debug) = debug {
                debug.destroy();
            }
            instance.destroy_instance(None);
        };

        let surface = match unsafe { SurfaceContext::from_window(&entry, &instance, window) } {
            Ok(surface) => surface,
            Err(e) => {
                release_instance(&debug);
                return Err(e);
            }
        };

        let selected = unsafe { select_physical_device(&instance, &surface) }.and_then(
            |(physical_device, queue_families)| {
                let (device, graphics_queue, present_queue) = unsafe {
                    create_logical_device(&instance, physical_device, &queue_families)?
                };
                Ok((physical_device, queue_families, device, graphics_queue, present_queue))
            },
        );
        let (physical_device, queue_families, device, graphics_queue, present_queue) =
            match selected {
                Ok(selected) => selected,
                Err(e) => {
                    unsafe { surface.destroy() };
                    release_instance(&debug);
                    return Err(e);
                }
            };

        let device = Arc::new(device);

        let allocator =
            match unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) } {
                Ok(allocator) => allocator,
                Err(e) => {
                    unsafe {
                        device.destroy_device(None);
                        surface.destroy();
                    }
                    release_instance(&debug);
                    return Err(e);
                }
            };

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        let name = unsafe {
            let properties = instance.get_physical_device_properties(physical_device);
            CStr::from_ptr(properties.device_name.as_ptr())
                .to_string_lossy()
                .into_owned()
        };
        tracing::info!(
            "Selected GPU: {name} (graphics family {:?}, present family {:?})",
            queue_families.graphics,
            queue_families.present
        );

        Ok(GpuContext {
            entry,
            instance,
            debug,
            surface,
            physical_device,
            device,
            swapchain_loader,
            allocator: Mutex::new(allocator),
            queue_families,
            graphics_queue,
            present_queue,
        })
    }
}
