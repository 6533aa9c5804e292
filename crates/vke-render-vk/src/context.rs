// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use anyhow::{anyhow, bail, Context, Result};
use ash::khr::{portability_enumeration, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, info, warn};

use crate::debug::{DebugMessenger, VALIDATION_LAYER};
use crate::select;

const ENGINE_NAME: &CStr = c"vke";
const PORTABILITY_SUBSET: &CStr = c"VK_KHR_portability_subset";
const GET_PHYSICAL_DEVICE_PROPERTIES2: &CStr = c"VK_KHR_get_physical_device_properties2";

pub struct ContextOptions<'a> {
    pub app_name: &'a str,
    pub validation: bool,
}

fn version_string(v: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(v),
        vk::api_version_minor(v),
        vk::api_version_patch(v)
    )
}

fn has_extension(props: &[vk::ExtensionProperties], name: &CStr) -> bool {
    props
        .iter()
        .any(|p| p.extension_name_as_c_str().is_ok_and(|n| n == name))
}

/// Loader, instance and debug messenger. Owned on its own so a failure while
/// picking or creating the device still tears the instance down.
struct InstanceOwner {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
}

impl Drop for InstanceOwner {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Instance, device and queue. One per process; everything else borrows it.
///
/// Teardown runs in reverse creation order once the device is idle: the
/// device in `Drop`, then the instance when `inst` drops.
pub struct DeviceContext {
    phys: vk::PhysicalDevice,
    device: ash::Device,
    queue_family: u32,
    queue: vk::Queue,
    inst: InstanceOwner,
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
        info!("vk: device context destroyed");
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    opts: &ContextOptions<'_>,
    api_version: u32,
) -> Result<(Instance, bool)> {
    let available = unsafe { entry.enumerate_instance_extension_properties(None) }
        .context("enumerate_instance_extension_properties")?;
    debug!("vk: {} instance extensions available", available.len());
    for p in &available {
        if let Ok(name) = p.extension_name_as_c_str() {
            debug!("vk:   {:?} (spec {})", name, p.spec_version);
        }
    }

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .context("enumerate_required_extensions")?
        .to_vec();
    let mut flags = vk::InstanceCreateFlags::empty();

    if has_extension(&available, GET_PHYSICAL_DEVICE_PROPERTIES2) {
        extensions.push(GET_PHYSICAL_DEVICE_PROPERTIES2.as_ptr());
    }
    if has_extension(&available, portability_enumeration::NAME) {
        extensions.push(portability_enumeration::NAME.as_ptr());
        flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let mut layers: Vec<*const c_char> = Vec::new();
    let mut validation = false;
    if opts.validation {
        let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
            .context("enumerate_instance_layer_properties")?;
        let has_layer = layer_props
            .iter()
            .any(|l| l.layer_name_as_c_str().is_ok_and(|n| n == VALIDATION_LAYER));
        if !has_layer {
            warn!("vk: {:?} not installed; running without validation", VALIDATION_LAYER);
        } else if !has_extension(&available, ash::ext::debug_utils::NAME) {
            warn!("vk: VK_EXT_debug_utils missing; running without validation");
        } else {
            layers.push(VALIDATION_LAYER.as_ptr());
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
            validation = true;
        }
    }

    let app_name = CString::new(opts.app_name).context("application name contains NUL")?;
    let app_info = vk::ApplicationInfo {
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: ENGINE_NAME.as_ptr(),
        engine_version: 0,
        api_version,
        ..Default::default()
    };

    let create_info = vk::InstanceCreateInfo {
        flags,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };

    let instance = unsafe { entry.create_instance(&create_info, None) }.context("create_instance")?;
    Ok((instance, validation))
}

unsafe fn select_physical_device(instance: &Instance) -> Result<(vk::PhysicalDevice, u32)> {
    let devices =
        unsafe { instance.enumerate_physical_devices() }.context("enumerate_physical_devices")?;
    let kinds: Vec<_> = devices
        .iter()
        .map(|&d| unsafe { instance.get_physical_device_properties(d) }.device_type)
        .collect();
    let phys = select::pick_physical_device(&kinds)
        .map(|i| devices[i])
        .ok_or_else(|| anyhow!("no Vulkan physical device found"))?;

    let props = unsafe { instance.get_physical_device_properties(phys) };
    info!(
        "vk: physical device {:?} ({:?}, api {})",
        props.device_name_as_c_str().unwrap_or(c"<unnamed>"),
        props.device_type,
        version_string(props.api_version)
    );

    let families = unsafe { instance.get_physical_device_queue_family_properties(phys) };
    let queue_family = select::pick_queue_family(&families)
        .ok_or_else(|| anyhow!("no graphics queue family on the selected device"))?;
    Ok((phys, queue_family))
}

unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<ash::Device> {
    let available = unsafe { instance.enumerate_device_extension_properties(phys) }
        .context("enumerate_device_extension_properties")?;
    if !has_extension(&available, swapchain::NAME) {
        bail!("device lacks VK_KHR_swapchain");
    }
    let mut device_exts: Vec<*const c_char> = vec![swapchain::NAME.as_ptr()];
    if has_extension(&available, PORTABILITY_SUBSET) {
        device_exts.push(PORTABILITY_SUBSET.as_ptr());
    }

    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };
    let dinfo = vk::DeviceCreateInfo {
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };
    unsafe { instance.create_device(phys, &dinfo, None) }.context("create_device")
}

impl DeviceContext {
    /// Loads the Vulkan loader and brings up instance, device and queue for
    /// a window living on `display`.
    pub unsafe fn new(display: RawDisplayHandle, opts: &ContextOptions<'_>) -> Result<Self> {
        let entry = unsafe { Entry::load() }.context("load Vulkan loader")?;
        let loader_version = unsafe { entry.try_enumerate_instance_version() }
            .context("enumerate_instance_version")?
            .unwrap_or(vk::API_VERSION_1_0);
        let api_version = loader_version.min(vk::API_VERSION_1_3);
        info!(
            "vk: loader {}, headers {}, requesting api {}",
            version_string(loader_version),
            vk::HEADER_VERSION,
            version_string(api_version)
        );

        let (instance, validation) = unsafe { create_instance(&entry, display, opts, api_version) }?;
        let mut inst = InstanceOwner {
            entry,
            instance,
            debug: None,
        };
        if validation {
            inst.debug = Some(unsafe { DebugMessenger::new(&inst.entry, &inst.instance) }?);
        }
        info!("vk: instance created (validation={validation})");

        let (phys, queue_family) = unsafe { select_physical_device(&inst.instance) }?;
        let device = unsafe { create_device(&inst.instance, phys, queue_family) }?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };
        info!("vk: logical device ready (queue family {queue_family})");

        Ok(Self {
            phys,
            device,
            queue_family,
            queue,
            inst,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.inst.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.inst.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn validation_enabled(&self) -> bool {
        self.inst.debug.is_some()
    }

    /// Short-lived pool for one-off uploads on this context's queue family.
    pub fn create_transient_pool(&self) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo {
            flags: vk::CommandPoolCreateFlags::TRANSIENT,
            queue_family_index: self.queue_family,
            ..Default::default()
        };
        unsafe { self.device.create_command_pool(&info, None) }.context("create_command_pool")
    }
}
