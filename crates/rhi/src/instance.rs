//! Vulkan instance management.
//!
//! This module handles VkInstance creation, validation layers, and routing of
//! validation messages into an injected [`DiagnosticSink`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkpresent_rhi::diagnostics::TracingSink;
//! use vkpresent_rhi::instance::Instance;
//! # fn display() -> raw_window_handle::RawDisplayHandle { unimplemented!() }
//!
//! let sink = Arc::new(TracingSink::new());
//! let instance = Instance::new(display(), cfg!(debug_assertions), sink)
//!     .expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::ffi::{CStr, c_char, c_void};
use std::sync::Arc;

use ash::{Entry, vk};
use raw_window_handle::RawDisplayHandle;
use tracing::{info, warn};

use crate::diagnostics::{DiagnosticSink, Severity};
use crate::error::RhiError;

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan instance wrapper with optional validation layer support.
///
/// The diagnostic sink is boxed so its address stays stable while the debug
/// messenger holds a pointer to it. It is released only after the messenger
/// and the instance are destroyed.
pub struct Instance {
    entry: Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    _sink: Box<Arc<dyn DiagnosticSink>>,
}

impl Instance {
    /// Creates a new Vulkan instance able to present to surfaces of `display`.
    ///
    /// # Arguments
    ///
    /// * `display` - Display handle used to pick the platform surface extensions
    /// * `enable_validation` - If true, enables validation layers and the debug messenger
    /// * `sink` - Receiver of validation messages
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded, the platform has
    /// no surface extensions, or instance creation fails.
    pub fn new(
        display: RawDisplayHandle,
        enable_validation: bool,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, RhiError> {
        let entry = unsafe { Entry::load()? };

        let validation_available =
            enable_validation && Self::is_validation_layer_available(&entry)?;
        if enable_validation && !validation_available {
            warn!("Validation layer requested but not available, proceeding without it");
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(c"vkpresent")
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(c"vkpresent")
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extensions = Self::required_extensions(display)?;
        if validation_available {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layers = if validation_available {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!("Vulkan instance created (API version 1.3)");

        let sink = Box::new(sink);

        let (debug_utils, debug_messenger) = if validation_available {
            let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
            let user_data = &*sink as *const Arc<dyn DiagnosticSink> as *mut c_void;
            match Self::setup_debug_messenger(&debug_utils, user_data) {
                Ok(messenger) => {
                    info!("Validation layers enabled");
                    (Some(debug_utils), Some(messenger))
                }
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            entry,
            instance,
            debug_utils,
            debug_messenger,
            _sink: sink,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Surface extensions required to present on `display`.
    fn required_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>, RhiError> {
        let extensions = ash_window::enumerate_required_extensions(display)
            .map_err(|e| RhiError::SurfaceError(format!("unsupported display: {e}")))?;
        Ok(extensions.to_vec())
    }

    fn is_validation_layer_available(entry: &Entry) -> Result<bool, RhiError> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        let found = available_layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        });

        Ok(found)
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
        user_data: *mut c_void,
    ) -> Result<vk::DebugUtilsMessengerEXT, RhiError> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .user_data(user_data);

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };

        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            // Messenger first: it points at the sink.
            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Maps a Vulkan message severity onto the sink's severity scale.
fn map_severity(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Severity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        Severity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        Severity::Warning
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        Severity::Info
    } else {
        Severity::Verbose
    }
}

fn type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    }
}

/// Debug callback forwarding validation layer messages to the instance's sink.
///
/// # Safety
///
/// Called from the Vulkan driver. `user_data` is the pointer registered in
/// [`Instance::new`], which stays valid until the messenger is destroyed.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let sink = unsafe { &*(user_data as *const Arc<dyn DiagnosticSink>) };
    sink.message(
        map_severity(message_severity),
        &format!("[{}] {}", type_label(message_type), message),
    );

    // VK_FALSE: never abort the triggering call
    vk::FALSE
}
