use std::sync::OnceLock;
use std::task::Poll;

use ::openxr as xr;
use bevy::log::{debug, error, info, warn};
use bevy::tasks::{IoTaskPool, Task, TaskPool};
use eyre::WrapErr;
use futures_lite::future;

use crate::runtime::{
    DeviceCapability, InputDevice, LoaderId, SubsystemError, TrackingOrigin, XrRuntime,
};

/// [`XrRuntime`] backed by the system OpenXR loader.
///
/// Instance creation runs on the [`IoTaskPool`] so a slow runtime handshake does not stall the
/// frame that requested it.
pub struct OpenXrRuntime {
    app_name: String,
    entry: OnceLock<xr::Entry>,
    pending: Option<Task<eyre::Result<LoadedRuntime>>>,
    loaded: Option<LoadedRuntime>,
    subsystems_running: bool,
    tracking_origin: TrackingOrigin,
}

struct LoadedRuntime {
    instance: xr::Instance,
    system: xr::SystemId,
    loader: LoaderId,
    hand_tracking: bool,
}

impl OpenXrRuntime {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            entry: OnceLock::new(),
            pending: None,
            loaded: None,
            subsystems_running: false,
            tracking_origin: TrackingOrigin::default(),
        }
    }

    pub fn instance(&self) -> Option<&xr::Instance> {
        self.loaded.as_ref().map(|loaded| &loaded.instance)
    }

    pub fn system_id(&self) -> Option<xr::SystemId> {
        self.loaded.as_ref().map(|loaded| loaded.system)
    }

    pub fn with_tracking_origin(mut self, origin: TrackingOrigin) -> Self {
        self.tracking_origin = origin;
        self
    }

    /// Reference space to create the session's base space in, given the spaces the session
    /// enumerates. Falls back from `STAGE` to `LOCAL` when the floor is not tracked.
    pub fn reference_space_type(
        &self,
        supported: &[xr::ReferenceSpaceType],
    ) -> Option<xr::ReferenceSpaceType> {
        let supported: Vec<_> = supported
            .iter()
            .filter_map(|space| origin_for_space(*space))
            .collect();
        self.tracking_origin
            .resolve(&supported)
            .map(space_for_origin)
    }
}

fn space_for_origin(origin: TrackingOrigin) -> xr::ReferenceSpaceType {
    match origin {
        TrackingOrigin::Floor => xr::ReferenceSpaceType::STAGE,
        TrackingOrigin::Device => xr::ReferenceSpaceType::LOCAL,
    }
}

fn origin_for_space(space: xr::ReferenceSpaceType) -> Option<TrackingOrigin> {
    if space == xr::ReferenceSpaceType::STAGE {
        Some(TrackingOrigin::Floor)
    } else if space == xr::ReferenceSpaceType::LOCAL {
        Some(TrackingOrigin::Device)
    } else {
        None
    }
}

impl Default for OpenXrRuntime {
    fn default() -> Self {
        Self::new("bevy_mr_session")
    }
}

fn xr_entry() -> eyre::Result<xr::Entry> {
    #[cfg(windows)]
    let entry = xr::Entry::linked();
    #[cfg(not(windows))]
    let entry = unsafe { xr::Entry::load()? };
    #[cfg(target_os = "android")]
    entry.initialize_android_loader()?;
    Ok(entry)
}

fn load_runtime(entry: &xr::Entry, app_name: &str) -> eyre::Result<LoadedRuntime> {
    let available_exts = entry
        .enumerate_extensions()
        .wrap_err("failed to enumerate OpenXR extensions")?;
    debug!("available xr exts: {:#?}", available_exts);

    let mut exts = xr::ExtensionSet::default();
    exts.fb_passthrough = available_exts.fb_passthrough;
    exts.ext_hand_tracking = available_exts.ext_hand_tracking;
    #[cfg(target_os = "android")]
    {
        exts.khr_android_create_instance = available_exts.khr_android_create_instance;
    }

    let instance = entry
        .create_instance(
            &xr::ApplicationInfo {
                application_name: app_name,
                ..Default::default()
            },
            &exts,
            &[],
        )
        .wrap_err("failed to create OpenXR instance")?;
    let instance_props = instance.properties()?;
    let system = instance
        .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
        .wrap_err("no head mounted display is available")?;
    let hand_tracking = instance.exts().ext_hand_tracking.is_some()
        && instance.supports_hand_tracking(system).unwrap_or(false);

    info!(
        "loaded OpenXR runtime: {} {}",
        instance_props.runtime_name, instance_props.runtime_version
    );

    Ok(LoadedRuntime {
        loader: LoaderId::new(format!(
            "{} {}",
            instance_props.runtime_name, instance_props.runtime_version
        )),
        instance,
        system,
        hand_tracking,
    })
}

impl XrRuntime for OpenXrRuntime {
    fn is_runtime_available(&self) -> bool {
        if self.entry.get().is_some() {
            return true;
        }
        match xr_entry() {
            Ok(entry) => {
                let _ = self.entry.set(entry);
                true
            }
            Err(e) => {
                warn!("OpenXR loader not available: {e}");
                false
            }
        }
    }

    fn active_loader(&self) -> Option<LoaderId> {
        let loaded = self.loaded.as_ref()?;
        // fails with XR_ERROR_INSTANCE_LOST once the runtime has dropped us
        match loaded.instance.properties() {
            Ok(_) => Some(loaded.loader.clone()),
            Err(e) => {
                warn!("OpenXR instance is no longer usable: {e}");
                None
            }
        }
    }

    fn initialize_loader(&mut self) {
        let Some(entry) = self.entry.get().cloned() else {
            error!("Trying to initialize OpenXR without a loader, ignoring");
            return;
        };
        let app_name = self.app_name.clone();
        self.pending = Some(
            IoTaskPool::get_or_init(TaskPool::new)
                .spawn(async move { load_runtime(&entry, &app_name) }),
        );
    }

    fn poll_loader(&mut self) -> Poll<Option<LoaderId>> {
        let Some(task) = self.pending.as_mut() else {
            return Poll::Ready(self.loaded.as_ref().map(|loaded| loaded.loader.clone()));
        };
        let Some(result) = future::block_on(future::poll_once(task)) else {
            return Poll::Pending;
        };
        self.pending = None;
        match result {
            Ok(loaded) => {
                let loader = loaded.loader.clone();
                self.loaded = Some(loaded);
                Poll::Ready(Some(loader))
            }
            Err(e) => {
                error!("Failed to initialize OpenXR: {e:#}");
                Poll::Ready(None)
            }
        }
    }

    fn start_subsystems(&mut self) -> Result<(), SubsystemError> {
        let Some(loaded) = &self.loaded else {
            return Err(SubsystemError("no OpenXR instance is loaded".into()));
        };
        let props = loaded
            .instance
            .system_properties(loaded.system)
            .map_err(|e| SubsystemError(format!("failed to query system properties: {e}")))?;
        if !props.tracking_properties.orientation_tracking {
            return Err(SubsystemError(format!(
                "{} does not report orientation tracking",
                props.system_name
            )));
        }
        info!(
            "XR system {} started (position tracking: {}, hand tracking: {})",
            if props.system_name.is_empty() {
                "<unnamed>"
            } else {
                props.system_name.as_str()
            },
            props.tracking_properties.position_tracking,
            loaded.hand_tracking,
        );
        self.subsystems_running = true;
        Ok(())
    }

    fn stop_subsystems(&mut self) {
        self.subsystems_running = false;
    }

    fn deinitialize_loader(&mut self) {
        // dropping the task cancels it, dropping the instance destroys it
        self.pending = None;
        self.loaded = None;
        self.subsystems_running = false;
    }

    fn input_devices(&self) -> Vec<InputDevice> {
        let Some(loaded) = self.loaded.as_ref().filter(|_| self.subsystems_running) else {
            return Vec::new();
        };
        let mut devices = vec![
            InputDevice::new("/user/hand/left", &[DeviceCapability::Controller]),
            InputDevice::new("/user/hand/right", &[DeviceCapability::Controller]),
        ];
        if loaded.hand_tracking {
            devices.push(InputDevice::new(
                "/user/hand/left/tracked",
                &[DeviceCapability::TrackedHand],
            ));
            devices.push(InputDevice::new(
                "/user/hand/right/tracked",
                &[DeviceCapability::TrackedHand],
            ));
        }
        devices
    }

    fn supports_passthrough(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|loaded| loaded.instance.exts().fb_passthrough.is_some())
    }

    fn request_tracking_origin(&mut self, origin: TrackingOrigin) {
        self.tracking_origin = origin;
    }

    fn tracking_origin(&self) -> Option<TrackingOrigin> {
        self.loaded.as_ref().map(|_| self.tracking_origin)
    }
}
