use tokio::sync::watch;

/// Device state relevant to representation selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceState {
    /// Viewport width in device pixels.
    pub viewport_width: u32,
    /// Whether the document is visible.
    pub visible: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            viewport_width: u32::MAX,
            visible: true,
        }
    }
}

/// Emits viewport width and visibility changes.
///
/// The embedder feeds platform callbacks into the setters; the engine
/// observes the watch edge. Last value wins, intermediate states may be
/// coalesced.
#[derive(Debug)]
pub struct DeviceMonitor {
    tx: watch::Sender<DeviceState>,
}

impl DeviceMonitor {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(DeviceState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> DeviceState {
        *self.tx.borrow()
    }

    pub fn set_viewport_width(&self, width: u32) {
        self.tx.send_if_modified(|s| {
            let changed = s.viewport_width != width;
            s.viewport_width = width;
            changed
        });
    }

    pub fn set_visible(&self, visible: bool) {
        self.tx.send_if_modified(|s| {
            let changed = s.visible != visible;
            s.visible = visible;
            changed
        });
    }
}

impl Default for DeviceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
