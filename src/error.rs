//! Error types for spoutfill.
//!
//! This module provides error types for configuration loading, color
//! capture, video recording, the optional viewer, and the top-level run.

use std::fmt;

/// Errors that can occur while loading or validating a [`SceneConfig`](crate::SceneConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    Io(std::io::Error),
    /// Failed to parse or serialize JSON.
    Json(serde_json::Error),
    /// A value is out of its allowed range.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Json(e) => write!(f, "Invalid config JSON: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Errors that can occur while capturing particle colors.
#[derive(Debug)]
pub enum CaptureError {
    /// Failed to load the source image.
    ImageLoad(image::ImageError),
    /// Failed to read or write the capture file.
    Io(std::io::Error),
    /// The capture file is not valid JSON.
    Json(serde_json::Error),
    /// Colors were requested but no color source was supplied.
    MissingSource,
    /// The capture file's declared count disagrees with its records.
    CountMismatch {
        /// Count stored in the file header.
        declared: usize,
        /// Number of particle records actually present.
        found: usize,
    },
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ImageLoad(e) => write!(f, "Failed to load source image: {}", e),
            CaptureError::Io(e) => write!(f, "Failed to access capture file: {}", e),
            CaptureError::Json(e) => write!(f, "Invalid capture file: {}", e),
            CaptureError::MissingSource => write!(f, "No color source available for capture"),
            CaptureError::CountMismatch { declared, found } => write!(
                f,
                "Capture file declares {} particles but contains {}",
                declared, found
            ),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::ImageLoad(e) => Some(e),
            CaptureError::Io(e) => Some(e),
            CaptureError::Json(e) => Some(e),
            CaptureError::MissingSource | CaptureError::CountMismatch { .. } => None,
        }
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::ImageLoad(e)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(e: std::io::Error) -> Self {
        CaptureError::Io(e)
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(e: serde_json::Error) -> Self {
        CaptureError::Json(e)
    }
}

/// Errors that can occur while encoding frames.
#[derive(Debug)]
pub enum RecordError {
    /// Writing to the output failed.
    Io(std::io::Error),
    /// The external encoder process exited unsuccessfully.
    Encoder(String),
    /// GIF encoding failed.
    Gif(image::ImageError),
    /// The encoder thread panicked.
    ThreadPanicked,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Io(e) => write!(f, "Failed to write video output: {}", e),
            RecordError::Encoder(msg) => write!(f, "Video encoder failed: {}", msg),
            RecordError::Gif(e) => write!(f, "Failed to encode GIF frame: {}", e),
            RecordError::ThreadPanicked => write!(f, "Encoder thread panicked"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Io(e) => Some(e),
            RecordError::Gif(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        RecordError::Io(e)
    }
}

impl From<image::ImageError> for RecordError {
    fn from(e: image::ImageError) -> Self {
        RecordError::Gif(e)
    }
}

/// Errors that can occur while opening the preview window.
#[cfg(feature = "viewer")]
#[derive(Debug)]
pub enum ViewerError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
}

#[cfg(feature = "viewer")]
impl fmt::Display for ViewerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            ViewerError::Window(e) => write!(f, "Failed to create window: {}", e),
            ViewerError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            ViewerError::NoAdapter => write!(f, "No compatible GPU adapter found"),
            ViewerError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
        }
    }
}

#[cfg(feature = "viewer")]
impl std::error::Error for ViewerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ViewerError::EventLoop(e) => Some(e),
            ViewerError::Window(e) => Some(e),
            ViewerError::SurfaceCreation(e) => Some(e),
            ViewerError::DeviceCreation(e) => Some(e),
            ViewerError::NoAdapter => None,
        }
    }
}

#[cfg(feature = "viewer")]
impl From<winit::error::EventLoopError> for ViewerError {
    fn from(e: winit::error::EventLoopError) -> Self {
        ViewerError::EventLoop(e)
    }
}

#[cfg(feature = "viewer")]
impl From<winit::error::OsError> for ViewerError {
    fn from(e: winit::error::OsError) -> Self {
        ViewerError::Window(e)
    }
}

#[cfg(feature = "viewer")]
impl From<wgpu::CreateSurfaceError> for ViewerError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        ViewerError::SurfaceCreation(e)
    }
}

#[cfg(feature = "viewer")]
impl From<wgpu::RequestDeviceError> for ViewerError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        ViewerError::DeviceCreation(e)
    }
}

/// Errors that can end a run.
#[derive(Debug)]
pub enum RunError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// Color capture failed.
    Capture(CaptureError),
    /// Recording failed.
    Record(RecordError),
    /// The preview window failed.
    #[cfg(feature = "viewer")]
    Viewer(ViewerError),
    /// A worker thread could not be started.
    Thread(std::io::Error),
    /// The simulation thread panicked.
    SchedulerPanicked,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "Configuration error: {}", e),
            RunError::Capture(e) => write!(f, "Capture error: {}", e),
            RunError::Record(e) => write!(f, "Recording error: {}", e),
            #[cfg(feature = "viewer")]
            RunError::Viewer(e) => write!(f, "Viewer error: {}", e),
            RunError::Thread(e) => write!(f, "Failed to start thread: {}", e),
            RunError::SchedulerPanicked => write!(f, "Simulation thread panicked"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Config(e) => Some(e),
            RunError::Capture(e) => Some(e),
            RunError::Record(e) => Some(e),
            #[cfg(feature = "viewer")]
            RunError::Viewer(e) => Some(e),
            RunError::Thread(e) => Some(e),
            RunError::SchedulerPanicked => None,
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<CaptureError> for RunError {
    fn from(e: CaptureError) -> Self {
        RunError::Capture(e)
    }
}

impl From<RecordError> for RunError {
    fn from(e: RecordError) -> Self {
        RunError::Record(e)
    }
}

#[cfg(feature = "viewer")]
impl From<ViewerError> for RunError {
    fn from(e: ViewerError) -> Self {
        RunError::Viewer(e)
    }
}
