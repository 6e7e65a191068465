//! Load options.
//!
//! Everything a load depends on besides the dump bytes is passed in through
//! [`LoadOptions`]; nothing is read from global state during a load.

use std::env;
use std::path::PathBuf;

use crate::error::{MortemError, Result};

/// Default number of frames the unwinder produces per thread
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// Colon- (or semicolon-, on Windows) separated directories searched for module images
pub const IMAGE_PATH_ENV: &str = "MORTEM_IMAGE_PATH";

/// Frame limit override
pub const MAX_FRAMES_ENV: &str = "MORTEM_MAX_FRAMES";

/// Options for [`load_core`](crate::load_core)
///
/// ## Example
///
/// ```rust
/// use mortem_core::LoadOptions;
///
/// let options = LoadOptions::default().with_image_path("/opt/app/lib").with_max_frames(32);
/// assert_eq!(options.max_frames, 32);
/// assert_eq!(options.image_search_paths.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions
{
    /// Directories searched for on-disk module images, in order
    pub image_search_paths: Vec<PathBuf>,
    /// Frame limit for the frame-pointer unwinder
    pub max_frames: usize,
}

impl Default for LoadOptions
{
    fn default() -> Self
    {
        Self {
            image_search_paths: Vec::new(),
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl LoadOptions
{
    /// Defaults overridden by `MORTEM_IMAGE_PATH` and `MORTEM_MAX_FRAMES`
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if `MORTEM_MAX_FRAMES` is not a number.
    pub fn from_env() -> Result<Self>
    {
        let mut options = Self::default();
        if let Some(paths) = env::var_os(IMAGE_PATH_ENV) {
            options.image_search_paths = env::split_paths(&paths)
                .filter(|path| !path.as_os_str().is_empty())
                .collect();
        }
        if let Ok(value) = env::var(MAX_FRAMES_ENV) {
            options.max_frames = value
                .trim()
                .parse()
                .map_err(|_| MortemError::InvalidArgument(format!("{MAX_FRAMES_ENV}={value} is not a frame count")))?;
        }
        Ok(options)
    }

    /// Append a directory to the image search paths
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self
    {
        self.image_search_paths.push(path.into());
        self
    }

    /// Set the frame limit
    pub fn with_max_frames(mut self, max_frames: usize) -> Self
    {
        self.max_frames = max_frames;
        self
    }
}
