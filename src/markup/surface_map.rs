//! Display-space to native-space pointer mapping.
//!
//! The mapper is only ever built from an asset whose native resolution is
//! known. Until then [`SurfaceInit`] keeps retrying on a fixed backoff
//! schedule and drawing stays disabled.

use crate::markup::error::MarkupError;
use crate::markup::model::{MediaAsset, PixelSize, Point};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMapper {
    display_width: f64,
    display_height: f64,
    native: PixelSize,
    scale_x: f64,
    scale_y: f64,
}

impl SurfaceMapper {
    pub fn for_asset(asset: &MediaAsset) -> Result<Self, MarkupError> {
        if !asset.is_drawable() {
            return Err(MarkupError::NotDrawable {
                asset_id: asset.id.clone(),
                kind: asset.kind,
            });
        }
        let native = asset
            .native
            .filter(|size| size.width > 0 && size.height > 0)
            .ok_or_else(|| MarkupError::AssetNotLoaded {
                asset_id: asset.id.clone(),
            })?;
        Self::new(native, asset.display_width, asset.display_height)
    }

    pub fn new(
        native: PixelSize,
        display_width: f64,
        display_height: f64,
    ) -> Result<Self, MarkupError> {
        let mut mapper = Self {
            display_width: 0.0,
            display_height: 0.0,
            native,
            scale_x: 1.0,
            scale_y: 1.0,
        };
        mapper.resize(display_width, display_height)?;
        Ok(mapper)
    }

    /// Recompute the ratios after the rendered box changed size.
    pub fn resize(&mut self, display_width: f64, display_height: f64) -> Result<(), MarkupError> {
        if !(display_width.is_finite() && display_height.is_finite())
            || display_width <= 0.0
            || display_height <= 0.0
        {
            return Err(MarkupError::InvalidDisplaySize {
                width: display_width,
                height: display_height,
            });
        }
        self.display_width = display_width;
        self.display_height = display_height;
        self.scale_x = self.native.width as f64 / display_width;
        self.scale_y = self.native.height as f64 / display_height;
        tracing::debug!(
            display_width,
            display_height,
            native_width = self.native.width,
            native_height = self.native.height,
            "surface mapper resized"
        );
        Ok(())
    }

    /// Map a pointer position to native pixels, clamped to the asset bounds.
    pub fn map_to_native(&self, display_x: f64, display_y: f64) -> Point {
        let max_x = self.native.width as f64;
        let max_y = self.native.height as f64;
        Point::new(
            (display_x * self.scale_x).clamp(0.0, max_x),
            (display_y * self.scale_y).clamp(0.0, max_y),
        )
    }

    /// Inverse mapping, used to place host widgets over a native point.
    pub fn map_to_display(&self, point: Point) -> (f64, f64) {
        (point.x / self.scale_x, point.y / self.scale_y)
    }

    pub fn native_size(&self) -> PixelSize {
        self.native
    }

    pub fn display_size(&self) -> (f64, f64) {
        (self.display_width, self.display_height)
    }

    pub fn scale(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitStatus {
    Ready(SurfaceMapper),
    Pending { attempts: u32, retry_at: Instant },
    Unsupported,
}

/// Retry loop for building a [`SurfaceMapper`] while the asset loads.
#[derive(Debug, Clone)]
pub struct SurfaceInit {
    schedule: Vec<Duration>,
    attempts: u32,
    retry_at: Option<Instant>,
    mapper: Option<SurfaceMapper>,
}

impl SurfaceInit {
    pub fn new(schedule: Vec<Duration>) -> Self {
        let schedule = if schedule.is_empty() {
            vec![Duration::from_millis(100)]
        } else {
            schedule
        };
        Self {
            schedule,
            attempts: 0,
            retry_at: None,
            mapper: None,
        }
    }

    pub fn mapper(&self) -> Option<&SurfaceMapper> {
        self.mapper.as_ref()
    }

    pub fn mapper_mut(&mut self) -> Option<&mut SurfaceMapper> {
        self.mapper.as_mut()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Skip the rest of the backoff wait, e.g. when a load event arrives.
    pub fn retry_now(&mut self) {
        self.retry_at = None;
    }

    /// Forget the current mapper, e.g. when a different asset is selected.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.retry_at = None;
        self.mapper = None;
    }

    /// Try to initialize against `asset`. Attempts before `retry_at` are
    /// skipped so a host can call this every frame.
    pub fn poll(&mut self, asset: &MediaAsset, now: Instant) -> InitStatus {
        if let Some(mapper) = self.mapper {
            return InitStatus::Ready(mapper);
        }
        if let Some(retry_at) = self.retry_at {
            if now < retry_at {
                return InitStatus::Pending {
                    attempts: self.attempts,
                    retry_at,
                };
            }
        }

        self.attempts = self.attempts.saturating_add(1);
        match SurfaceMapper::for_asset(asset) {
            Ok(mapper) => {
                tracing::debug!(asset_id = %asset.id, attempts = self.attempts, "surface ready");
                self.mapper = Some(mapper);
                self.retry_at = None;
                InitStatus::Ready(mapper)
            }
            Err(MarkupError::NotDrawable { .. }) => InitStatus::Unsupported,
            Err(err) => {
                let step = (self.attempts as usize - 1).min(self.schedule.len() - 1);
                let retry_at = now + self.schedule[step];
                tracing::debug!(
                    asset_id = %asset.id,
                    attempts = self.attempts,
                    %err,
                    "surface init deferred"
                );
                self.retry_at = Some(retry_at);
                InitStatus::Pending {
                    attempts: self.attempts,
                    retry_at,
                }
            }
        }
    }
}
