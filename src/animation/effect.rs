//! Celebration effect: origin geometry plus a pluggable particle provider.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::config::EffectConfig as EffectSettings;
use crate::core::errors::{PdsError, Result};
use crate::view::handles::{Rect, Viewport};

/// Normalised burst origin; `0..=1` on both axes for on-screen anchors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub x: f64,
    pub y: f64,
}

/// Everything a provider needs to render one burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub count: u32,
    /// Cone width in degrees.
    pub spread: f64,
    pub origin: Origin,
    pub colors: Vec<String>,
}

/// External capability that renders a particle burst.
pub trait EffectProvider: Send {
    fn emit(&mut self, config: &EffectConfig) -> Result<()>;
}

/// Provider that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEffectProvider;

impl EffectProvider for NoopEffectProvider {
    fn emit(&mut self, _config: &EffectConfig) -> Result<()> {
        Ok(())
    }
}

/// Centre of `anchor` expressed as a fraction of `viewport`.
///
/// Values are not clamped; providers accept slightly out-of-range origins.
pub fn compute_origin(anchor: Rect, viewport: Viewport) -> Result<Origin> {
    if !(viewport.width > 0.0 && viewport.height > 0.0) {
        return Err(PdsError::InvalidGeometry {
            details: format!(
                "viewport must be positive, got {}x{}",
                viewport.width, viewport.height
            ),
        });
    }
    Ok(Origin {
        x: (anchor.left + anchor.width / 2.0) / viewport.width,
        y: (anchor.top + anchor.height / 2.0) / viewport.height,
    })
}

/// Fires bursts through an optional provider.
///
/// With no provider configured, [`Self::fire`] is a silent no-op.
pub struct EffectTrigger {
    provider: Option<Box<dyn EffectProvider>>,
    count: u32,
    spread: f64,
    colors: Vec<String>,
}

impl EffectTrigger {
    #[must_use]
    pub fn new(provider: Option<Box<dyn EffectProvider>>, settings: &EffectSettings) -> Self {
        let provider = if settings.enabled { provider } else { None };
        Self {
            provider,
            count: settings.particle_count,
            spread: settings.spread_degrees,
            colors: settings.colors.clone(),
        }
    }

    /// Trigger without a provider.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, &EffectSettings::default())
    }

    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Emit one burst centred on `anchor`.
    ///
    /// Returns the emitted configuration, or `None` when no provider is set.
    pub fn fire(&mut self, anchor: Rect, viewport: Viewport) -> Result<Option<EffectConfig>> {
        let Some(provider) = self.provider.as_mut() else {
            return Ok(None);
        };
        let config = EffectConfig {
            count: self.count,
            spread: self.spread,
            origin: compute_origin(anchor, viewport)?,
            colors: self.colors.clone(),
        };
        provider.emit(&config)?;
        Ok(Some(config))
    }
}

impl std::fmt::Debug for EffectTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectTrigger")
            .field("provider", &self.provider.is_some())
            .field("count", &self.count)
            .field("spread", &self.spread)
            .field("colors", &self.colors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Default, Clone)]
    struct CapturingProvider {
        emitted: Arc<Mutex<Vec<EffectConfig>>>,
    }

    impl EffectProvider for CapturingProvider {
        fn emit(&mut self, config: &EffectConfig) -> Result<()> {
            self.emitted.lock().push(config.clone());
            Ok(())
        }
    }

    fn reference_geometry() -> (Rect, Viewport) {
        (
            Rect {
                left: 100.0,
                top: 50.0,
                width: 200.0,
                height: 80.0,
            },
            Viewport {
                width: 1_000.0,
                height: 800.0,
            },
        )
    }

    #[test]
    fn origin_is_anchor_centre_over_viewport() {
        let (rect, viewport) = reference_geometry();
        let origin = compute_origin(rect, viewport).unwrap();
        assert!((origin.x - 0.2).abs() < 1e-12);
        assert!((origin.y - 0.1125).abs() < 1e-12);
    }

    #[test]
    fn degenerate_viewport_rejected() {
        let (rect, _) = reference_geometry();
        let err = compute_origin(
            rect,
            Viewport {
                width: 0.0,
                height: 800.0,
            },
        )
        .expect_err("zero width");
        assert_eq!(err.code(), "PDS-2004");
    }

    #[test]
    fn fire_delegates_with_configured_style() {
        let provider = CapturingProvider::default();
        let mut trigger =
            EffectTrigger::new(Some(Box::new(provider.clone())), &EffectSettings::default());
        let (rect, viewport) = reference_geometry();

        let fired = trigger.fire(rect, viewport).unwrap().expect("provider set");
        assert_eq!(fired.count, 100);
        assert!((fired.spread - 70.0).abs() < f64::EPSILON);
        assert_eq!(fired.colors.len(), 5);
        assert_eq!(fired.colors[0], "#FF7D00");
        assert_eq!(provider.emitted.lock().as_slice(), &[fired]);
    }

    #[test]
    fn missing_provider_is_silent() {
        let mut trigger = EffectTrigger::disabled();
        let (rect, viewport) = reference_geometry();
        assert!(!trigger.has_provider());
        assert_eq!(trigger.fire(rect, viewport).unwrap(), None);
    }

    #[test]
    fn disabled_setting_drops_provider() {
        let settings = EffectSettings {
            enabled: false,
            ..EffectSettings::default()
        };
        let trigger = EffectTrigger::new(Some(Box::new(NoopEffectProvider)), &settings);
        assert!(!trigger.has_provider());
    }
}
