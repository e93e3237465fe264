use crate::GlassError;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn, Level};
use na::Vector3;

/// Everything tunable about the glass decals. `Default` gives the stock look.
#[derive(Debug, Clone, PartialEq)]
pub struct GlassPreferences {
    /// The atlases hold `variants_per_side²` fracture variants.
    pub variants_per_side: usize,
    /// Side of the impact (and outline) atlas, in texels.
    pub impact_size: u32,
    /// Side of the diffuse atlas, in texels.
    pub diffuse_size: u32,
    /// Fraction of an atlas cell the pane covers, leaving a margin against bleeding.
    pub cell_fill: f32,
    /// Shards are drawn shrunk by this about their centroid in the impact pass, opening cracks.
    pub crack_shrink: f32,
    /// Direction towards the light used to pre-light the diffuse atlas.
    pub light_direction: Vector3<f32>,
    /// Edge length of the pane when placed on a host.
    pub decal_scale: f32,

    // Scatter animation
    pub time_scale: f32,
    pub period: f32,
    pub spin_rate: f32,
    /// Local time each unit of clearance holds a shard back.
    pub scatter_delay: f32,
    pub outward_speed: f32,
    pub flash_rate: f32,
    pub flash_cap: f32,

    // Material
    pub ambient: f32,
    pub shine: f32,
    pub reflectivity: f32,

    /// Fixed seed, otherwise seeded from the clock.
    pub seed: Option<u64>,
    pub log_level: Level,
}

impl Default for GlassPreferences {
    fn default() -> Self {
        Self {
            variants_per_side: 4,
            impact_size: 512,
            diffuse_size: 1024,
            cell_fill: 0.9,
            crack_shrink: 0.96,
            light_direction: Vector3::new(-0.4, 0.6, 0.7),
            decal_scale: 1.,
            time_scale: 15.,
            period: 6.,
            spin_rate: 7.,
            scatter_delay: 2.,
            outward_speed: 0.1,
            flash_rate: 0.5,
            flash_cap: 2.,
            ambient: 0.6,
            shine: 0.1,
            reflectivity: 0.4,
            seed: None,
            log_level: Level::Info,
        }
    }
}

impl GlassPreferences {
    pub const SEED_VAR: &'static str = "SHARDLIGHT_SEED";
    pub const VARIANTS_VAR: &'static str = "SHARDLIGHT_VARIANTS";
    pub const LOG_VAR: &'static str = "SHARDLIGHT_LOG";

    pub fn variant_count(&self) -> usize {
        self.variants_per_side * self.variants_per_side
    }

    /// Defaults overlaid with whatever the environment sets.
    pub fn from_env() -> Result<Self, GlassError> {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlays values looked up by variable name.
    pub fn overlay<F: Fn(&str) -> Option<String>>(mut self, lookup: F) -> Result<Self, GlassError> {
        if let Some(seed) = lookup(Self::SEED_VAR) {
            self.seed = Some(seed.trim().parse().map_err(|e| GlassError::Config {
                name: "seed",
                reason: format!("{:?} is not a seed: {}", seed, e),
            })?);
        }
        if let Some(n) = lookup(Self::VARIANTS_VAR) {
            self.variants_per_side = n.trim().parse().map_err(|e| GlassError::Config {
                name: "variants_per_side",
                reason: format!("{:?} is not a count: {}", n, e),
            })?;
        }
        if let Some(level) = lookup(Self::LOG_VAR) {
            self.log_level = level.trim().parse().map_err(|_| GlassError::Config {
                name: "log_level",
                reason: format!("{:?} is not a log level", level),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), GlassError> {
        let invalid = |name, reason: &str| {
            error!("Invalid preference {}: {}", name, reason);
            Err(GlassError::Config {
                name,
                reason: reason.to_owned(),
            })
        };
        if self.variants_per_side == 0 {
            return invalid("variants_per_side", "at least one variant is needed");
        }
        if (self.impact_size as usize) < self.variants_per_side || (self.diffuse_size as usize) < self.variants_per_side {
            return invalid("impact_size", "atlases need at least one texel per variant");
        }
        if !(self.cell_fill > 0. && self.cell_fill <= 1.) {
            return invalid("cell_fill", "must be within (0, 1]");
        }
        if !(self.crack_shrink > 0. && self.crack_shrink <= 1.) {
            return invalid("crack_shrink", "must be within (0, 1]");
        }
        if !(self.light_direction.norm() > f32::EPSILON) {
            return invalid("light_direction", "must not be zero");
        }
        if !(self.decal_scale > 0.) {
            return invalid("decal_scale", "must be positive");
        }
        if !(self.time_scale > 0. && self.period > 0.) {
            return invalid("period", "time scale and period must be positive");
        }
        if !(self.flash_cap >= 1.) {
            return invalid("flash_cap", "must be at least 1");
        }
        if !(self.scatter_delay >= 0. && self.outward_speed >= 0. && self.flash_rate >= 0.) {
            return invalid("scatter_delay", "scatter rates must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let prefs = GlassPreferences::default();
        prefs.validate().unwrap();
        assert_eq!(prefs.variant_count(), 16);
    }

    #[test]
    fn environment_overrides() {
        let prefs = GlassPreferences::default()
            .overlay(env(&[("SHARDLIGHT_SEED", "42"), ("SHARDLIGHT_VARIANTS", "2"), ("SHARDLIGHT_LOG", "debug")]))
            .unwrap();
        assert_eq!(prefs.seed, Some(42));
        assert_eq!(prefs.variants_per_side, 2);
        assert_eq!(prefs.log_level, Level::Debug);
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(matches!(
            GlassPreferences::default().overlay(env(&[("SHARDLIGHT_SEED", "soon")])),
            Err(GlassError::Config { name: "seed", .. })
        ));
        assert!(matches!(
            GlassPreferences::default().overlay(env(&[("SHARDLIGHT_VARIANTS", "0")])),
            Err(GlassError::Config { name: "variants_per_side", .. })
        ));
        let prefs = GlassPreferences {
            cell_fill: 1.5,
            ..GlassPreferences::default()
        };
        assert!(prefs.validate().is_err());
    }
}
