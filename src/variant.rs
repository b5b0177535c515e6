//! Named variants: which presets to render and where to send them.

use serde::Deserialize;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
    str::FromStr,
};

use crate::error::{ImagerError, Result};

/// Variant picked when the caller does not name one and no `default_variant` is set.
pub const DEFAULT_VARIANT: &str = "default";

/// Target size hint written as `WxH`; either side may be left out (`300x`, `x200`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Geometry {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (width, height) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("geometry {:?} is not of the form WxH", s))?;

        let parse = |side: &str| -> std::result::Result<Option<u32>, String> {
            let side = side.trim();
            if side.is_empty() {
                return Ok(None);
            }
            match side.parse::<u32>() {
                Ok(0) | Err(_) => Err(format!("invalid dimension {:?} in geometry {:?}", side, s)),
                Ok(value) => Ok(Some(value)),
            }
        };

        let geometry = Geometry {
            width: parse(width)?,
            height: parse(height)?,
        };
        if geometry.width.is_none() && geometry.height.is_none() {
            return Err(format!("geometry {:?} has no dimensions", s));
        }
        Ok(geometry)
    }
}

impl TryFrom<String> for Geometry {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(width) = self.width {
            write!(f, "{}", width)?;
        }
        f.write_str("x")?;
        if let Some(height) = self.height {
            write!(f, "{}", height)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResizeAndCrop {
    pub resize: Geometry,
    pub crop: Geometry,
}

/// A variant as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantSpec {
    #[serde(default)]
    pub resize: BTreeMap<String, Geometry>,
    #[serde(default)]
    pub crop: BTreeMap<String, Geometry>,
    #[serde(default)]
    pub resize_and_crop: BTreeMap<String, ResizeAndCrop>,
    /// Output format hint handed to the transform.
    #[serde(default)]
    pub format: Option<String>,
    /// Store assets under their original file name instead of a random one.
    #[serde(default)]
    pub keep_names: bool,
    /// Store the untouched source next to the presets.
    #[serde(default)]
    pub keep_original: bool,
    /// Restrict the variant to these backend identifiers.
    #[serde(default)]
    pub backends: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Resize(Geometry),
    Crop(Geometry),
    ResizeAndCrop { resize: Geometry, crop: Geometry },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub operation: Operation,
}

/// One object produced for an asset: a preset rendering or the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendition {
    pub preset: Option<Preset>,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Variant {
    name: String,
    spec: VariantSpec,
    presets: Vec<Preset>,
}

impl Variant {
    fn new(name: &str, spec: VariantSpec) -> Result<Self> {
        let mut presets = Vec::new();
        presets.extend(spec.resize.iter().map(|(preset, geometry)| Preset {
            name: preset.clone(),
            operation: Operation::Resize(*geometry),
        }));
        presets.extend(spec.crop.iter().map(|(preset, geometry)| Preset {
            name: preset.clone(),
            operation: Operation::Crop(*geometry),
        }));
        presets.extend(spec.resize_and_crop.iter().map(|(preset, both)| Preset {
            name: preset.clone(),
            operation: Operation::ResizeAndCrop {
                resize: both.resize,
                crop: both.crop,
            },
        }));

        let mut seen = HashSet::new();
        for preset in &presets {
            if preset.name.is_empty() || preset.name.contains(['/', '\\']) {
                return Err(ImagerError::InvalidConfig(format!(
                    "variant {} has an invalid preset name {:?}",
                    name, preset.name
                )));
            }
            if !seen.insert(preset.name.as_str()) {
                return Err(ImagerError::InvalidConfig(format!(
                    "variant {} defines preset {} more than once",
                    name, preset.name
                )));
            }
        }

        Ok(Variant {
            name: name.to_owned(),
            spec,
            presets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &VariantSpec {
        &self.spec
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn keep_names(&self) -> bool {
        self.spec.keep_names
    }

    pub fn format(&self) -> Option<&str> {
        self.spec.format.as_deref()
    }

    pub fn backends(&self) -> Option<&[String]> {
        self.spec.backends.as_deref()
    }

    /// Objects stored for an asset called `name`, presets first.
    ///
    /// Presets are stored as `{preset}_{name}`; the original keeps `name`.
    pub fn renditions(&self, name: &str) -> Vec<Rendition> {
        let mut renditions: Vec<Rendition> = self
            .presets
            .iter()
            .map(|preset| Rendition {
                preset: Some(preset.clone()),
                name: format!("{}_{}", preset.name, name),
            })
            .collect();

        if renditions.is_empty() || self.spec.keep_original {
            renditions.push(Rendition {
                preset: None,
                name: name.to_owned(),
            });
        }
        renditions
    }
}

/// Every variant from the config, checked once at construction.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    variants: BTreeMap<String, Variant>,
    default: Option<String>,
}

impl VariantRegistry {
    pub fn new(specs: BTreeMap<String, VariantSpec>, default: Option<String>) -> Result<Self> {
        let mut variants = BTreeMap::new();
        for (name, spec) in specs {
            let variant = Variant::new(&name, spec)?;
            variants.insert(name, variant);
        }

        let default = match default {
            Some(name) if !variants.contains_key(&name) => {
                return Err(ImagerError::InvalidConfig(format!(
                    "default variant {} is not defined",
                    name
                )))
            }
            Some(name) => Some(name),
            None if variants.contains_key(DEFAULT_VARIANT) => Some(DEFAULT_VARIANT.to_owned()),
            None => None,
        };

        Ok(VariantRegistry { variants, default })
    }

    /// Name of the variant used when the caller gives none.
    pub fn default_variant(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.variants.get(name)
    }

    pub fn resolve(&self, name: Option<&str>) -> Result<&Variant> {
        let name = name
            .or(self.default.as_deref())
            .ok_or(ImagerError::VariantRequired)?;
        self.get(name)
            .ok_or_else(|| ImagerError::UnknownVariant(name.to_owned()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}
