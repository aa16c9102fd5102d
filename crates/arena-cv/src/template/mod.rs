//! Template catalogs and matching

pub mod loader;
pub mod matcher;

pub use loader::TemplateLoader;
pub use matcher::{Importance, MatchOutcome, MatchResult, TemplateMatcher};

use crate::Result;
use image::{ImageBuffer, Luma, Pixel, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which matching purpose a catalog serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Icon,
    Digit,
    Mode,
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CatalogKind::Icon => "icon",
            CatalogKind::Digit => "digit",
            CatalogKind::Mode => "mode",
        })
    }
}

/// Labeled reference pattern.
///
/// Icon and mode templates keep their colour; digit templates are binarized
/// luma, see [`DigitTemplate`].
#[derive(Debug, Clone)]
pub struct Template<P: Pixel<Subpixel = u8> = Rgb<u8>> {
    pub label: String,
    pub image: ImageBuffer<P, Vec<u8>>,
    /// Digit identity, for digit templates only.
    pub digit: Option<u8>,
    pub path: PathBuf,
}

pub type DigitTemplate = Template<Luma<u8>>;

impl<P: Pixel<Subpixel = u8>> Template<P> {
    pub fn new(label: impl Into<String>, image: ImageBuffer<P, Vec<u8>>) -> Self {
        Self {
            label: label.into(),
            image,
            digit: None,
            path: PathBuf::new(),
        }
    }

    pub fn with_digit(mut self, digit: u8) -> Self {
        self.digit = Some(digit);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Ordered, immutable set of templates for one purpose.
///
/// Built once at startup and only ever read afterwards, so it can be shared
/// by reference between readers without locking.
#[derive(Debug, Clone)]
pub struct TemplateCatalog<P: Pixel<Subpixel = u8> = Rgb<u8>> {
    kind: CatalogKind,
    dir: PathBuf,
    templates: Vec<Template<P>>,
}

pub type DigitCatalog = TemplateCatalog<Luma<u8>>;

impl<P: Pixel<Subpixel = u8>> TemplateCatalog<P> {
    pub fn new(kind: CatalogKind, dir: impl Into<PathBuf>, templates: Vec<Template<P>>) -> Self {
        Self {
            kind,
            dir: dir.into(),
            templates,
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn templates(&self) -> &[Template<P>] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.label.as_str())
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.labels().any(|l| l == label)
    }
}

/// Where each catalog lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDirs {
    pub icons: PathBuf,
    pub digits: PathBuf,
    pub modes: PathBuf,
}

impl Default for TemplateDirs {
    fn default() -> Self {
        Self {
            icons: "patterns/slots".into(),
            digits: "patterns/digits".into(),
            modes: "patterns/mods".into(),
        }
    }
}

/// The three catalogs the pipeline reads from.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub icons: TemplateCatalog,
    pub digits: DigitCatalog,
    pub modes: TemplateCatalog,
}

impl Catalogs {
    /// Load all three catalogs; any missing directory is an error.
    pub fn load(dirs: &TemplateDirs, loader: &TemplateLoader) -> Result<Self> {
        Ok(Self {
            icons: loader.load_catalog(&dirs.icons, CatalogKind::Icon)?,
            digits: loader.load_digits(&dirs.digits)?,
            modes: loader.load_catalog(&dirs.modes, CatalogKind::Mode)?,
        })
    }
}
