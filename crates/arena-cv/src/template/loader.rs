//! Template loading utilities

use super::{CatalogKind, DigitCatalog, Template, TemplateCatalog};
use crate::utils::image::ImageUtils;
use crate::{CvError, Result};
use image::Pixel;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Digit identity is the leading decimal digit of the file stem.
static DIGIT_STEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d)\w*$").expect("valid digit stem pattern"));

/// Binarization cut applied to digit templates at load time.
pub const DEFAULT_DIGIT_TEMPLATE_CUT: u8 = 210;

/// Loads template directories into catalogs
pub struct TemplateLoader {
    supported_extensions: Vec<String>,
    digit_cut: u8,
}

impl TemplateLoader {
    /// Create new template loader
    pub fn new() -> Self {
        Self {
            supported_extensions: vec!["png".to_string()],
            digit_cut: DEFAULT_DIGIT_TEMPLATE_CUT,
        }
    }

    /// Add supported extension
    pub fn add_extension(mut self, ext: impl Into<String>) -> Self {
        self.supported_extensions.push(ext.into().to_lowercase());
        self
    }

    /// Cut used to binarize digit templates
    pub fn with_digit_cut(mut self, cut: u8) -> Self {
        self.digit_cut = cut;
        self
    }

    /// Load every usable template in `dir` as a colour catalog of `kind`.
    ///
    /// Files are visited in name order so catalog order is stable across runs.
    pub fn load_catalog<P: AsRef<Path>>(&self, dir: P, kind: CatalogKind) -> Result<TemplateCatalog> {
        let dir = dir.as_ref();
        let mut templates = Vec::new();
        for (path, stem) in self.scan(dir)? {
            match ImageUtils::load_rgb(&path) {
                Ok(image) => templates.push(Template::new(stem, image).with_path(path)),
                Err(e) => warn!("Skipping unreadable template {:?}: {}", path, e),
            }
        }
        finish(kind, dir, templates)
    }

    /// Load the digit catalog: binarized luma, identity from the file stem.
    pub fn load_digits<P: AsRef<Path>>(&self, dir: P) -> Result<DigitCatalog> {
        let dir = dir.as_ref();
        let mut templates = Vec::new();
        for (path, stem) in self.scan(dir)? {
            let Some(digit) = digit_identity(&stem) else {
                debug!("Skipping {:?}: no leading digit in name", path);
                continue;
            };
            match ImageUtils::load_luma(&path) {
                Ok(image) => templates.push(
                    Template::new(digit.to_string(), ImageUtils::binarize(&image, self.digit_cut))
                        .with_digit(digit)
                        .with_path(path),
                ),
                Err(e) => warn!("Skipping unreadable template {:?}: {}", path, e),
            }
        }
        finish(CatalogKind::Digit, dir, templates)
    }

    /// Supported files in `dir` with their stems, in name order.
    fn scan(&self, dir: &Path) -> Result<Vec<(PathBuf, String)>> {
        if !dir.is_dir() {
            return Err(CvError::MissingCatalog(dir.to_path_buf()));
        }

        let io_err = |source| CvError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(io_err)?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| self.is_supported(path))
            .collect();
        paths.sort();

        Ok(paths
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_string_lossy().to_string();
                Some((path, stem))
            })
            .collect())
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.is_file()
            && path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .is_some_and(|ext| self.supported_extensions.contains(&ext))
    }
}

fn finish<P: Pixel<Subpixel = u8>>(
    kind: CatalogKind,
    dir: &Path,
    templates: Vec<Template<P>>,
) -> Result<TemplateCatalog<P>> {
    if templates.is_empty() {
        return Err(CvError::EmptyCatalog {
            kind,
            dir: dir.to_path_buf(),
        });
    }

    info!("Loaded {} {} templates from {:?}", templates.len(), kind, dir);
    Ok(TemplateCatalog::new(kind, dir, templates))
}

impl Default for TemplateLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Digit encoded in a template file stem (`3`, `3_bold`), if any.
pub fn digit_identity(stem: &str) -> Option<u8> {
    DIGIT_STEM_RE
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_png(dir: &Path, name: &str, value: u8) {
        let img = GrayImage::from_pixel(6, 8, Luma([value]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_digit_identity() {
        assert_eq!(digit_identity("3"), Some(3));
        assert_eq!(digit_identity("7_bold"), Some(7));
        assert_eq!(digit_identity("12"), Some(1));
        assert_eq!(digit_identity("x3"), None);
        assert_eq!(digit_identity("3-bad"), None);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = TemplateLoader::new()
            .load_catalog(dir.path().join("nope"), CatalogKind::Mode)
            .unwrap_err();
        assert!(matches!(err, CvError::MissingCatalog(_)));
    }

    #[test]
    fn test_mode_catalog_in_name_order() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "win.png", 10);
        RgbImage::from_pixel(6, 8, Rgb([200, 40, 10]))
            .save(dir.path().join("home.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = TemplateLoader::new()
            .load_catalog(dir.path(), CatalogKind::Mode)
            .unwrap();

        assert_eq!(catalog.kind(), CatalogKind::Mode);
        assert_eq!(catalog.labels().collect::<Vec<_>>(), vec!["home", "win"]);
        assert!(catalog.templates().iter().all(|t| t.digit.is_none()));
        // colour survives loading
        assert_eq!(catalog.templates()[0].image.get_pixel(0, 0), &Rgb([200, 40, 10]));
    }

    #[test]
    fn test_digit_catalog_is_binarized_and_filtered() {
        let dir = tempdir().unwrap();
        write_png(dir.path(), "4.png", 230);
        write_png(dir.path(), "4_alt.png", 100);
        write_png(dir.path(), "readme.png", 255);

        let catalog = TemplateLoader::new().load_digits(dir.path()).unwrap();

        assert_eq!(catalog.len(), 2);
        let bright = &catalog.templates()[0];
        assert_eq!(bright.digit, Some(4));
        assert_eq!(bright.label, "4");
        assert_eq!(bright.image.get_pixel(0, 0)[0], 255);
        assert_eq!(catalog.templates()[1].image.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = TemplateLoader::new()
            .load_catalog(dir.path(), CatalogKind::Icon)
            .unwrap_err();
        assert!(matches!(err, CvError::EmptyCatalog { kind: CatalogKind::Icon, .. }));
    }
}
