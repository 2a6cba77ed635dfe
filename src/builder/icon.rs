use crate::core::error::{Error, IoContext, Result};
use crate::core::workspace::Workspace;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageOutputFormat};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const SOURCE_SIZE: u32 = 1024;

/// Launcher icon edge at mdpi.
pub const BASE_SIZE: u32 = 48;

pub const DENSITIES: [(&str, f32); 5] = [
    ("mdpi", 1.0),
    ("hdpi", 1.5),
    ("xhdpi", 2.0),
    ("xxhdpi", 3.0),
    ("xxxhdpi", 4.0),
];

pub const DEFAULT_ICON: &str = "ic_launcher.png";
pub const DEFAULT_ROUND_ICON: &str = "ic_launcher_round.png";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IconType {
    Rectangle(Option<String>),
    Round(Option<String>),
}

impl IconType {
    pub fn file_name(&self) -> &str {
        match self {
            Self::Rectangle(name) => name.as_deref().unwrap_or(DEFAULT_ICON),
            Self::Round(name) => name.as_deref().unwrap_or(DEFAULT_ROUND_ICON),
        }
    }
}

/// Edge length of the launcher icon for a density scale.
pub fn density_size(scale: f32) -> u32 {
    (BASE_SIZE as f32 * scale).round() as u32
}

/// Fans a 1024x1024 PNG out into the `mipmap-*` folders of a `res` directory.
#[derive(Debug)]
pub struct IconBuilder {
    scaler: Scaler,
    icon_type: IconType,
}

impl IconBuilder {
    /// `source` is a local path, a `file://` URL or an `http(s)://` URL.
    ///
    /// Remote sources are downloaded first. The download directory is removed once the
    /// image is decoded.
    pub fn new(source: &str, icon_type: IconType) -> Result<Self> {
        let scaler = if is_remote(source) {
            let download = Workspace::create_prefixed("IconBuilder", "download")?;
            let path = download.join("icon.png");
            fetch(source, &path)?;
            Scaler::open(&path)?
        } else {
            let path = source.strip_prefix("file://").unwrap_or(source);
            Scaler::open(Path::new(path))?
        };
        Ok(Self { scaler, icon_type })
    }

    pub fn icon_type(&self) -> &IconType {
        &self.icon_type
    }

    pub fn file_name(&self) -> &str {
        self.icon_type.file_name()
    }

    /// Replaces `mipmap-<density>/<file_name>` wherever it already exists and returns the
    /// written paths. Missing folders or files are skipped.
    pub fn build(&self, res_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = vec![];
        for (density, scale) in DENSITIES {
            let target = res_dir
                .join(format!("mipmap-{}", density))
                .join(self.file_name());
            if !target.is_file() {
                log::debug!("no {} icon at {}, skipped", density, target.display());
                continue;
            }
            let size = density_size(scale);
            let mut buf = vec![];
            self.scaler.write(&mut Cursor::new(&mut buf), size)?;
            fs::remove_file(&target)
                .io_context(|| format!("Removing `{}`", target.display()))?;
            fs::write(&target, &buf).io_context(|| format!("Writing `{}`", target.display()))?;
            log::debug!("wrote {}x{} icon to {}", size, size, target.display());
            written.push(target);
        }
        Ok(written)
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn fetch(url: &str, to: &Path) -> Result<()> {
    let unavailable = |reason: String| Error::IconSourceUnavailable {
        source_url: url.to_string(),
        reason,
    };
    log::info!("downloading icon from {}", url);
    let bytes = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.bytes())
        .map_err(|err| unavailable(err.to_string()))?;
    fs::write(to, &bytes).map_err(|err| unavailable(err.to_string()))
}

#[derive(Debug)]
struct Scaler {
    img: DynamicImage,
}

impl Scaler {
    fn open(path: &Path) -> Result<Self> {
        let invalid = || Error::InvalidIconFormat {
            path: path.to_path_buf(),
        };
        let reader = ImageReader::open(path)
            .io_context(|| format!("Opening icon `{}`", path.display()))?
            .with_guessed_format()
            .io_context(|| format!("Reading icon `{}`", path.display()))?;
        if reader.format() != Some(ImageFormat::Png) {
            return Err(invalid());
        }
        let img = reader.decode().map_err(|_| invalid())?;
        let (width, height) = img.dimensions();
        if width != SOURCE_SIZE || height != SOURCE_SIZE {
            return Err(Error::InvalidIconSize {
                path: path.to_path_buf(),
                width,
                height,
            });
        }
        Ok(Self { img })
    }

    fn write(&self, w: &mut Cursor<&mut Vec<u8>>, size: u32) -> Result<()> {
        let resized = self.img.resize_exact(size, size, FilterType::Triangle);
        resized
            .write_to(w, ImageOutputFormat::Png)
            .map_err(|err| Error::io("Encoding icon", std::io::Error::other(err)))
    }
}
