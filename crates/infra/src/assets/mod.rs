//! Asset packaging: turn a job's `output/` directory into a download.
//!
//! The requested media type picks between a tar bundle, a single PDF, and a
//! zip bundle (the default).

pub mod archive;
pub mod single;

use std::io;
use std::path::{Path, PathBuf};

use zip::result::ZipError;

use texapi_core::JobId;

use crate::storage::StorageLayout;

pub use archive::{PACKED_EXTENSIONS, build_tar, build_zip, should_pack_file};
pub use single::read_by_extension;

const TAR_MEDIA_TYPES: [&str; 6] = [
    "application/tar",
    "application/x-tar",
    "application/x-gtar",
    "multipart/x-tar",
    "application/x-compress",
    "application/x-compressed",
];

const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Asset packaging error.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("no matching output file")]
    NotFound,
    #[error("walking output directory: {0}")]
    Walk(#[source] walkdir::Error),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing zip archive: {0}")]
    Zip(#[from] ZipError),
}

impl AssetError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Download representation chosen by content negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Zip,
    Tar,
    Pdf,
}

impl AssetFormat {
    /// Pick a format from an `Accept` header value.
    ///
    /// Media types are checked in the order given (parameters such as `q=`
    /// are ignored); the first recognized one wins, zip otherwise.
    pub fn negotiate(accept: Option<&str>) -> Self {
        let Some(accept) = accept else {
            return AssetFormat::Zip;
        };

        for media in accept.split(',') {
            let media = media.split(';').next().unwrap_or_default().trim();
            if TAR_MEDIA_TYPES.iter().any(|t| t.eq_ignore_ascii_case(media)) {
                return AssetFormat::Tar;
            }
            if media.eq_ignore_ascii_case(PDF_MEDIA_TYPE) {
                return AssetFormat::Pdf;
            }
            if media.eq_ignore_ascii_case("application/zip") {
                return AssetFormat::Zip;
            }
        }
        AssetFormat::Zip
    }
}

/// A packaged download, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: &'static str,
    pub extension: &'static str,
    pub body: Vec<u8>,
}

impl Asset {
    /// `<job-id>.<ext>`, used for `Content-Disposition`.
    pub fn filename(&self, id: JobId) -> String {
        format!("{id}.{}", self.extension)
    }
}

/// Builds downloads out of job output directories.
#[derive(Debug, Clone)]
pub struct AssetPackager {
    layout: StorageLayout,
}

impl AssetPackager {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    /// Package the output of `id` in `format`.
    ///
    /// For [`AssetFormat::Pdf`], `log_on_error` falls back to the build log
    /// when no PDF exists. Blocking; call from a blocking context.
    pub fn package(
        &self,
        id: JobId,
        format: AssetFormat,
        log_on_error: bool,
    ) -> Result<Asset, AssetError> {
        let base = self.layout.output_dir(id);

        match format {
            AssetFormat::Zip => Ok(Asset {
                content_type: "application/zip",
                extension: "zip",
                body: build_zip(&base)?,
            }),
            AssetFormat::Tar => Ok(Asset {
                content_type: "application/x-tar",
                extension: "tar",
                body: build_tar(&base)?,
            }),
            AssetFormat::Pdf => {
                if let Some(body) = read_by_extension(&base, "pdf")? {
                    return Ok(Asset {
                        content_type: PDF_MEDIA_TYPE,
                        extension: "pdf",
                        body,
                    });
                }
                if log_on_error {
                    if let Some(body) = read_by_extension(&base, "log")? {
                        return Ok(Asset {
                            content_type: "text/plain",
                            extension: "log",
                            body,
                        });
                    }
                }
                Err(AssetError::NotFound)
            }
        }
    }
}
