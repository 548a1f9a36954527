//! Input resolution: turn caller references into local files of a known kind.
//!
//! ## Why download into the job workspace?
//!
//! PDFium and the image decoders want a file-system path. Remote references
//! are downloaded into a `NamedTempFile` inside the job's workspace so the
//! file disappears as soon as its [`SourceItem`] is dropped at the end of a
//! batch, and the whole workspace goes away with the job even on error.
//!
//! Resolution never fails a job: a reference that cannot be turned into a
//! readable file resolves to `None` and the item is skipped.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// What a resolved file contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Pdf,
}

/// A readable local file plus what it contains.
#[derive(Debug)]
pub struct ResolvedInput {
    path: PathBuf,
    kind: SourceKind,
    /// Keeps a downloaded file alive until the input is dropped.
    _download: Option<NamedTempFile>,
}

impl ResolvedInput {
    /// A file that already exists and is owned by the caller.
    pub fn local(path: impl Into<PathBuf>, kind: SourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
            _download: None,
        }
    }

    /// A file the resolver created; deleted when this value is dropped.
    pub fn downloaded(file: NamedTempFile, kind: SourceKind) -> Self {
        Self {
            path: file.path().to_path_buf(),
            kind,
            _download: Some(file),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// One input item, in caller order.
#[derive(Debug)]
pub struct SourceItem {
    /// 0-based position in the caller's input list.
    pub index: usize,
    pub reference: String,
    pub input: ResolvedInput,
}

/// Per-job facts a resolver may need.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Job workspace; anything written here is removed with the job.
    pub workspace: &'a Path,
    pub download_timeout_secs: u64,
}

/// Maps an opaque caller reference to a readable file.
#[async_trait]
pub trait InputResolver: Send + Sync {
    /// `None` means "no file for this reference"; the item is skipped.
    async fn resolve(&self, reference: &str, ctx: &ResolveContext<'_>) -> Option<ResolvedInput>;
}

/// Check if the reference looks like a URL we can download.
pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Signatures of the raster formats the image decoder accepts.
const IMAGE_MAGIC: [&[u8]; 5] = [b"\x89PNG", b"\xFF\xD8\xFF", b"GIF8", b"BM", b"RIFF"];

/// Classify file content. Magic bytes win over the name: `%PDF` is a PDF,
/// a known image signature is an image, and only unrecognised content falls
/// back to the `.pdf` extension. Anything else goes to the image decoder.
pub fn sniff_kind(head: &[u8], name: &str) -> SourceKind {
    if head.starts_with(b"%PDF") {
        return SourceKind::Pdf;
    }
    if is_image_magic(head) {
        return SourceKind::Image;
    }
    let is_pdf_name = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf_name {
        SourceKind::Pdf
    } else {
        SourceKind::Image
    }
}

fn is_image_magic(head: &[u8]) -> bool {
    IMAGE_MAGIC.iter().any(|magic| head.starts_with(magic))
        && (!head.starts_with(b"RIFF") || head.get(8..12) == Some(b"WEBP".as_slice()))
}

/// Default resolver: local paths, `file://` URIs, `http(s)` URLs, and an
/// optional lookup directory searched by file name.
///
/// The lookup directory covers hosts that hand over content URIs whose
/// bytes have already been copied into an app cache under the original
/// file name.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    lookup_dir: Option<PathBuf>,
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            lookup_dir: Some(dir.into()),
        }
    }

    async fn resolve_local(&self, reference: &str) -> Option<ResolvedInput> {
        let direct = PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference));
        if let Some(kind) = probe_file(&direct).await {
            debug!("Resolved local input: {}", direct.display());
            return Some(ResolvedInput::local(direct, kind));
        }

        let dir = self.lookup_dir.as_ref()?;
        let name = reference.rsplit(['/', '\\']).next().filter(|n| !n.is_empty())?;
        let candidate = dir.join(name);
        let kind = probe_file(&candidate).await?;
        debug!("Resolved '{}' via lookup dir: {}", reference, candidate.display());
        Some(ResolvedInput::local(candidate, kind))
    }

    async fn download(&self, url: &str, ctx: &ResolveContext<'_>) -> Option<ResolvedInput> {
        match download_url(url, ctx).await {
            Ok(input) => Some(input),
            Err(reason) => {
                warn!("Download of '{}' failed: {}", url, reason);
                None
            }
        }
    }
}

#[async_trait]
impl InputResolver for FsResolver {
    async fn resolve(&self, reference: &str, ctx: &ResolveContext<'_>) -> Option<ResolvedInput> {
        if is_url(reference) {
            self.download(reference, ctx).await
        } else {
            self.resolve_local(reference).await
        }
    }
}

/// Kind of a readable regular file at `path`, or `None`.
async fn probe_file(path: &Path) -> Option<SourceKind> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    if !meta.is_file() {
        return None;
    }
    let file = tokio::fs::File::open(path).await.ok()?;
    let mut head = Vec::with_capacity(12);
    file.take(12).read_to_end(&mut head).await.ok()?;
    Some(sniff_kind(&head, &path.to_string_lossy()))
}

async fn download_url(url: &str, ctx: &ResolveContext<'_>) -> Result<ResolvedInput, String> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(ctx.download_timeout_secs))
        .build()
        .map_err(|e| e.to_string())?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            format!("timed out after {}s", ctx.download_timeout_secs)
        } else {
            e.to_string()
        }
    })?;

    if !response.status().is_success() {
        return Err(format!("HTTP {}", response.status()));
    }

    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    let name = url_file_name(url);
    let kind = sniff_kind(&bytes, &name);

    let file = tempfile::Builder::new()
        .prefix("download-")
        .suffix(&format!("-{name}"))
        .tempfile_in(ctx.workspace)
        .map_err(|e| format!("temp file: {e}"))?;
    tokio::fs::write(file.path(), &bytes)
        .await
        .map_err(|e| format!("write temp file: {e}"))?;

    info!(
        "Downloaded {} bytes ({:?}) to: {}",
        bytes.len(),
        kind,
        file.path().display()
    );
    Ok(ResolvedInput::downloaded(file, kind))
}

/// Last path segment of `url`, or a generic name.
fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "input".to_string()
}
