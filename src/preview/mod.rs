//! Remote thumbnails for non-image attachments.
//!
//! The preview service renders thumbnails asynchronously and offers no
//! completion signal, so the fetcher uploads the attachment, polls on a
//! fixed backoff schedule, and always removes the upload afterwards.

pub mod http;

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::data_uri::DataUri;
use crate::model::message::Attachment;

/// Default wait before each readiness check.
pub const DEFAULT_BACKOFF_SECS: [u64; 5] = [2, 3, 4, 5, 5];

static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=s\d+").expect("valid regex"));

/// Identifier of an attachment uploaded to the preview service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedId(pub String);

/// Raw answer to a thumbnail download.
#[derive(Debug, Clone)]
pub struct PreviewResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The remote files API used to produce thumbnails.
pub trait PreviewService {
    /// Upload the attachment so the service can render it.
    fn stage(&self, attachment: &Attachment) -> Result<StagedId>;

    /// The thumbnail URL, or `None` while rendering is still pending.
    fn thumbnail_link(&self, id: &StagedId) -> Result<Option<String>>;

    /// Download a thumbnail URL over the authenticated channel.
    fn fetch(&self, url: &str) -> Result<PreviewResponse>;

    /// Soft-delete a staged upload.
    fn remove(&self, id: &StagedId) -> Result<()>;
}

impl<S: PreviewService + ?Sized> PreviewService for &S {
    fn stage(&self, attachment: &Attachment) -> Result<StagedId> {
        (**self).stage(attachment)
    }
    fn thumbnail_link(&self, id: &StagedId) -> Result<Option<String>> {
        (**self).thumbnail_link(id)
    }
    fn fetch(&self, url: &str) -> Result<PreviewResponse> {
        (**self).fetch(url)
    }
    fn remove(&self, id: &StagedId) -> Result<()> {
        (**self).remove(id)
    }
}

/// Blocking wait between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<Z: Sleeper + ?Sized> Sleeper for &Z {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Anything that can produce a thumbnail for an attachment.
pub trait ThumbnailProvider {
    fn get_thumbnail(&self, attachment: &Attachment) -> Option<DataUri>;
}

/// Run `op` once after each delay in `schedule` until it yields a value.
///
/// `op` receives the 1-based attempt number. At most `schedule.len()`
/// attempts are made.
pub fn retry_with_delay<T>(
    schedule: &[Duration],
    sleeper: &dyn Sleeper,
    mut op: impl FnMut(usize) -> Option<T>,
) -> Option<T> {
    for (i, delay) in schedule.iter().enumerate() {
        sleeper.sleep(*delay);
        if let Some(value) = op(i + 1) {
            return Some(value);
        }
    }
    None
}

/// Rewrite a `=s<N>` size suffix to request `size` pixels.
pub fn upsize_link(link: &str, size: u32) -> String {
    SIZE_SUFFIX
        .replace_all(link, format!("=s{size}").as_str())
        .into_owned()
}

/// Removes a staged upload when dropped, on every exit path.
struct StagedGuard<'s, S: PreviewService + ?Sized> {
    service: &'s S,
    id: StagedId,
}

impl<S: PreviewService + ?Sized> Drop for StagedGuard<'_, S> {
    fn drop(&mut self) {
        match self.service.remove(&self.id) {
            Ok(()) => debug!(id = %self.id.0, "Removed staged preview upload"),
            Err(e) => warn!(id = %self.id.0, error = %e, "Failed to remove staged preview upload"),
        }
    }
}

/// Polls a [`PreviewService`] for a thumbnail with bounded backoff.
pub struct ThumbnailFetcher<S, Z = ThreadSleeper> {
    service: S,
    sleeper: Z,
    backoff: Vec<Duration>,
    size: u32,
}

impl<S: PreviewService> ThumbnailFetcher<S, ThreadSleeper> {
    /// Fetcher with the default 2, 3, 4, 5, 5 second schedule.
    pub fn new(service: S, size: u32) -> Self {
        Self {
            service,
            sleeper: ThreadSleeper,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|&s| Duration::from_secs(s))
                .collect(),
            size,
        }
    }
}

impl<S: PreviewService, Z: Sleeper> ThumbnailFetcher<S, Z> {
    /// Replace the backoff schedule. Callers validate monotonicity.
    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the sleeper.
    pub fn with_sleeper<Z2: Sleeper>(self, sleeper: Z2) -> ThumbnailFetcher<S, Z2> {
        ThumbnailFetcher {
            service: self.service,
            sleeper,
            backoff: self.backoff,
            size: self.size,
        }
    }

    /// Stage, poll, and clean up. `None` when no thumbnail became available.
    pub fn fetch_thumbnail(&self, attachment: &Attachment) -> Option<DataUri> {
        let id = match self.service.stage(attachment) {
            Ok(id) => id,
            Err(e) => {
                warn!(name = %attachment.name, error = %e, "Could not stage attachment for preview");
                return None;
            }
        };
        let guard = StagedGuard {
            service: &self.service,
            id,
        };

        let result = retry_with_delay(&self.backoff, &self.sleeper, |attempt| {
            self.attempt(&guard.id, attempt)
        });

        match &result {
            Some(_) => info!(name = %attachment.name, "Fetched attachment thumbnail"),
            None => warn!(
                name = %attachment.name,
                attempts = self.backoff.len(),
                "Thumbnail not ready, giving up"
            ),
        }
        result
    }

    /// One readiness check plus download.
    fn attempt(&self, id: &StagedId, attempt: usize) -> Option<DataUri> {
        let link = match self.service.thumbnail_link(id) {
            Ok(Some(link)) => link,
            Ok(None) => {
                debug!(id = %id.0, attempt, "Thumbnail not ready yet");
                return None;
            }
            Err(e) => {
                debug!(id = %id.0, attempt, error = %e, "Thumbnail lookup failed");
                return None;
            }
        };

        match self.service.fetch(&upsize_link(&link, self.size)) {
            Ok(resp) if resp.status == 200 => {
                let mime = resp.content_type.as_deref().unwrap_or("image/png");
                Some(DataUri::encode(mime, &resp.bytes))
            }
            Ok(resp) => {
                debug!(id = %id.0, attempt, status = resp.status, "Thumbnail download not ready");
                None
            }
            Err(e) => {
                debug!(id = %id.0, attempt, error = %e, "Thumbnail download failed");
                None
            }
        }
    }
}

impl<S: PreviewService, Z: Sleeper> ThumbnailProvider for ThumbnailFetcher<S, Z> {
    fn get_thumbnail(&self, attachment: &Attachment) -> Option<DataUri> {
        self.fetch_thumbnail(attachment)
    }
}
