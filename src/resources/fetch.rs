//! Retrieval of archive bytes.
//!
//! In the browser archives come from the model API over HTTP. Natively the same
//! URL is resolved against a directory, which is what the desktop viewer and
//! the tests use.

use futures::future::LocalBoxFuture;

use crate::error::PreviewError;

pub trait ArchiveFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>>;
}

/// Fetches archives with `reqwest` relative to the page's origin.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct HttpFetcher;

#[cfg(target_arch = "wasm32")]
fn format_url(url: &str) -> Result<reqwest::Url, PreviewError> {
    let origin = web_sys::window()
        .and_then(|window| window.location().origin().ok())
        .ok_or_else(|| PreviewError::Network {
            url: url.to_string(),
            message: "no page origin to resolve against".into(),
        })?;
    let base = reqwest::Url::parse(&format!("{origin}/")).map_err(|e| PreviewError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    base.join(url).map_err(|e| PreviewError::Network {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(target_arch = "wasm32")]
impl ArchiveFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>> {
        Box::pin(async move {
            let full = format_url(url)?;
            let response = match reqwest::get(full).await {
                Ok(response) => response,
                // No response means no headers: the browser cancelled the request.
                Err(e) => {
                    log::debug!("request for {url} ended without response: {e}");
                    return Err(PreviewError::Aborted);
                }
            };
            let status = response.status();
            if !status.is_success() {
                return Err(PreviewError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            // Headers arrived, a failing body is never a cancellation.
            let bytes = response.bytes().await.map_err(|e| PreviewError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            Ok(bytes.to_vec())
        })
    }
}

/// Resolves archive URLs to files below `root`: `/api/model/1/2` reads
/// `<root>/api/model/1/2`.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FileFetcher {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileFetcher {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, url: &str) -> std::path::PathBuf {
        url.split('/')
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl ArchiveFetcher for FileFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>> {
        Box::pin(async move {
            let path = self.path_of(url);
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PreviewError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
                Err(e) => Err(e.into()),
            }
        })
    }
}
