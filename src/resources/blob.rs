//! In-memory texture blobs addressable by URL.
//!
//! Texture entries of an archive never touch the network again once they are
//! extracted. Each one becomes a [`BlobUrl`]: the raw bytes plus a URL that
//! refers to them. In the browser the URL is a real object URL
//! (`URL.createObjectURL`) and is revoked once the last handle is dropped.

use std::sync::Arc;
#[cfg(not(target_arch = "wasm32"))]
use std::sync::atomic::{AtomicU64, Ordering};

struct BlobInner {
    name: String,
    url: String,
    bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct BlobUrl(Arc<BlobInner>);

impl BlobUrl {
    pub fn create(name: &str, bytes: Vec<u8>) -> Self {
        let url = object_url(name, &bytes);
        Self(Arc::new(BlobInner {
            name: name.to_string(),
            url,
            bytes,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn url(&self) -> &str {
        &self.0.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }
}

impl PartialEq for BlobUrl {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for BlobUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobUrl")
            .field("name", &self.0.name)
            .field("url", &self.0.url)
            .field("len", &self.0.bytes.len())
            .finish()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn object_url(name: &str, _bytes: &[u8]) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    format!("blob:flow-preview/{id}/{name}")
}

#[cfg(target_arch = "wasm32")]
fn object_url(name: &str, bytes: &[u8]) -> String {
    let parts = js_sys::Array::of1(&js_sys::Uint8Array::from(bytes));
    let url = web_sys::Blob::new_with_u8_array_sequence(&parts)
        .and_then(|blob| web_sys::Url::create_object_url_with_blob(&blob));
    match url {
        Ok(url) => url,
        Err(e) => {
            log::warn!("could not create an object URL for {name}: {e:?}");
            format!("blob:flow-preview/{name}")
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl Drop for BlobInner {
    fn drop(&mut self) {
        if self.url.starts_with("blob:flow-preview/") {
            return;
        }
        if let Err(e) = web_sys::Url::revoke_object_url(&self.url) {
            log::warn!("could not revoke {}: {e:?}", self.url);
        }
    }
}
