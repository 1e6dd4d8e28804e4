//! Archive enumeration and per-entry decoding.
//!
//! An [`ArchiveReader`] exposes the entries of a container and reads each one
//! independently. [`extract`] decodes all entries concurrently and hands the
//! resulting [`AssetBundle`] over once a [`CompletionTracker`] has seen every
//! entry finish, whatever order they finished in.

use std::{
    io::{Cursor, Read},
    sync::{Arc, Mutex, PoisonError},
};

use futures::{StreamExt, future::LocalBoxFuture, stream::FuturesUnordered};
use zip::ZipArchive;

use crate::{
    data_structures::{
        bundle::{AssetBundle, EntryKind, EntryPayload},
        completion::CompletionTracker,
    },
    error::PreviewError,
    resources::blob::BlobUrl,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub index: usize,
    pub name: String,
}

impl ArchiveEntry {
    pub fn kind(&self) -> EntryKind {
        EntryKind::classify(&self.name)
    }
}

pub trait ArchiveReader {
    /// File entries of the archive. Directory records are not entries.
    fn entries(&self) -> Result<Vec<ArchiveEntry>, PreviewError>;

    /// Raw, uncompressed bytes of one entry.
    fn read<'a>(&'a self, entry: &'a ArchiveEntry) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>>;
}

/// Zip container held in memory.
#[derive(Clone)]
pub struct ZipReader {
    bytes: Arc<[u8]>,
}

impl ZipReader {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { bytes: bytes.into() }
    }

    fn open(&self) -> Result<ZipArchive<Cursor<Arc<[u8]>>>, PreviewError> {
        Ok(ZipArchive::new(Cursor::new(self.bytes.clone()))?)
    }
}

impl ArchiveReader for ZipReader {
    fn entries(&self) -> Result<Vec<ArchiveEntry>, PreviewError> {
        let mut archive = self.open()?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            entries.push(ArchiveEntry {
                index,
                name: file.name().to_string(),
            });
        }
        Ok(entries)
    }

    fn read<'a>(&'a self, entry: &'a ArchiveEntry) -> LocalBoxFuture<'a, Result<Vec<u8>, PreviewError>> {
        Box::pin(async move {
            // Every read opens its own view on the shared bytes, entries never wait on each other.
            let mut archive = self.open()?;
            let mut file = archive.by_index(entry.index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            Ok(data)
        })
    }
}

impl std::fmt::Debug for ZipReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipReader").field("len", &self.bytes.len()).finish()
    }
}

/// Decode a single entry according to its kind.
pub async fn decode_entry<R: ArchiveReader + ?Sized>(
    reader: &R,
    entry: &ArchiveEntry,
) -> Result<EntryPayload, PreviewError> {
    let data = reader.read(entry).await?;
    let payload = if entry.kind().is_text() {
        EntryPayload::Text(match String::from_utf8(data) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{} is not valid UTF-8, decoding lossily", entry.name);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        })
    } else {
        EntryPayload::Blob(BlobUrl::create(&entry.name, data))
    };
    Ok(payload)
}

/// Decode every entry of `reader` into an [`AssetBundle`].
///
/// Entry decodes run concurrently and may finish in any order. The first failing
/// entry fails the whole extraction.
pub async fn extract<R: ArchiveReader + ?Sized>(reader: &R) -> Result<AssetBundle, PreviewError> {
    let entries = reader.entries()?;
    log::debug!("archive lists {} entries", entries.len());

    let bundle = Arc::new(Mutex::new(AssetBundle::default()));
    let (tracker, done) = CompletionTracker::with_signal(entries.len(), {
        let bundle = bundle.clone();
        move || std::mem::take(&mut *bundle.lock().unwrap_or_else(PoisonError::into_inner))
    });

    let mut decodes: FuturesUnordered<_> = entries
        .iter()
        .map(|entry| {
            let bundle = bundle.clone();
            let tracker = tracker.clone();
            async move {
                let payload = decode_entry(reader, entry).await?;
                bundle
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(&entry.name, entry.kind(), payload);
                tracker.complete();
                Ok::<(), PreviewError>(())
            }
        })
        .collect();

    while let Some(result) = decodes.next().await {
        result?;
    }

    done.receive().await.ok_or(PreviewError::Incomplete)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn zip_entries_skip_directories() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.add_directory("textures/", options).unwrap();
        writer.start_file("textures/wood.png", options).unwrap();
        writer.write_all(b"png").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let reader = ZipReader::new(bytes);
        let entries = reader.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "textures/wood.png");
        assert_eq!(entries[0].kind(), EntryKind::Texture);
    }

    #[test]
    fn extracts_every_entry_into_its_slot() {
        let bytes = zip_of(&[
            ("model.obj", b"v 0 0 0\n"),
            ("model.mtl", b"newmtl wood\n"),
            ("wood.png", &[0x89, b'P', b'N', b'G']),
        ]);
        let bundle = futures::executor::block_on(extract(&ZipReader::new(bytes))).unwrap();
        assert_eq!(bundle.geometry.as_deref(), Some("v 0 0 0\n"));
        assert_eq!(bundle.material.as_deref(), Some("newmtl wood\n"));
        assert_eq!(bundle.textures["wood.png"].bytes(), &[0x89, b'P', b'N', b'G']);
        assert_eq!(bundle.slot_count(), 3);
    }

    #[test]
    fn empty_archive_yields_empty_bundle() {
        let bytes = zip_of(&[]);
        let bundle = futures::executor::block_on(extract(&ZipReader::new(bytes))).unwrap();
        assert_eq!(bundle.slot_count(), 0);
    }

    #[test]
    fn garbage_is_an_archive_error() {
        let result = futures::executor::block_on(extract(&ZipReader::new(b"not a zip".to_vec())));
        assert!(matches!(result, Err(PreviewError::Archive(_))));
    }
}
