//! Scoped property blobs.

use std::fmt;

use super::error::DrmError;
use super::kernel::KmsCard;

/// A kernel property blob destroyed when this handle is dropped.
///
/// The blob lives on the card it was created on, so the handle borrows it.
pub struct ScopedBlob<'a, C: KmsCard + ?Sized> {
    card: &'a C,
    id: u32,
}

impl<'a, C: KmsCard + ?Sized> ScopedBlob<'a, C> {
    /// Uploads `data` as a new blob.
    pub fn create(card: &'a C, data: &[u8]) -> Result<Self, DrmError> {
        let id = card
            .create_property_blob(data)
            .map_err(DrmError::BlobCreateFailed)?;
        trace!("created property blob {id} ({} bytes)", data.len());
        Ok(Self { card, id })
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<C: KmsCard + ?Sized> fmt::Debug for ScopedBlob<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedBlob").field("id", &self.id).finish()
    }
}

impl<C: KmsCard + ?Sized> Drop for ScopedBlob<'_, C> {
    fn drop(&mut self) {
        if let Err(err) = self.card.destroy_property_blob(self.id) {
            warn!("error destroying property blob {}: {err:?}", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drm::testing::{Fail, FakeCard};

    #[test]
    fn destroyed_once_on_drop() {
        let card = FakeCard::new();

        let blob = ScopedBlob::create(&card, b"mode").unwrap();
        let id = blob.id();
        assert_eq!(card.live_blobs(), [id]);

        drop(blob);
        assert!(card.live_blobs().is_empty());
        assert_eq!(card.destroyed_blobs(), [id]);
    }

    #[test]
    fn destroyed_on_early_return() {
        fn use_blob(card: &FakeCard) -> Result<u32, &'static str> {
            let blob = ScopedBlob::create(card, &[0; 68]).map_err(|_| "create")?;
            if blob.id() != 0 {
                return Err("bail");
            }
            Ok(blob.id())
        }

        let card = FakeCard::new();
        assert_eq!(use_blob(&card), Err("bail"));
        assert!(card.live_blobs().is_empty());
        assert_eq!(card.destroyed_blobs().len(), 1);
    }

    #[test]
    fn failed_create_destroys_nothing() {
        let card = FakeCard::new().failing(Fail::BlobCreate);
        assert!(matches!(
            ScopedBlob::create(&card, b"mode"),
            Err(DrmError::BlobCreateFailed(_))
        ));
        assert!(card.destroyed_blobs().is_empty());
    }

    #[test]
    fn failed_destroy_is_not_retried() {
        let card = FakeCard::new().failing(Fail::BlobDestroy);

        let blob = ScopedBlob::create(&card, b"mode").unwrap();
        let id = blob.id();
        drop(blob);

        assert_eq!(card.destroyed_blobs(), [id]);
    }
}
