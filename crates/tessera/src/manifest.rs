use async_trait::async_trait;

use tessera_core::{Manifest, SharedSegmentIndex};

use crate::{error::PlayerResult, options::LoadOptions};

/// A manifest together with its segment addressing.
#[derive(Clone)]
pub struct LoadedManifest {
    pub manifest: Manifest,
    pub index: SharedSegmentIndex,
}

/// Manifest-parser collaborator.
///
/// Receives the full load options so it can fold supplementary text and image
/// tracks into the manifest it returns.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    async fn load(&self, opts: &LoadOptions) -> PlayerResult<LoadedManifest>;
}
