//! MIME provider chain.
//!
//! Static-file and content-negotiation stages resolve two questions through
//! the context: "what MIME type is this extension?" and "should this MIME
//! type be served compressed?". Neither answer is baked in. Providers are
//! registered on the context and queried newest-first; the first one with a
//! definite answer wins, so a stage can shadow earlier registrations without
//! removing them.

use std::sync::Arc;

/// One link in the chain. Return `None` from either method when this
/// provider has no opinion and the next (older) provider should be asked.
pub trait MimeTypeProvider: Send + Sync {
    /// The MIME type for a file `extension` (without the leading dot).
    fn mime_type(&self, extension: &str) -> Option<String>;

    /// Whether content of `mime_type` should be served compressed.
    fn prefer_compression(&self, mime_type: &str) -> Option<bool>;
}

/// An ordered chain of MIME providers, queried newest-first.
#[derive(Default)]
pub struct MimeTypeProviderStack {
    providers: Vec<Arc<dyn MimeTypeProvider>>,
}

impl MimeTypeProviderStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` at the top of the chain; it will be consulted
    /// before every provider registered earlier.
    pub fn push(&mut self, provider: Arc<dyn MimeTypeProvider>) {
        self.providers.push(provider);
    }

    /// First definite answer wins. `None` when no provider can answer.
    pub fn mime_type(&self, extension: &str) -> Option<String> {
        self.providers.iter().rev().find_map(|p| p.mime_type(extension))
    }

    /// First definite answer wins. `None` when no provider can decide.
    pub fn determine_compression(&self, mime_type: &str) -> Option<bool> {
        self.providers
            .iter()
            .rev()
            .find_map(|p| p.prefer_compression(mime_type))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
