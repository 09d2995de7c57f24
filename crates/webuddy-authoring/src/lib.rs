#![forbid(unsafe_code)]

//! Authoring-side services for Webuddy.
//!
//! The embed script only needs a configuration document. Producing one is the
//! authoring tool's job, and this crate holds the parts of that job that do
//! not depend on a particular backend:
//!
//! - [`store`] - saved characters and sprite image uploads
//! - [`generation`] - turning a site and a personality into dialogue lines
//! - [`discovery`] - listing a site's pages for per-page dialogue
//!
//! Anything that talks to the network is a trait ([`ConfigStore`],
//! [`ImageStore`], [`PageFetcher`], [`ChatBackend`]) so the tool can plug in
//! its own client.

pub mod discovery;
pub mod generation;
pub mod store;

pub use discovery::{DiscoveryError, FetchError, PageFetcher, discover_pages, parse_sitemap, same_domain_links};
pub use generation::{
    ChatBackend, ChatRequest, DialogueGenerator, GenerationError, GenerationRequest,
    GenerationResponse, Prompts, SiteDialogueGenerator, build_prompts, extract_site_text,
    parse_generated_dialogue,
};
pub use store::{
    ConfigStore, ImageStore, MemoryConfigStore, StoreError, StoreResult, WebuddyDraft,
    WebuddyRecord, cache_busted_url, image_object_path, upload_sprite_image,
};
