//! Template rendering.
//!
//! - [`Links`]: path and title templates compiled once from the config
//! - [`Renderer`]: theme page templates with layouts, compiled on first use
//! - [`RenderContext`]: the root object each page template sees

mod context;
mod engine;
mod error;
mod helpers;
mod links;
mod objects;

pub use context::{Listing, Pagination, RenderContext, ViewModel};
pub use engine::Renderer;
pub use error::RenderError;
pub use links::Links;
