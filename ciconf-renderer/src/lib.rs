//! # ciconf-renderer
//!
//! Tera-based rendering of the small files the configurator writes: the
//! `.gitreview` routing file seeded into every provisioned repository and the
//! jenkins-job-builder configuration. Hook scripts get literal `{{key}}`
//! substitution via [`placeholders::substitute`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ciconf_renderer::{GitReviewCtx, Renderer};
//!
//! fn routing() -> Result<String, ciconf_renderer::RenderError> {
//!     let renderer = Renderer::new()?;
//!     renderer.gitreview(&GitReviewCtx {
//!         project: "openstack/neutron".into(),
//!         host: "review.example.com".into(),
//!         port: 29418,
//!     })
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod placeholders;

pub use context::{GitReviewCtx, JjbConfigCtx};
pub use engine::{Renderer, TemplateKind};
pub use error::RenderError;
