//! OOXML engine for template-driven PPTX population.
//!
//! A `.pptx` file is a ZIP archive of XML parts. This crate loads a template
//! package, strips its pre-existing slides while keeping layouts and masters
//! byte-identical, classifies placeholder slots by their structural type
//! codes, and composes new slides bound to the chosen content layout.

pub mod compose;
pub mod layout;
pub mod package;
pub mod picture;
pub mod placeholder;
pub mod slidexml;
pub mod template;

pub use compose::Composer;
pub use layout::{choose_content_layout, ContentLayout};
pub use package::Package;
pub use picture::PlacementConfig;
pub use placeholder::{Placeholder, PlaceholderRole};
pub use template::TemplateShell;
