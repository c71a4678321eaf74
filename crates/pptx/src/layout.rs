//! Content-layout selection for non-title slides.

use crate::placeholder::{find_role, scan_placeholders, Placeholder, PlaceholderRole};
use crate::template::TemplateShell;
use deck_core::{Error, Result};

/// The layout chosen for all content slides, with its scanned placeholders.
#[derive(Debug, Clone)]
pub struct ContentLayout {
    /// Layout part name, e.g. `ppt/slideLayouts/slideLayout2.xml`.
    pub part_name: String,
    /// Placeholders scanned from the layout, in document order.
    pub placeholders: Vec<Placeholder>,
}

impl ContentLayout {
    /// First placeholder with the given role.
    pub fn find(&self, role: PlaceholderRole) -> Option<&Placeholder> {
        find_role(&self.placeholders, role)
    }

    /// Whether the layout carries a placeholder with the given role.
    pub fn has(&self, role: PlaceholderRole) -> bool {
        self.find(role).is_some()
    }
}

/// Choose the content layout for a run.
///
/// The first layout (in master reference order) whose placeholder roles
/// include both Title and Body wins. When none qualifies, the second layout
/// is used if at least two exist, else the first. Deterministic for a given
/// template.
pub fn choose_content_layout(shell: &TemplateShell) -> Result<ContentLayout> {
    let mut scanned = Vec::with_capacity(shell.layouts.len());

    for part_name in &shell.layouts {
        let xml = shell.package.part_str(part_name)?;
        let placeholders = scan_placeholders(&xml)?;

        let has_title = placeholders
            .iter()
            .any(|p| p.role == PlaceholderRole::Title);
        let has_body = placeholders.iter().any(|p| p.role == PlaceholderRole::Body);

        if has_title && has_body {
            log::debug!("Content layout: {} (title+body)", part_name);
            return Ok(ContentLayout {
                part_name: part_name.clone(),
                placeholders,
            });
        }
        scanned.push((part_name.clone(), placeholders));
    }

    // No layout qualifies; prefer the second (the first is usually the
    // title layout), else whatever exists.
    let (part_name, placeholders) = if scanned.len() >= 2 {
        scanned.swap_remove(1)
    } else {
        scanned
            .into_iter()
            .next()
            .ok_or_else(|| Error::Package("template has no slide layouts".to_string()))?
    };

    log::debug!("Content layout (fallback): {}", part_name);
    Ok(ContentLayout {
        part_name,
        placeholders,
    })
}
