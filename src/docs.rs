//! # Documentation extraction
//!
//! Pulls provider documentation out of a release's source tarball. Two
//! layouts are understood: the current `docs/` tree and the legacy
//! `website/docs/` tree. The legacy tree is only consulted when `docs/`
//! yields nothing.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::provider_version_documentation::DocumentationType;

/// Language recorded for every extracted page.
pub const DOCUMENTATION_LANGUAGE: &str = "hcl";

const MARKDOWN_EXTENSION: &str = ".md";
const LEGACY_EXTENSIONS: [&str; 2] = [".html.markdown", ".html.md"];

#[derive(Debug, Error)]
pub enum DocumentationError {
    #[error("failed to read source archive: {0}")]
    Archive(#[from] std::io::Error),
}

/// One documentation page ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationPage {
    pub documentation_type: DocumentationType,
    pub title: String,
    pub slug: String,
    pub filename: String,
    pub language: String,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    page_title: Option<String>,
    subcategory: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Current,
    Legacy,
}

/// Extracts documentation pages from a gzip-compressed tarball.
pub fn extract_documentation(archive: &[u8]) -> Result<Vec<DocumentationPage>, DocumentationError> {
    let mut tarball = tar::Archive::new(GzDecoder::new(archive));
    let mut current = Vec::new();
    let mut legacy = Vec::new();
    let mut seen_current = HashSet::new();
    let mut seen_legacy = HashSet::new();

    for entry in tarball.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry.path()?.into_owned();
        let Some(relative) = strip_top_level(&path) else {
            continue;
        };
        let Some((layout, documentation_type, slug, filename)) = classify(&relative) else {
            continue;
        };

        let mut raw = Vec::new();
        entry.read_to_end(&mut raw)?;
        let Ok(content) = String::from_utf8(raw) else {
            warn!(path = %path.display(), "documentation file is not UTF-8, skipping");
            continue;
        };

        let (pages, seen) = match layout {
            Layout::Current => (&mut current, &mut seen_current),
            Layout::Legacy => (&mut legacy, &mut seen_legacy),
        };
        // Pages are unique per (type, slug); the first file in the archive wins.
        if !seen.insert((documentation_type, slug.clone())) {
            warn!(
                path = %path.display(),
                category = %documentation_type,
                slug = %slug,
                "duplicate documentation page, skipping"
            );
            continue;
        }

        let page = build_page(documentation_type, slug, filename, content);
        debug!(path = %path.display(), category = %page.documentation_type, "extracted documentation page");
        pages.push(page);
    }

    Ok(if current.is_empty() { legacy } else { current })
}

/// Drops the archive's top-level directory (`owner-repo-sha/`).
fn strip_top_level(path: &Path) -> Option<Vec<String>> {
    let mut components = path.components().filter_map(|component| match component {
        Component::Normal(part) => part.to_str().map(str::to_string),
        _ => None,
    });
    components.next()?;
    let rest: Vec<String> = components.collect();
    (!rest.is_empty()).then_some(rest)
}

fn classify(parts: &[String]) -> Option<(Layout, DocumentationType, String, String)> {
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
    match parts.as_slice() {
        ["docs", "index.md"] => Some((
            Layout::Current,
            DocumentationType::Overview,
            "index".to_string(),
            "index.md".to_string(),
        )),
        ["docs", directory, file] => {
            let documentation_type = match *directory {
                "resources" => DocumentationType::Resource,
                "data-sources" => DocumentationType::DataSource,
                "guides" => DocumentationType::Guide,
                _ => return None,
            };
            let slug = file.strip_suffix(MARKDOWN_EXTENSION)?;
            Some((Layout::Current, documentation_type, slug.to_string(), file.to_string()))
        }
        ["website", "docs", file] => {
            let slug = strip_legacy_extension(file)?;
            (slug == "index").then(|| {
                (
                    Layout::Legacy,
                    DocumentationType::Provider,
                    slug.to_string(),
                    file.to_string(),
                )
            })
        }
        ["website", "docs", directory, file] => {
            let documentation_type = match *directory {
                "r" => DocumentationType::Resource,
                "d" => DocumentationType::DataSource,
                "guides" => DocumentationType::Guide,
                _ => return None,
            };
            let slug = strip_legacy_extension(file)?;
            Some((Layout::Legacy, documentation_type, slug.to_string(), file.to_string()))
        }
        _ => None,
    }
}

fn strip_legacy_extension(file: &str) -> Option<&str> {
    LEGACY_EXTENSIONS
        .iter()
        .find_map(|extension| file.strip_suffix(extension))
        .filter(|slug| !slug.is_empty())
}

fn build_page(
    documentation_type: DocumentationType,
    slug: String,
    filename: String,
    content: String,
) -> DocumentationPage {
    let front_matter = parse_front_matter(&content, &filename);
    let title = non_empty(front_matter.page_title).unwrap_or_else(|| slug.clone());

    DocumentationPage {
        documentation_type,
        title,
        slug,
        filename,
        language: DOCUMENTATION_LANGUAGE.to_string(),
        subcategory: non_empty(front_matter.subcategory),
        description: non_empty(front_matter.description),
        content,
    }
}

/// Reads the YAML block between leading `---` fences, if present.
fn parse_front_matter(content: &str, filename: &str) -> FrontMatter {
    let Some((yaml, _)) = split_front_matter(content) else {
        return FrontMatter::default();
    };
    serde_yaml::from_str(yaml).unwrap_or_else(|err| {
        warn!(filename, error = %err, "invalid front matter, ignoring");
        FrontMatter::default()
    })
}

/// Splits leading `---` fenced YAML from the page body.
pub(crate) fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
