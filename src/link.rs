use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Which form the link was submitted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// A Google Drive, Docs, Sheets or Slides share link.
    Drive,
    /// Any other URL, encoded as-is.
    Website,
}

impl LinkMode {
    /// Download name offered for the finished PNG.
    pub fn suggested_filename(&self) -> &'static str {
        match self {
            LinkMode::Drive => "qrlink-drive.png",
            LinkMode::Website => "qrlink-website.png",
        }
    }
}

/// What the normalized link points at, so callers can offer the right
/// launch affordance: drive files fetch content directly, everything else
/// opens in a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    DriveFile,
    DriveFolder,
    Website,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::DriveFile => "drive-file",
            LinkKind::DriveFolder => "drive-folder",
            LinkKind::Website => "website",
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            LinkKind::DriveFile => "download",
            LinkKind::DriveFolder | LinkKind::Website => "open",
        }
    }
}

/// A validated link, ready to embed as the QR payload. The compositor never
/// re-derives or edits `url` after this point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLink {
    pub url: String,
    pub kind: LinkKind,
}

/// Resource id as it appears in share link paths, e.g. /file/d/<id>/view.
static FILE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/d/([A-Za-z0-9_-]+)").expect("static pattern"));

/// One rewrite rule: links on `host` whose path starts with `prefix` map to
/// the direct-access form built by `rewrite` from the original link and the
/// extracted id. Checked in order; no match means the link shape is not
/// supported.
struct Rule {
    host: &'static str,
    prefix: &'static str,
    rewrite: fn(input: &str, id: &str) -> String,
}

static REWRITE_RULES: [Rule; 5] = [
    Rule {
        host: "docs.google.com",
        prefix: "/document",
        rewrite: |_, id| format!("https://docs.google.com/document/d/{id}/export?format=docx"),
    },
    Rule {
        host: "docs.google.com",
        prefix: "/spreadsheets",
        rewrite: |_, id| format!("https://docs.google.com/spreadsheets/d/{id}/export?format=xlsx"),
    },
    Rule {
        host: "docs.google.com",
        prefix: "/presentation",
        rewrite: |_, id| format!("https://docs.google.com/presentation/d/{id}/export?format=pptx"),
    },
    Rule {
        host: "drive.google.com",
        prefix: "/file",
        rewrite: |_, id| format!("https://drive.google.com/uc?export=download&id={id}"),
    },
    // Already-direct links stay untouched, so normalizing twice is a no-op.
    Rule {
        host: "drive.google.com",
        prefix: "/uc",
        rewrite: |input, _| input.to_string(),
    },
];

/// Turn a submitted link into the canonical form to embed in the code.
///
/// Website links are validated and passed through verbatim (re-serializing
/// could add a trailing slash the user never typed). Drive links are
/// rewritten into their direct-download form, except folders, which have no
/// such form and open as-is.
pub fn normalize(mode: LinkMode, raw: &str) -> Result<NormalizedLink, Error> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }

    let url = Url::parse(input)?;

    match mode {
        LinkMode::Website => Ok(NormalizedLink {
            url: input.to_string(),
            kind: LinkKind::Website,
        }),
        LinkMode::Drive => normalize_drive(input, &url),
    }
}

fn normalize_drive(input: &str, url: &Url) -> Result<NormalizedLink, Error> {
    if is_folder(url) {
        debug!("folder link, passing through");
        return Ok(NormalizedLink {
            url: input.to_string(),
            kind: LinkKind::DriveFolder,
        });
    }

    let id = resource_id(url).ok_or(Error::MissingResourceId)?;
    let host = url.host_str().unwrap_or_default();

    for rule in &REWRITE_RULES {
        if host == rule.host && url.path().starts_with(rule.prefix) {
            debug!(host, prefix = rule.prefix, "matched rewrite rule");
            return Ok(NormalizedLink {
                url: (rule.rewrite)(input, &id),
                kind: LinkKind::DriveFile,
            });
        }
    }

    Err(Error::UnsupportedLinkFormat {
        host: host.to_string(),
        path: url.path().to_string(),
    })
}

/// Folders live under a `folders` path segment (`/drive/folders/<id>`,
/// `/drive/u/0/folders/<id>`); they have no direct-download form.
fn is_folder(url: &Url) -> bool {
    url.path().split('/').any(|segment| segment == "folders")
}

/// The `/d/<id>` path segment, falling back to a non-empty `id` query
/// parameter (the shape older share links use).
fn resource_id(url: &Url) -> Option<String> {
    if let Some(captures) = FILE_ID.captures(url.path()) {
        return Some(captures[1].to_string());
    }

    url.query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(link: &str) -> Result<NormalizedLink, Error> {
        normalize(LinkMode::Drive, link)
    }

    fn website(link: &str) -> Result<NormalizedLink, Error> {
        normalize(LinkMode::Website, link)
    }

    #[test]
    fn file_link_becomes_direct_download() {
        let normalized = drive("https://drive.google.com/file/d/ABC123/view").unwrap();
        assert_eq!(
            normalized.url,
            "https://drive.google.com/uc?export=download&id=ABC123"
        );
        assert_eq!(normalized.kind, LinkKind::DriveFile);
    }

    #[test]
    fn document_link_exports_docx() {
        let normalized =
            drive("https://docs.google.com/document/d/DOC42/edit?usp=sharing").unwrap();
        assert_eq!(
            normalized.url,
            "https://docs.google.com/document/d/DOC42/export?format=docx"
        );
    }

    #[test]
    fn spreadsheet_link_exports_xlsx() {
        let normalized = drive("https://docs.google.com/spreadsheets/d/XYZ789/edit#gid=0").unwrap();
        assert_eq!(
            normalized.url,
            "https://docs.google.com/spreadsheets/d/XYZ789/export?format=xlsx"
        );
    }

    #[test]
    fn presentation_link_exports_pptx() {
        let normalized = drive("https://docs.google.com/presentation/d/P1/edit").unwrap();
        assert_eq!(
            normalized.url,
            "https://docs.google.com/presentation/d/P1/export?format=pptx"
        );
    }

    #[test]
    fn folder_link_passes_through() {
        let link = "https://drive.google.com/drive/folders/1AbCdEf?usp=sharing";
        let normalized = drive(link).unwrap();
        assert_eq!(normalized.url, link);
        assert_eq!(normalized.kind, LinkKind::DriveFolder);
    }

    #[test]
    fn account_scoped_folder_link_passes_through() {
        let link = "https://drive.google.com/drive/u/0/folders/1AbCdEf";
        assert_eq!(drive(link).unwrap().url, link);
    }

    #[test]
    fn direct_download_link_is_left_alone() {
        let link = "https://drive.google.com/uc?export=download&id=ABC123";
        let normalized = drive(link).unwrap();
        assert_eq!(normalized.url, link);
        assert_eq!(normalized.kind, LinkKind::DriveFile);
    }

    #[test]
    fn export_link_is_a_fixpoint() {
        let link = "https://docs.google.com/document/d/DOC42/export?format=docx";
        assert_eq!(drive(link).unwrap().url, link);
    }

    #[test]
    fn id_query_parameter_is_a_fallback() {
        let normalized = drive("https://docs.google.com/document/edit?id=QID9").unwrap();
        assert_eq!(
            normalized.url,
            "https://docs.google.com/document/d/QID9/export?format=docx"
        );
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(matches!(
            drive("https://drive.google.com/drive/my-drive"),
            Err(Error::MissingResourceId)
        ));
    }

    #[test]
    fn empty_id_parameter_is_rejected() {
        assert!(matches!(
            drive("https://drive.google.com/file?id="),
            Err(Error::MissingResourceId)
        ));
    }

    #[test]
    fn unknown_host_is_rejected() {
        assert!(matches!(
            drive("https://example.com/d/ABC123"),
            Err(Error::UnsupportedLinkFormat { .. })
        ));
    }

    #[test]
    fn unknown_docs_section_is_rejected() {
        assert!(matches!(
            drive("https://docs.google.com/forms/d/F1/viewform"),
            Err(Error::UnsupportedLinkFormat { .. })
        ));
    }

    #[test]
    fn relative_url_is_rejected() {
        assert!(matches!(drive("not-a-url"), Err(Error::MalformedUrl(_))));
        assert!(matches!(website("not-a-url"), Err(Error::MalformedUrl(_))));
    }

    #[test]
    fn blank_input_is_rejected() {
        assert!(matches!(drive(""), Err(Error::EmptyInput)));
        assert!(matches!(website("   "), Err(Error::EmptyInput)));
    }

    #[test]
    fn website_link_passes_through_verbatim() {
        // No trailing slash appears; the payload is exactly what was typed.
        let normalized = website("https://example.com").unwrap();
        assert_eq!(normalized.url, "https://example.com");
        assert_eq!(normalized.kind, LinkKind::Website);
    }

    #[test]
    fn website_link_is_trimmed() {
        assert_eq!(
            website("  https://example.com/file.pdf \n").unwrap().url,
            "https://example.com/file.pdf"
        );
    }

    #[test]
    fn kinds_expose_launch_actions() {
        assert_eq!(LinkKind::DriveFile.action(), "download");
        assert_eq!(LinkKind::DriveFolder.action(), "open");
        assert_eq!(LinkKind::Website.action(), "open");
    }

    #[test]
    fn modes_suggest_filenames() {
        assert_eq!(LinkMode::Drive.suggested_filename(), "qrlink-drive.png");
        assert_eq!(LinkMode::Website.suggested_filename(), "qrlink-website.png");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Share-link/direct-form template pairs, one per rewrite rule.
        const REWRITE_SHAPES: [(&str, &str); 4] = [
            (
                "https://drive.google.com/file/d/{}/view?usp=sharing",
                "https://drive.google.com/uc?export=download&id={}",
            ),
            (
                "https://docs.google.com/document/d/{}/edit",
                "https://docs.google.com/document/d/{}/export?format=docx",
            ),
            (
                "https://docs.google.com/spreadsheets/d/{}/edit#gid=0",
                "https://docs.google.com/spreadsheets/d/{}/export?format=xlsx",
            ),
            (
                "https://docs.google.com/presentation/d/{}/edit",
                "https://docs.google.com/presentation/d/{}/export?format=pptx",
            ),
        ];

        proptest! {
            #[test]
            fn ids_survive_every_rewrite(
                id in "[A-Za-z0-9_-]{1,64}",
                shape in 0..REWRITE_SHAPES.len(),
            ) {
                let (share, direct) = REWRITE_SHAPES[shape];
                let normalized = drive(&share.replace("{}", &id)).unwrap();
                prop_assert_eq!(normalized.url, direct.replace("{}", &id));
            }

            #[test]
            fn drive_normalization_is_idempotent(id in "[A-Za-z0-9_-]{1,64}") {
                let first = drive(&format!("https://drive.google.com/file/d/{id}/view")).unwrap();
                let second = drive(&first.url).unwrap();
                prop_assert_eq!(first.url, second.url);
            }

            #[test]
            fn website_links_are_untouched(path in "[a-z0-9/._-]{0,40}") {
                let link = format!("https://example.com/{path}");
                prop_assert_eq!(website(&link).unwrap().url, link);
            }
        }
    }
}
