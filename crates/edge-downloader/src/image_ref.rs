//! Container-registry image reference grammar (spec §4.2):
//! `[registry[:port]/]path/to/image[:tag | @algo:hex]`.
//!
//! Rejects anything the grammar doesn't admit rather than guessing; a
//! malformed reference is a `MalformedImageReference`, not a downloader
//! failure, since it can never succeed on retry.

use crate::error::DownloaderError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageReferenceSuffix {
    Tag(String),
    Digest { algorithm: String, hex: String },
    None,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub path: String,
    pub suffix: ImageReferenceSuffix,
}

pub fn parse(reference: &str) -> Result<ImageReference, DownloaderError> {
    if reference.is_empty() {
        return Err(malformed(reference, "reference is empty"));
    }

    let (head, suffix) = split_suffix(reference)?;
    if head.is_empty() {
        return Err(malformed(reference, "path is empty"));
    }

    let mut segments: Vec<&str> = head.split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(malformed(reference, "empty path segment"));
    }

    let registry = if segments.len() > 1 && looks_like_registry(segments[0]) {
        Some(segments.remove(0).to_string())
    } else {
        None
    };

    if segments.is_empty() {
        return Err(malformed(reference, "path has no components after registry"));
    }
    for segment in &segments {
        if !is_valid_path_segment(segment) {
            return Err(malformed(reference, "path segment contains invalid characters"));
        }
    }

    Ok(ImageReference {
        registry,
        path: segments.join("/"),
        suffix,
    })
}

fn looks_like_registry(segment: &str) -> bool {
    segment == "localhost" || segment.contains('.') || segment.contains(':')
}

fn is_valid_path_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let mut chars = segment.chars();
    let Some(first) = chars.next() else { return false };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }
    segment
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        && !segment.ends_with(['.', '_', '-'])
}

fn split_suffix(reference: &str) -> Result<(&str, ImageReferenceSuffix), DownloaderError> {
    if let Some(at) = reference.rfind('@') {
        let (head, digest_part) = (&reference[..at], &reference[at + 1..]);
        let Some((algorithm, hex)) = digest_part.split_once(':') else {
            return Err(malformed(reference, "digest suffix must be algo:hex"));
        };
        if algorithm.is_empty() || !algorithm.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
            return Err(malformed(reference, "digest algorithm is malformed"));
        }
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed(reference, "digest hex is malformed"));
        }
        return Ok((
            head,
            ImageReferenceSuffix::Digest {
                algorithm: algorithm.to_string(),
                hex: hex.to_lowercase(),
            },
        ));
    }

    // A colon after the last `/` is a tag separator; a colon before it (as in
    // `registry:port/path`) was already consumed by registry detection on the
    // first path segment, so here we only look past the final slash.
    let last_slash = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
    if let Some(colon) = reference[last_slash..].find(':') {
        let tag_start = last_slash + colon + 1;
        let tag = &reference[tag_start..];
        if tag.is_empty() || tag.len() > 128 || !is_valid_tag(tag) {
            return Err(malformed(reference, "tag is malformed"));
        }
        return Ok((&reference[..last_slash + colon], ImageReferenceSuffix::Tag(tag.to_string())));
    }

    Ok((reference, ImageReferenceSuffix::None))
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else { return false };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return false;
    }
    tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn malformed(reference: &str, reason: &'static str) -> DownloaderError {
    DownloaderError::MalformedImageReference {
        reference: reference.to_string(),
        reason,
    }
}
