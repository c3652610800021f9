use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use base64::{Engine, engine::general_purpose::STANDARD};
use lol_html::html_content::TextType;
use lol_html::{RewriteStrSettings, doc_text, element, rewrite_str};

use crate::{
    document::ContentNode,
    error::{AltTextError, Result},
    types::ImageRef,
};

/// Linear content order and image elements of one markup part
#[derive(Debug, Clone, Default)]
pub(crate) struct MarkupIndex {
    pub nodes: Vec<ContentNode>,
    pub images: Vec<ImageRef>,
}

impl MarkupIndex {
    /// Record a new `alt` on every image with this `src`; returns how many matched
    pub fn set_alt(&mut self, source: &str, text: &str) -> usize {
        let mut updated = 0;
        for image in self.images.iter_mut().filter(|i| i.source() == Some(source)) {
            image.attributes.insert("alt".to_string(), text.to_string());
            updated += 1;
        }
        updated
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.images.iter().any(|i| i.source() == Some(source))
    }
}

/// Walk the markup once, collecting text nodes and `<img>` elements in document order
pub(crate) fn index_markup(markup: &str, part: usize) -> Result<MarkupIndex> {
    let nodes = RefCell::new(Vec::new());
    let images = RefCell::new(Vec::new());
    let pending = RefCell::new(String::new());

    let flush = || {
        let text = std::mem::take(&mut *pending.borrow_mut());
        if !text.is_empty() {
            nodes.borrow_mut().push(ContentNode::Text(decode_entities(&text)));
        }
    };

    rewrite_str(
        markup,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", |el| {
                flush();
                let attributes: BTreeMap<String, String> = el
                    .attributes()
                    .iter()
                    .map(|attr| (attr.name(), decode_entities(&attr.value())))
                    .collect();
                let mut nodes = nodes.borrow_mut();
                images
                    .borrow_mut()
                    .push(ImageRef::new(part, nodes.len(), attributes));
                nodes.push(ContentNode::Image);
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(|chunk| {
                // script and style bodies are not prose
                if matches!(chunk.text_type(), TextType::Data | TextType::RCData) {
                    pending.borrow_mut().push_str(chunk.as_str());
                }
                if chunk.last_in_text_node() {
                    flush();
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| AltTextError::Markup(e.to_string()))?;
    flush();

    Ok(MarkupIndex {
        nodes: nodes.into_inner(),
        images: images.into_inner(),
    })
}

/// Re-serialize markup with `alt` set on every `<img>` whose `src` has an entry in `alts`
pub(crate) fn apply_alts(markup: &str, alts: &HashMap<String, String>) -> Result<String> {
    if alts.is_empty() {
        return Ok(markup.to_string());
    }

    rewrite_str(
        markup,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img[src]", |el| {
                let alt = el
                    .get_attribute("src")
                    .and_then(|src| alts.get(&decode_entities(&src)));
                if let Some(alt) = alt {
                    el.set_attribute("alt", &escape_attribute(alt))?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| AltTextError::Markup(e.to_string()))
}

/// Escape an attribute value so XHTML parts stay well-formed.
/// The rewriter escapes double quotes itself.
fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decode numeric character references and the named entities common in
/// books (XML built-ins, typographic punctuation, Latin-1 accents).
///
/// Any other named entity is left as written.
pub(crate) fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &tail[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "shy" => Some('\u{ad}'),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                "lsquo" => Some('\u{2018}'),
                "rsquo" => Some('\u{2019}'),
                "ldquo" => Some('\u{201c}'),
                "rdquo" => Some('\u{201d}'),
                "laquo" => Some('\u{ab}'),
                "raquo" => Some('\u{bb}'),
                "hellip" => Some('\u{2026}'),
                "bull" => Some('\u{2022}'),
                "middot" => Some('\u{b7}'),
                "copy" => Some('\u{a9}'),
                "reg" => Some('\u{ae}'),
                "trade" => Some('\u{2122}'),
                "deg" => Some('\u{b0}'),
                "times" => Some('\u{d7}'),
                "sect" => Some('\u{a7}'),
                "para" => Some('\u{b6}'),
                _ => latin1_letter(entity),
            }
            .or_else(|| {
                entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32)
            });
            ch.map(|ch| (ch, end))
        });

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Accented Latin-1 letters such as `eacute` or `Ouml`
fn latin1_letter(entity: &str) -> Option<char> {
    const MARKS: [(&str, &str, &str); 6] = [
        ("grave", "AEIOU", "\u{c0}\u{c8}\u{cc}\u{d2}\u{d9}"),
        ("acute", "AEIOUY", "\u{c1}\u{c9}\u{cd}\u{d3}\u{da}\u{dd}"),
        ("circ", "AEIOU", "\u{c2}\u{ca}\u{ce}\u{d4}\u{db}"),
        ("tilde", "ANO", "\u{c3}\u{d1}\u{d5}"),
        ("uml", "AEIOU", "\u{c4}\u{cb}\u{cf}\u{d6}\u{dc}"),
        ("cedil", "C", "\u{c7}"),
    ];

    let mut chars = entity.chars();
    let letter = chars.next()?;
    let mark = chars.as_str();
    let (_, letters, accented) = MARKS.iter().find(|(name, _, _)| *name == mark)?;
    let i = letters.find(letter.to_ascii_uppercase())?;
    let upper = accented.chars().nth(i)?;
    if letter.is_ascii_uppercase() {
        Some(upper)
    } else {
        upper.to_lowercase().next()
    }
}

/// Where an `src` attribute points
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ImageLocation<'a> {
    Inline(Vec<u8>),
    Remote,
    Relative(&'a str),
}

pub(crate) fn locate(source: &str) -> Result<ImageLocation<'_>> {
    if let Some(data) = source.strip_prefix("data:") {
        let (meta, payload) = data
            .split_once(',')
            .ok_or_else(|| AltTextError::UnsupportedSource {
                src: truncate(source),
                reason: "malformed data URI".to_string(),
            })?;
        if !meta.ends_with(";base64") {
            return Ok(ImageLocation::Inline(payload.as_bytes().to_vec()));
        }
        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| AltTextError::UnsupportedSource {
                src: truncate(source),
                reason: format!("invalid base64 payload: {}", e),
            })?;
        return Ok(ImageLocation::Inline(bytes));
    }

    let lowered = source.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") || source.starts_with("//") {
        return Ok(ImageLocation::Remote);
    }

    let path = source
        .split(['#', '?'])
        .next()
        .unwrap_or(source);
    Ok(ImageLocation::Relative(path))
}

fn truncate(source: &str) -> String {
    source.chars().take(48).collect()
}
