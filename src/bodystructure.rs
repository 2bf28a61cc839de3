//! `BODYSTRUCTURE` tree walking and part selection
//!
//! [`build_tree`] converts the borrowed `imap_proto::types::BodyStructure`
//! exposed by `async-imap`'s typed `Fetch::bodystructure()` into an owned
//! tree addressed by dotted IMAP part numbers (RFC 3501 §6.4.5 — children
//! of a multipart are `1`, `2`, … with dotted nesting; a single-part
//! message's body is part `1`). [`pick_best_text_parts`] then walks that
//! tree to choose which parts actually need a body fetch.

use imap_proto::types::{BodyContentCommon, BodyStructure, ContentDisposition};

/// One node of an owned MIME structure tree.
#[derive(Debug, Clone)]
pub struct BodyPart {
    /// Dotted part number (`"1"`, `"1.2"`); empty only for the synthetic
    /// root of a multipart message, which is never itself fetched.
    pub part_number: String,
    pub content_type: String,
    pub content_subtype: String,
    pub is_attachment: bool,
    pub filename: Option<String>,
    /// `Content-ID`, angle brackets stripped, for inline-`cid:` matching.
    pub content_id: Option<String>,
    /// Size in octets as reported by `BODYSTRUCTURE`; `0` for a multipart
    /// node, which has no body of its own.
    pub octets: u32,
    pub children: Vec<BodyPart>,
}

impl BodyPart {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Builds the owned part tree for one message's `BODYSTRUCTURE`.
pub fn build_tree(bs: &BodyStructure<'_>) -> BodyPart {
    match bs {
        BodyStructure::Multipart { .. } => build_node(bs, ""),
        _ => build_node(bs, "1"),
    }
}

fn build_node(bs: &BodyStructure<'_>, prefix: &str) -> BodyPart {
    match bs {
        BodyStructure::Multipart { common, bodies } => {
            let children = bodies
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let number = if prefix.is_empty() {
                        (i + 1).to_string()
                    } else {
                        format!("{prefix}.{}", i + 1)
                    };
                    build_node(child, &number)
                })
                .collect();
            BodyPart {
                part_number: prefix.to_owned(),
                content_type: "multipart".to_owned(),
                content_subtype: common.ty.subtype.to_string(),
                is_attachment: is_attachment(common.disposition.as_ref()),
                filename: filename_of(common),
                content_id: None,
                octets: 0,
                children,
            }
        }
        BodyStructure::Basic { common, other, .. }
        | BodyStructure::Text { common, other, .. }
        | BodyStructure::Message { common, other, .. } => BodyPart {
            part_number: prefix.to_owned(),
            content_type: common.ty.ty.to_string(),
            content_subtype: common.ty.subtype.to_string(),
            is_attachment: is_attachment(common.disposition.as_ref()),
            filename: filename_of(common),
            content_id: other
                .id
                .as_ref()
                .map(|id| id.trim_matches(['<', '>']).to_owned()),
            octets: other.octets,
            children: Vec::new(),
        },
    }
}

fn is_attachment(disposition: Option<&ContentDisposition<'_>>) -> bool {
    disposition
        .map(|d| d.ty.eq_ignore_ascii_case("attachment"))
        .unwrap_or(false)
}

fn filename_of(common: &BodyContentCommon<'_>) -> Option<String> {
    common
        .disposition
        .as_ref()
        .and_then(|d| d.params.iter().find(|(k, _)| k.eq_ignore_ascii_case("filename")))
        .or_else(|| {
            common
                .ty
                .params
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case("name"))
        })
        .map(|(_, v)| v.to_string())
}

/// The parts chosen by [`pick_best_text_parts`]: at most one plain-text
/// leaf, at most one HTML leaf, plus everything else that should surface
/// as an attachment.
pub struct SelectedParts<'a> {
    pub plain: Option<&'a BodyPart>,
    pub html: Option<&'a BodyPart>,
    pub attachments: Vec<&'a BodyPart>,
}

/// Prefers the first `text/plain` and first `text/html` leaf in
/// depth-first order, preferring leaves inside a `multipart/alternative`
/// subtree when one exists. Every other non-text leaf, or a text leaf
/// carrying `Content-Disposition: attachment` or a filename, is reported
/// as an attachment instead.
pub fn pick_best_text_parts(root: &BodyPart) -> SelectedParts<'_> {
    let alt_scope = find_first_alternative(root).unwrap_or(root);
    let plain = find_first_leaf(alt_scope, "text", "plain").or_else(|| find_first_leaf(root, "text", "plain"));
    let html = find_first_leaf(alt_scope, "text", "html").or_else(|| find_first_leaf(root, "text", "html"));

    let mut attachments = Vec::new();
    collect_attachments(root, plain, html, &mut attachments);

    SelectedParts {
        plain,
        html,
        attachments,
    }
}

fn find_first_alternative(node: &BodyPart) -> Option<&BodyPart> {
    if node.content_type.eq_ignore_ascii_case("multipart")
        && node.content_subtype.eq_ignore_ascii_case("alternative")
    {
        return Some(node);
    }
    node.children.iter().find_map(find_first_alternative)
}

fn find_first_leaf<'a>(node: &'a BodyPart, ty: &str, subtype: &str) -> Option<&'a BodyPart> {
    if node.is_leaf() {
        return (!node.is_attachment
            && node.content_type.eq_ignore_ascii_case(ty)
            && node.content_subtype.eq_ignore_ascii_case(subtype))
        .then_some(node);
    }
    node.children.iter().find_map(|c| find_first_leaf(c, ty, subtype))
}

fn collect_attachments<'a>(
    node: &'a BodyPart,
    plain: Option<&BodyPart>,
    html: Option<&BodyPart>,
    out: &mut Vec<&'a BodyPart>,
) {
    if !node.is_leaf() {
        for child in &node.children {
            collect_attachments(child, plain, html, out);
        }
        return;
    }

    let is_selected_text = plain.is_some_and(|p| p.part_number == node.part_number)
        || html.is_some_and(|h| h.part_number == node.part_number);
    if is_selected_text {
        return;
    }

    let is_text = node.content_type.eq_ignore_ascii_case("text");
    if node.is_attachment || node.filename.is_some() || !is_text {
        out.push(node);
    }
}
