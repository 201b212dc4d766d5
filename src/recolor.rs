use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::color::{Rgba, try_resolve};
use crate::error::{FolioError, FolioResult};

/// Tags treated as paintable even without explicit paint attributes; an
/// untagged shape's default fill is black.
const SHAPE_TAGS: [&str; 3] = ["path", "rect", "circle"];

/// Rewrite the paint colors of `markup` according to `replacements`.
///
/// Replacement keys are matched against each paintable element's effective
/// fill and stroke by canonical RGBA equality, so `red`, `#f00` and
/// `rgb(255,0,0)` all name the same key. On a match the matching attribute
/// is overwritten with the replacement string exactly as supplied.
///
/// Elements nested under `<defs>` are templates, not rendered content, and
/// are left untouched. An empty replacement map returns markup with the
/// same paint colors as the input.
pub fn recolor(markup: &str, replacements: &BTreeMap<String, String>) -> FolioResult<String> {
    // Keys that do not resolve to a color can never match; drop them once.
    let canonical: Vec<(Rgba, &str)> = replacements
        .iter()
        .filter_map(|(key, target)| try_resolve(key).map(|rgba| (rgba, target.as_str())))
        .collect();

    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(false);

    let mut out: Vec<u8> = Vec::with_capacity(markup.len());
    let mut writer = quick_xml::Writer::new(&mut out);
    let mut defs_depth: u32 = 0;
    let mut saw_element = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| FolioError::markup(format!("invalid svg markup: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(e) => {
                saw_element = true;
                let is_defs = e.local_name().as_ref() == b"defs";
                let rewritten = if defs_depth == 0 && !is_defs {
                    rewrite_element(&e, &canonical)?
                } else {
                    None
                };
                if is_defs {
                    defs_depth += 1;
                }
                let event = match rewritten {
                    Some(modified) => Event::Start(modified),
                    None => Event::Start(e),
                };
                writer
                    .write_event(event)
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("serialize svg markup: {e}")))?;
            }
            Event::Empty(e) => {
                saw_element = true;
                let rewritten = if defs_depth == 0 && e.local_name().as_ref() != b"defs" {
                    rewrite_element(&e, &canonical)?
                } else {
                    None
                };
                let event = match rewritten {
                    Some(modified) => Event::Empty(modified),
                    None => Event::Empty(e),
                };
                writer
                    .write_event(event)
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("serialize svg markup: {e}")))?;
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"defs" {
                    defs_depth = defs_depth.saturating_sub(1);
                }
                writer
                    .write_event(Event::End(e))
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("serialize svg markup: {e}")))?;
            }
            other => {
                writer
                    .write_event(other)
                    .map_err(|e| FolioError::Other(anyhow::anyhow!("serialize svg markup: {e}")))?;
            }
        }
    }

    if !saw_element {
        return Err(FolioError::markup("markup contains no elements"));
    }

    String::from_utf8(out).map_err(|e| FolioError::markup(format!("non-utf8 output: {e}")))
}

/// Effective paint of one element: attribute wins over inline style; with
/// neither, the fill defaults to black (legacy behavior for untagged
/// shapes). `none` values are not paint.
#[derive(Debug, Default, PartialEq)]
struct EffectivePaint {
    fill: Option<String>,
    stroke: Option<String>,
}

fn effective_paint(attrs: &[(String, String)], tag_is_shape: bool) -> EffectivePaint {
    let attr_of = |name: &str| {
        attrs
            .iter()
            .find(|(k, _)| local_attr_name(k) == name)
            .map(|(_, v)| v.trim().to_string())
    };
    let style = attr_of("style").unwrap_or_default();

    let mut paint = EffectivePaint::default();

    match attr_of("fill") {
        Some(v) if v != "none" => {
            paint.fill = Some(v);
        }
        _ => {
            if let Some(v) = style_declaration(&style, "fill")
                && v != "none"
            {
                paint.fill = Some(v.to_string());
            }
        }
    }

    match attr_of("stroke") {
        Some(v) if v != "none" => {
            paint.stroke = Some(v);
        }
        _ => {
            if let Some(v) = style_declaration(&style, "stroke")
                && v != "none"
            {
                paint.stroke = Some(v.to_string());
            }
        }
    }

    if paint.fill.is_none() && paint.stroke.is_none() && tag_is_shape {
        paint.fill = Some("black".to_string());
    }

    paint
}

/// Returns a rewritten start tag when any replacement applies, `None` for
/// passthrough.
fn rewrite_element(
    element: &BytesStart<'_>,
    canonical: &[(Rgba, &str)],
) -> FolioResult<Option<BytesStart<'static>>> {
    if canonical.is_empty() {
        return Ok(None);
    }

    let local = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
    let tag_is_shape = SHAPE_TAGS.contains(&local.as_str());

    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| FolioError::markup(format!("bad attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| FolioError::markup(format!("bad attribute value: {e}")))?
            .into_owned();
        attrs.push((key, value));
    }

    let has_attr_paint = attrs.iter().any(|(k, v)| {
        matches!(local_attr_name(k), "fill" | "stroke") && v.trim() != "none"
    });
    let has_style_paint = attrs
        .iter()
        .find(|(k, _)| local_attr_name(k) == "style")
        .is_some_and(|(_, style)| {
            style_declaration(style, "fill").is_some_and(|v| v != "none")
                || style_declaration(style, "stroke").is_some_and(|v| v != "none")
        });
    if !has_attr_paint && !has_style_paint && !tag_is_shape {
        return Ok(None);
    }

    let paint = effective_paint(&attrs, tag_is_shape);

    let match_for = |color: &Option<String>| -> Option<String> {
        let rgba = color.as_deref().and_then(try_resolve)?;
        canonical
            .iter()
            .find(|(key, _)| *key == rgba)
            .map(|(_, target)| (*target).to_string())
    };
    let new_fill = match_for(&paint.fill);
    let new_stroke = match_for(&paint.stroke);

    if new_fill.is_none() && new_stroke.is_none() {
        return Ok(None);
    }

    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    let mut wrote_fill = false;
    let mut wrote_stroke = false;

    for (key, value) in &attrs {
        match local_attr_name(key) {
            "fill" if new_fill.is_some() => {
                rebuilt.push_attribute((key.as_str(), new_fill.as_deref().unwrap_or_default()));
                wrote_fill = true;
            }
            "stroke" if new_stroke.is_some() => {
                rebuilt.push_attribute((key.as_str(), new_stroke.as_deref().unwrap_or_default()));
                wrote_stroke = true;
            }
            "style" => {
                // Keep the style text consistent with the rewritten paint
                // so the attribute value is not overridden by it.
                let mut style = value.clone();
                if let Some(fill) = &new_fill {
                    style = rewrite_style(&style, "fill", fill);
                }
                if let Some(stroke) = &new_stroke {
                    style = rewrite_style(&style, "stroke", stroke);
                }
                rebuilt.push_attribute((key.as_str(), style.as_str()));
            }
            _ => rebuilt.push_attribute((key.as_str(), value.as_str())),
        }
    }

    if let Some(fill) = &new_fill
        && !wrote_fill
        && !style_mentions(&attrs, "fill")
    {
        rebuilt.push_attribute(("fill", fill.as_str()));
    }
    if let Some(stroke) = &new_stroke
        && !wrote_stroke
        && !style_mentions(&attrs, "stroke")
    {
        rebuilt.push_attribute(("stroke", stroke.as_str()));
    }

    Ok(Some(rebuilt))
}

fn style_mentions(attrs: &[(String, String)], prop: &str) -> bool {
    attrs
        .iter()
        .find(|(k, _)| local_attr_name(k) == "style")
        .is_some_and(|(_, style)| style_declaration(style, prop).is_some())
}

fn local_attr_name(key: &str) -> &str {
    key.rsplit(':').next().unwrap_or(key)
}

/// Value of a `prop: value` declaration inside an inline style string.
fn style_declaration<'a>(style: &'a str, prop: &str) -> Option<&'a str> {
    for decl in style.split(';') {
        let mut parts = decl.splitn(2, ':');
        let name = parts.next()?.trim();
        if name.eq_ignore_ascii_case(prop) {
            let value = parts.next()?.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value);
        }
    }
    None
}

fn rewrite_style(style: &str, prop: &str, new_value: &str) -> String {
    let mut rewritten: Vec<String> = Vec::new();
    for decl in style.split(';') {
        if decl.trim().is_empty() {
            continue;
        }
        let mut parts = decl.splitn(2, ':');
        let name = parts.next().unwrap_or("").trim();
        if name.eq_ignore_ascii_case(prop) && parts.next().is_some() {
            rewritten.push(format!("{name}:{new_value}"));
        } else {
            rewritten.push(decl.trim().to_string());
        }
    }
    rewritten.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacements(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn key_and_attribute_match_across_string_forms() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="rgb(255,0,0)"/></svg>"#;
        let out = recolor(markup, &replacements(&[("red", "#00ff00")])).unwrap();
        assert!(out.contains(r##"fill="#00ff00""##), "got: {out}");
        assert!(!out.contains("rgb(255,0,0)"));
    }

    #[test]
    fn empty_replacement_map_is_identity_on_paint() {
        let markup =
            r##"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="#aabbcc" stroke="blue"/></svg>"##;
        let out = recolor(markup, &BTreeMap::new()).unwrap();
        assert!(out.contains(r##"fill="#aabbcc""##));
        assert!(out.contains(r#"stroke="blue""#));
    }

    #[test]
    fn defs_subtrees_are_excluded() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><defs><rect fill="red"/></defs><rect fill="red"/></svg>"#;
        let out = recolor(markup, &replacements(&[("red", "green")])).unwrap();
        let in_defs = out.split("</defs>").next().unwrap();
        let after_defs = out.split("</defs>").nth(1).unwrap();
        assert!(in_defs.contains(r#"fill="red""#));
        assert!(after_defs.contains(r#"fill="green""#));
    }

    #[test]
    fn untagged_shape_defaults_to_black_fill() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><path d="M0 0h10v10z"/></svg>"#;
        let out = recolor(markup, &replacements(&[("#000000", "#123456")])).unwrap();
        assert!(out.contains(r##"fill="#123456""##), "got: {out}");
    }

    #[test]
    fn attribute_takes_precedence_over_style() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="blue" style="fill:red"/></svg>"#;
        let out = recolor(markup, &replacements(&[("red", "green")])).unwrap();
        // Effective fill is the attribute (blue); the style-only red must
        // not trigger a replacement.
        assert!(out.contains(r#"fill="blue""#), "got: {out}");
    }

    #[test]
    fn style_only_paint_is_matched_and_rewritten() {
        let markup =
            r#"<svg xmlns="http://www.w3.org/2000/svg"><rect style="fill:#ff0000;opacity:0.5"/></svg>"#;
        let out = recolor(markup, &replacements(&[("red", "#00ff00")])).unwrap();
        assert!(out.contains("fill:#00ff00"), "got: {out}");
        assert!(out.contains("opacity:0.5"), "got: {out}");
    }

    #[test]
    fn stroke_matches_independently_of_fill() {
        let markup = r##"<svg xmlns="http://www.w3.org/2000/svg"><circle r="5" fill="white" stroke="#ff0000"/></svg>"##;
        let out = recolor(markup, &replacements(&[("red", "black")])).unwrap();
        assert!(out.contains(r#"stroke="black""#));
        assert!(out.contains(r#"fill="white""#));
    }

    #[test]
    fn none_paint_never_matches() {
        let markup =
            r#"<svg xmlns="http://www.w3.org/2000/svg"><g fill="none"><rect fill="red"/></g></svg>"#;
        let out = recolor(markup, &replacements(&[("none", "#112233"), ("red", "green")])).unwrap();
        assert!(out.contains(r#"fill="none""#));
        assert!(out.contains(r#"fill="green""#));
    }

    #[test]
    fn non_paintable_elements_pass_through() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><title>x</title><rect fill="red"/></svg>"#;
        let out = recolor(markup, &replacements(&[("red", "green")])).unwrap();
        assert!(out.contains("<title>x</title>"));
    }

    #[test]
    fn malformed_markup_is_a_parse_error() {
        let err = recolor("<svg><rect", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, FolioError::MarkupParseFailed(_)));
    }

    #[test]
    fn unparseable_replacement_keys_are_ignored() {
        let markup = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect fill="red"/></svg>"#;
        let out = recolor(markup, &replacements(&[("bogus-color", "green")])).unwrap();
        assert!(out.contains(r#"fill="red""#));
    }
}
