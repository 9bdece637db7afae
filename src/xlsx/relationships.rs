//! `.rels` parts

use super::xml;

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub(crate) const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub(crate) const STYLES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    /// Type check by last path segment so transitional and strict namespaces both match
    pub fn is_type(&self, kind: &str) -> bool {
        self.rel_type.rsplit('/').next() == Some(kind)
    }
}

pub(crate) fn parse(rels_xml: &str) -> Vec<Relationship> {
    xml::find_all(rels_xml, "Relationship")
        .into_iter()
        .filter_map(|(start, end)| {
            let attrs = xml::attributes(&rels_xml[start..end]);
            let get = |key: &str| {
                attrs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            };
            Some(Relationship {
                id: get("Id")?,
                rel_type: get("Type").unwrap_or_default(),
                target: get("Target")?,
                external: get("TargetMode").as_deref() == Some("External"),
            })
        })
        .collect()
}

pub(crate) fn to_xml(rels: &[Relationship]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n");
    out.push_str(&format!(r#"<Relationships xmlns="{}">"#, RELATIONSHIPS_NS));
    for rel in rels {
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            xml::escape(&rel.id),
            xml::escape(&rel.rel_type),
            xml::escape(&rel.target)
        ));
        if rel.external {
            out.push_str(r#" TargetMode="External""#);
        }
        out.push_str("/>");
    }
    out.push_str("</Relationships>");
    out
}

/// First `rIdN` not already taken
pub(crate) fn next_id(rels: &[Relationship]) -> String {
    let max = rels
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}
