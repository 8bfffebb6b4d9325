//! Two-letter classification codes attached to skills and buff filters.
//!
//! Classification strings such as `"NoFu"` are parsed once at load time into
//! an ordered [TagSet]; the order is kept because damage breakdowns credit
//! categories in declaration order.

use std::fmt;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Normal,
    Heavy,
    Skill,
    Liberation,
    Physical,
    Glacio,
    Fusion,
    Electro,
    Aero,
    Spectro,
    Havoc,
    Echo,
    Intro,
    Outro,
    /// Scales from Defense instead of Attack.
    DefenseScaling,
    /// Scales from Health instead of Attack.
    HealthScaling,
    Heal,
    /// Any other two-letter code; kept so string matching still works.
    Other([u8; 2]),
}

const CODE_TABLE: [(&str, Tag); 17] = [
    ("No", Tag::Normal),
    ("He", Tag::Heavy),
    ("Sk", Tag::Skill),
    ("Rl", Tag::Liberation),
    ("Ph", Tag::Physical),
    ("Gl", Tag::Glacio),
    ("Fu", Tag::Fusion),
    ("El", Tag::Electro),
    ("Ae", Tag::Aero),
    ("Sp", Tag::Spectro),
    ("Ha", Tag::Havoc),
    ("Ec", Tag::Echo),
    ("In", Tag::Intro),
    ("Ou", Tag::Outro),
    ("Df", Tag::DefenseScaling),
    ("Hp", Tag::HealthScaling),
    ("Hl", Tag::Heal),
];

impl Tag {
    /// Parses one two-letter code. Returns `None` unless `code` is exactly two
    /// ASCII letters.
    pub fn from_code(code: &str) -> Option<Tag> {
        let bytes = code.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return None;
        }
        let known = CODE_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == code)
            .map(|(_, tag)| *tag);
        Some(known.unwrap_or(Tag::Other([bytes[0], bytes[1]])))
    }

    pub fn code(self) -> String {
        match self {
            Tag::Other(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            tag => CODE_TABLE
                .iter()
                .find(|(_, candidate)| *candidate == tag)
                .map(|(code, _)| (*code).to_string())
                .unwrap_or_default(),
        }
    }

    /// Readable category name (`Fu` -> `Fusion`), or the raw code when the
    /// tag has no category meaning.
    pub fn category_name(self) -> String {
        match self {
            Tag::Normal => "Normal".into(),
            Tag::Heavy => "Heavy".into(),
            Tag::Skill => "Skill".into(),
            Tag::Liberation => "Liberation".into(),
            Tag::Physical => "Physical".into(),
            Tag::Glacio => "Glacio".into(),
            Tag::Fusion => "Fusion".into(),
            Tag::Electro => "Electro".into(),
            Tag::Aero => "Aero".into(),
            Tag::Spectro => "Spectro".into(),
            Tag::Havoc => "Havoc".into(),
            Tag::Echo => "Echo".into(),
            Tag::Intro => "Intro".into(),
            Tag::Outro => "Outro".into(),
            other => other.code(),
        }
    }

    /// Inverse of [Tag::category_name] for the named categories.
    pub fn from_category_name(name: &str) -> Option<Tag> {
        CODE_TABLE
            .iter()
            .map(|(_, tag)| *tag)
            .find(|tag| tag.category_name() == name)
    }
}

/// Serialized as its two-letter code.
impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Translates a classification code to its category name, passing anything
/// else (skill names, multi-code lists) through unchanged.
pub fn translate_code(raw: &str) -> String {
    match Tag::from_code(raw) {
        Some(Tag::Other(_)) | None => raw.to_string(),
        Some(tag) => tag.category_name(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Parses a concatenation of two-letter codes (`"NoFuEc"`). Whitespace is
    /// ignored; an odd-length or non-alphabetic string is rejected.
    pub fn parse(raw: &str) -> Result<TagSet, String> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.len() % 2 != 0 {
            return Err(format!("classification '{raw}' has odd length"));
        }
        let mut tags = Vec::with_capacity(compact.len() / 2);
        let mut index = 0;
        while index < compact.len() {
            let code = compact
                .get(index..index + 2)
                .ok_or_else(|| format!("classification '{raw}' is not ASCII"))?;
            let tag = Tag::from_code(code)
                .ok_or_else(|| format!("invalid classification code '{code}' in '{raw}'"))?;
            tags.push(tag);
            index += 2;
        }
        Ok(TagSet { tags })
    }

    pub fn from_tags(tags: impl IntoIterator<Item = Tag>) -> TagSet {
        TagSet {
            tags: tags.into_iter().collect(),
        }
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    /// True when `code` is a valid two-letter code present in the set.
    pub fn contains_code(&self, code: &str) -> bool {
        Tag::from_code(code).is_some_and(|tag| self.contains(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tags.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn to_code_string(&self) -> String {
        self.tags.iter().map(|tag| tag.code()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_in_order() {
        let set = TagSet::parse("NoFuEc").unwrap();
        let tags: Vec<Tag> = set.iter().collect();
        assert_eq!(tags, vec![Tag::Normal, Tag::Fusion, Tag::Echo]);
        assert_eq!(set.to_code_string(), "NoFuEc");
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let set = TagSet::parse("XyRl").unwrap();
        assert!(set.contains_code("Xy"));
        assert!(set.contains(Tag::Liberation));
    }

    #[test]
    fn rejects_odd_length() {
        assert!(TagSet::parse("NoF").is_err());
        assert!(TagSet::parse("N1").is_err());
    }

    #[test]
    fn translate_passes_names_through() {
        assert_eq!(translate_code("Fu"), "Fusion");
        assert_eq!(translate_code("Forte Circuit"), "Forte Circuit");
        assert_eq!(Tag::from_category_name("Liberation"), Some(Tag::Liberation));
    }

    #[test]
    fn tags_serialize_as_codes() {
        assert_eq!(serde_json::to_string(&Tag::Fusion).unwrap(), "\"Fu\"");
        let other = Tag::from_code("Xy").unwrap();
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"Xy\"");
    }
}
