use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    cmp::Ordering,
    collections::BTreeMap,
    sync::{Arc, OnceLock},
};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// A catalog row after ingestion. Well-known columns are lifted into typed
/// fields; everything else is kept verbatim in `extra`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub title: String,
    pub image: String,
    pub link: String,
    pub author: String,
    pub page: u32,
    pub status: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl AssetRecord {
    /// Returns `None` for rows where every field is blank.
    pub fn from_raw(raw: &Map<String, Value>) -> Option<Self> {
        let mut fields: BTreeMap<String, String> = raw
            .iter()
            .map(|(key, value)| (key.clone(), field_text(value)))
            .collect();

        if fields.values().all(|value| value.trim().is_empty()) {
            return None;
        }

        let page = raw.get("page").map(parse_page).unwrap_or(1);
        let title = take_trimmed(&mut fields, "title");
        let image = take_trimmed(&mut fields, "image");
        let link = take_trimmed(&mut fields, "link");
        let author = take_trimmed(&mut fields, "author");
        fields.remove("page");
        let status = match take_trimmed(&mut fields, "status") {
            status if status.is_empty() => take_trimmed(&mut fields, "type"),
            status => status,
        };

        Some(Self {
            title,
            image,
            link,
            author,
            page,
            status,
            extra: fields,
        })
    }

    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

fn take_trimmed(fields: &mut BTreeMap<String, String>, key: &str) -> String {
    fields
        .remove(key)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn parse_page(value: &Value) -> u32 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(page) if page.is_finite() && page >= 1.0 => page.trunc().min(u32::MAX as f64) as u32,
        _ => 1,
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Sheet,
    Alphabetical,
}

impl SortMode {
    pub const fn token(self) -> &'static str {
        match self {
            SortMode::Sheet => "sheet",
            SortMode::Alphabetical => "alphabetical",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "sheet" | "default" => Some(SortMode::Sheet),
            "alphabetical" | "alpha" | "az" => Some(SortMode::Alphabetical),
            _ => None,
        }
    }
}

impl std::fmt::Display for SortMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBadge {
    Featured,
    New,
    Fixed,
    Fix,
}

impl StatusBadge {
    pub fn label(self) -> &'static str {
        match self {
            StatusBadge::Featured => "Featured",
            StatusBadge::New => "New",
            StatusBadge::Fixed => "Fixed",
            StatusBadge::Fix => "Fix",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CardMarker {
    Fix,
    Soon,
}

/// Badges in display precedence order, followed by class-level markers.
pub fn status_decorations(status: &str) -> (Vec<StatusBadge>, Vec<CardMarker>) {
    let tokens: Vec<&str> = status
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '|' | '/' | ';'))
        .filter(|token| !token.is_empty())
        .collect();
    let has = |wanted: &str| tokens.iter().any(|token| token.eq_ignore_ascii_case(wanted));

    let badges = [
        ("featured", StatusBadge::Featured),
        ("new", StatusBadge::New),
        ("fixed", StatusBadge::Fixed),
        ("fix", StatusBadge::Fix),
    ]
    .into_iter()
    .filter(|(token, _)| has(*token))
    .map(|(_, badge)| badge)
    .collect();

    let markers = [("fix", CardMarker::Fix), ("soon", CardMarker::Soon)]
        .into_iter()
        .filter(|(token, _)| has(*token))
        .map(|(_, marker)| marker)
        .collect();

    (badges, markers)
}

/// Write-once holder for the probed image URL of a card.
#[derive(Clone, Debug, Default)]
pub struct ImageSlot(Arc<OnceLock<String>>);

impl ImageSlot {
    pub fn resolved(&self) -> Option<&str> {
        self.0.get().map(String::as_str)
    }

    /// Returns `false` when the slot was already resolved.
    pub(crate) fn resolve(&self, url: String) -> bool {
        self.0.set(url).is_ok()
    }
}

#[derive(Clone, Debug)]
pub struct AssetCard {
    pub title: String,
    pub key: String,
    pub author: String,
    pub image_candidate: String,
    pub image: ImageSlot,
    pub link: String,
    pub page: u32,
    pub status: String,
    pub badges: Vec<StatusBadge>,
    pub markers: Vec<CardMarker>,
    /// Favorite membership when the card was built. Later toggles only reach
    /// the surface; `Favorites` stays the source of truth.
    pub favorite: bool,
}

impl AssetCard {
    pub fn is_disabled(&self) -> bool {
        self.markers.contains(&CardMarker::Soon)
    }
}

/// Case-insensitive comparison that orders embedded digit runs numerically.
/// Accents are ignored first (`éclair` sorts with `eclair`) and only break
/// ties between otherwise equal titles.
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    compare_chars(folded(left), folded(right))
        .then_with(|| compare_chars(lowered(left), lowered(right)))
}

fn folded(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn lowered(text: &str) -> impl Iterator<Item = char> + '_ {
    text.nfd().flat_map(char::to_lowercase)
}

fn compare_chars(left: impl Iterator<Item = char>, right: impl Iterator<Item = char>) -> Ordering {
    let mut a = left.peekable();
    let mut b = right.peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = take_digits(&mut a);
                let rhs = take_digits(&mut b);
                let ordering = compare_digit_runs(&lhs, &rhs);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                a.next();
                b.next();
                if x != y {
                    return x.cmp(&y);
                }
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<impl Iterator<Item = char>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(left: &str, right: &str) -> Ordering {
    let lhs = left.trim_start_matches('0');
    let rhs = right.trim_start_matches('0');
    lhs.len()
        .cmp(&rhs.len())
        .then_with(|| lhs.cmp(rhs))
        .then_with(|| left.len().cmp(&right.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn blank_rows_are_dropped() {
        assert!(AssetRecord::from_raw(&raw(json!({"title": "  ", "image": "", "page": null}))).is_none());
        assert!(AssetRecord::from_raw(&raw(json!({}))).is_none());
    }

    #[test]
    fn single_non_blank_field_is_kept() {
        let record = AssetRecord::from_raw(&raw(json!({"title": "", "author": " bob "}))).unwrap();
        assert_eq!(record.author, "bob");
        assert_eq!(record.page, 1);
    }

    #[test]
    fn page_defaults_and_parses() {
        let page = |value: Value| {
            AssetRecord::from_raw(&raw(json!({"title": "x", "page": value})))
                .unwrap()
                .page
        };
        assert_eq!(page(json!(3)), 3);
        assert_eq!(page(json!("4")), 4);
        assert_eq!(page(json!(2.7)), 2);
        assert_eq!(page(json!("abc")), 1);
        assert_eq!(page(json!(0)), 1);
        assert_eq!(page(json!(-5)), 1);
    }

    #[test]
    fn status_falls_back_to_type_and_extras_are_kept() {
        let record =
            AssetRecord::from_raw(&raw(json!({"title": "x", "type": "New", "size": 12}))).unwrap();
        assert_eq!(record.status, "New");
        assert_eq!(record.extra.get("size").map(String::as_str), Some("12"));
        assert!(!record.extra.contains_key("type"));
    }

    #[test]
    fn decorations_are_token_based() {
        let (badges, markers) = status_decorations("featured, new");
        assert_eq!(badges, vec![StatusBadge::Featured, StatusBadge::New]);
        assert!(markers.is_empty());

        let (badges, markers) = status_decorations("fixed");
        assert_eq!(badges, vec![StatusBadge::Fixed]);
        assert!(markers.is_empty());

        let (badges, markers) = status_decorations("FIX");
        assert_eq!(badges, vec![StatusBadge::Fix]);
        assert_eq!(markers, vec![CardMarker::Fix]);

        let (badges, markers) = status_decorations("soon");
        assert!(badges.is_empty());
        assert_eq!(markers, vec![CardMarker::Soon]);
    }

    #[test]
    fn natural_order_is_numeric_and_case_insensitive() {
        assert_eq!(natural_cmp("item 2", "Item 10"), Ordering::Less);
        assert_eq!(natural_cmp("alpha", "Zed"), Ordering::Less);
        assert_eq!(natural_cmp("ABC", "abc"), Ordering::Equal);
        assert_eq!(natural_cmp("a", "ab"), Ordering::Less);
        assert_eq!(natural_cmp("v007", "v7"), Ordering::Greater);
    }

    #[test]
    fn accented_titles_sort_with_their_base_letters() {
        assert_eq!(natural_cmp("éclair", "zed"), Ordering::Less);
        assert_eq!(natural_cmp("Éclair", "eclairs"), Ordering::Less);
        assert_eq!(natural_cmp("eclair", "éclair"), Ordering::Less);
        assert_eq!(natural_cmp("ÉCLAIR", "éclair"), Ordering::Equal);
        assert_eq!(natural_cmp("café 10", "cafe 9"), Ordering::Greater);
    }

    #[test]
    fn image_slot_resolves_once() {
        let slot = ImageSlot::default();
        assert!(slot.resolve("a".into()));
        assert!(!slot.resolve("b".into()));
        assert_eq!(slot.resolved(), Some("a"));
    }

    #[test]
    fn sort_mode_tokens() {
        assert_eq!(SortMode::from_token(" Alphabetical "), Some(SortMode::Alphabetical));
        assert_eq!(SortMode::from_token("sheet"), Some(SortMode::Sheet));
        assert_eq!(SortMode::from_token("random"), None);
    }
}
