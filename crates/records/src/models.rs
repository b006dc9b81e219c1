// ABOUTME: Record types for extracted atlas cases: ClinicalRecord, ImageRef and RecordCollection.
// ABOUTME: Deserialization is permissive; missing or malformed fields load as empty values.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// One clinical image attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, alias = "altText", deserialize_with = "lenient::string")]
    pub alt: String,
    #[serde(default, alias = "figureLabel", deserialize_with = "lenient::string")]
    pub figure_label: String,
    #[serde(
        default,
        alias = "localPath",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub local_path: Option<String>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// One extracted case: a titled set of images with its credits and description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    #[serde(default, alias = "identity", deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub contributor: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub photographer: String,
    #[serde(default, alias = "sourceUrl", deserialize_with = "lenient::string")]
    pub source_url: String,
    #[serde(default, deserialize_with = "lenient::images")]
    pub images: Vec<ImageRef>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub keywords: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub year: String,
}

impl ClinicalRecord {
    /// A record with no images and no description carries nothing worth studying.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.description.trim().is_empty()
    }

    /// Appends an image unless one with the same URL is already attached.
    ///
    /// Returns true when the image was added.
    pub fn push_image(&mut self, image: ImageRef) -> bool {
        if self.images.iter().any(|i| i.url == image.url) {
            return false;
        }
        self.images.push(image);
        true
    }

    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|i| i.url.as_str())
    }
}

/// The ordered set of records making up one persisted collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordCollection {
    records: Vec<ClinicalRecord>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a collection as loaded from disk; records are kept as given.
    pub fn from_records(records: Vec<ClinicalRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ClinicalRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClinicalRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ClinicalRecord> {
        self.records.iter_mut()
    }

    pub fn into_records(self) -> Vec<ClinicalRecord> {
        self.records
    }

    pub fn find(&self, id: &str) -> Option<&ClinicalRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// True when any record was extracted from `url`.
    pub fn contains_source(&self, url: &str) -> bool {
        self.records.iter().any(|r| r.source_url == url)
    }

    pub fn identities(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Appends a record. Callers are responsible for identity uniqueness;
    /// the assembler in `eyeatlas-extract` decides skip vs. suffix.
    pub fn push(&mut self, record: ClinicalRecord) {
        self.records.push(record);
    }

    /// Category labels present, in enumeration order with the sentinel last.
    pub fn categories(&self) -> Vec<Category> {
        let present: HashSet<Category> = self.records.iter().map(|r| r.category).collect();
        Category::ALL
            .into_iter()
            .chain(std::iter::once(Category::Uncategorized))
            .filter(|c| present.contains(c))
            .collect()
    }

    pub fn filter_category(&self, category: Category) -> Vec<&ClinicalRecord> {
        self.records
            .iter()
            .filter(|r| r.category == category)
            .collect()
    }

    pub fn image_count(&self) -> usize {
        self.records.iter().map(|r| r.images.len()).sum()
    }
}

impl IntoIterator for RecordCollection {
    type Item = ClinicalRecord;
    type IntoIter = std::vec::IntoIter<ClinicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordCollection {
    type Item = &'a ClinicalRecord;
    type IntoIter = std::slice::Iter<'a, ClinicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl FromIterator<ClinicalRecord> for RecordCollection {
    fn from_iter<I: IntoIterator<Item = ClinicalRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Field deserializers that never fail on odd upstream data.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::ImageRef;

    fn value_to_string(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(value_to_string(Value::deserialize(d)?))
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let s = value_to_string(Value::deserialize(d)?);
        Ok(if s.is_empty() { None } else { Some(s) })
    }

    /// Accepts image objects or bare URL/path strings; anything else is dropped.
    pub fn images<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ImageRef>, D::Error> {
        let items = match Value::deserialize(d)? {
            Value::Array(items) => items,
            _ => return Ok(Vec::new()),
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) if !url.trim().is_empty() => Some(ImageRef::new(url)),
                obj @ Value::Object(_) => serde_json::from_value::<ImageRef>(obj).ok(),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, category: Category) -> ClinicalRecord {
        ClinicalRecord {
            id: id.to_string(),
            title: "Retinoblastoma".to_string(),
            category,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_empty() {
        let mut r = record("a_1", Category::Retina);
        assert!(r.is_empty());
        r.description = "   ".to_string();
        assert!(r.is_empty());
        r.push_image(ImageRef::new("https://eyerounds.org/a.jpg"));
        assert!(!r.is_empty());
    }

    #[test]
    fn test_push_image_dedupes_by_url() {
        let mut r = record("a_1", Category::Retina);
        assert!(r.push_image(ImageRef::new("https://eyerounds.org/a.jpg")));
        assert!(!r.push_image(ImageRef {
            url: "https://eyerounds.org/a.jpg".to_string(),
            alt: "other alt".to_string(),
            ..Default::default()
        }));
        assert_eq!(r.images.len(), 1);
        assert_eq!(r.images[0].alt, "");
    }

    #[test]
    fn test_categories_in_enumeration_order() {
        let c: RecordCollection = vec![
            record("a", Category::Uncategorized),
            record("b", Category::Retina),
            record("c", Category::Cataract),
            record("d", Category::Retina),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            c.categories(),
            vec![Category::Cataract, Category::Retina, Category::Uncategorized]
        );
        assert_eq!(c.filter_category(Category::Retina).len(), 2);
    }

    #[test]
    fn test_lenient_record_fields() {
        let json = r#"{
            "id": "apmppe_1",
            "title": null,
            "category": "Retina",
            "year": 2016,
            "images": ["https://eyerounds.org/x.jpg", {"url": "https://eyerounds.org/y.jpg", "figure_label": "Figure 2"}, 7]
        }"#;
        let r: ClinicalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.title, "");
        assert_eq!(r.category, Category::Retina);
        assert_eq!(r.year, "2016");
        assert_eq!(r.description, "");
        assert_eq!(
            r.image_urls().collect::<Vec<_>>(),
            vec!["https://eyerounds.org/x.jpg", "https://eyerounds.org/y.jpg"]
        );
        assert_eq!(r.images[1].figure_label, "Figure 2");
        assert_eq!(r.images[1].local_path, None);
    }

    #[test]
    fn test_local_path_omitted_when_absent() {
        let img = ImageRef::new("https://eyerounds.org/x.jpg");
        let json = serde_json::to_string(&img).unwrap();
        assert!(!json.contains("local_path"));
    }
}
