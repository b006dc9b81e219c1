// ABOUTME: Integration tests for collection persistence.
// ABOUTME: Covers save/load round trips in both formats and RecordStore lifecycle.

use eyeatlas_records::{
    load, save, save_as, Category, ClinicalRecord, Format, ImageRef, RecordCollection, RecordStore,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn sample_records() -> RecordCollection {
    vec![
        ClinicalRecord {
            id: "choroidal-hemangioma-circumscribed_1".to_string(),
            title: "Choroidal Hemangioma (Circumscribed)".to_string(),
            category: Category::Retina,
            description: "These photographs show an orange choroidal mass.".to_string(),
            contributor: "Jordan Graff, MD".to_string(),
            photographer: "Brice Critser, CRA".to_string(),
            source_url: "https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/choroidal-hemangioma-circumscribed/index.htm".to_string(),
            images: vec![
                ImageRef {
                    url: "https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/choroidal-hemangioma-circumscribed/1.jpg".to_string(),
                    alt: "fundus".to_string(),
                    figure_label: "Figure 1a".to_string(),
                    local_path: Some("data/images/retina/x_Figure1a.jpg".to_string()),
                },
                ImageRef::new("https://webeye.ophth.uiowa.edu/eyeforum/atlas/pages/choroidal-hemangioma-circumscribed/2.jpg"),
            ],
            keywords: "hemangioma".to_string(),
            year: "2014".to_string(),
        },
        ClinicalRecord {
            id: "trabeculectomy_1".to_string(),
            title: "Trabeculectomy".to_string(),
            category: Category::Glaucoma,
            description: "This patient underwent trabeculectomy with mitomycin C.".to_string(),
            source_url: "https://eyerounds.org/atlas/pages/trabeculectomy.htm".to_string(),
            images: vec![ImageRef::new("https://eyerounds.org/atlas/pages/trab.jpg")],
            ..Default::default()
        },
    ]
    .into_iter()
    .collect()
}

#[test]
fn current_format_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("all_flashcards.json");
    let records = sample_records();

    save(&records, &path).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded, records);
}

#[test]
fn legacy_format_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flashcards.json");
    let records = sample_records();

    save_as(&records, &path, Format::Legacy).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded, records);
    assert_eq!(loaded.records()[0].photographer, "Brice Critser, CRA");
    assert_eq!(loaded.records()[0].keywords, "hemangioma");
    assert_eq!(loaded.records()[0].year, "2014");
}

#[test]
fn loads_hand_written_legacy_cards() {
    let json = r#"[
      {
        "id": "Retinoblastoma_entry0",
        "title": "Retinoblastoma",
        "entry_index": 0,
        "images": ["data/images/entry0_figFigure1.jpg", "data/images/entry0_img1.jpg"],
        "answer": "Contributor: Jane Doe, MD\n\nLeukocoria is the most common presenting sign.\n\n\n\nSource: https://eyerounds.org/atlas/pages/retinoblastoma/index.htm",
        "contributor": "Jane Doe, MD",
        "url": "https://eyerounds.org/atlas/pages/retinoblastoma/index.htm",
        "category": "RETINA",
        "is_dup": true
      }
    ]"#;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flashcards.json");
    std::fs::write(&path, json).unwrap();

    let loaded = load(&path).unwrap();
    let card = &loaded.records()[0];
    assert_eq!(card.description, "Leukocoria is the most common presenting sign.");
    assert_eq!(card.source_url, "https://eyerounds.org/atlas/pages/retinoblastoma/index.htm");
    assert_eq!(card.images.len(), 2);
    assert_eq!(card.images[0].url, "data/images/entry0_figFigure1.jpg");
    assert_eq!(card.contributor, "Jane Doe, MD");
    assert_eq!(card.photographer, "");
    assert_eq!(card.keywords, "");
}

#[test]
fn legacy_cards_without_credit_fields_take_them_from_the_answer() {
    let json = r#"[
      {
        "id": "coats_entry0",
        "title": "Coats Disease",
        "answer": "Contributor: Jane Doe, MD\n\nPhotographers: Brice Critser, CRA\n\nTelangiectatic vessels with exudate.",
        "url": "https://eyerounds.org/atlas/pages/coats/index.htm",
        "category": "RETINA"
      }
    ]"#;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("flashcards.json");
    std::fs::write(&path, json).unwrap();

    let loaded = load(&path).unwrap();
    let card = &loaded.records()[0];
    assert_eq!(card.contributor, "Jane Doe, MD");
    assert_eq!(card.photographer, "Brice Critser, CRA");
    assert_eq!(card.description, "Telangiectatic vessels with exudate.");
    assert_eq!(card.year, "");
}

#[test]
fn store_opens_missing_file_empty_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("all_flashcards.json");

    let mut store = RecordStore::open(&path).unwrap();
    assert!(store.collection().is_empty());

    for r in sample_records() {
        store.collection_mut().push(r);
    }
    store.save().unwrap();

    let reopened = RecordStore::open(&path).unwrap();
    assert_eq!(reopened.collection().len(), 2);
    assert!(reopened
        .collection()
        .contains_source("https://eyerounds.org/atlas/pages/trabeculectomy.htm"));
    assert_eq!(
        reopened.collection().categories(),
        vec![Category::Glaucoma, Category::Retina]
    );
}

#[test]
fn store_open_fails_on_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{\"flashcards\": 12}").unwrap();
    assert!(RecordStore::open(&path).is_err());
}
