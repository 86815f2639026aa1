use super::schema::FieldKind;
use super::*;
use tempfile::TempDir;

fn movie(id: u32, title: &str, genre: &str) -> MovieRecord {
    MovieRecord {
        id,
        title: title.to_string(),
        director: "Jane Doe".to_string(),
        cast: "A. Actor, B. Actor".to_string(),
        genre: genre.to_string(),
        wiki_page: format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
        plot: format!("The plot of {}.", title),
        year: 1999,
        origin: "American".to_string(),
        n_tokens: 6,
    }
}

#[test]
fn document_uses_plot_as_content() {
    let record = movie(42, "The Matrix", "science fiction");
    let document = MovieDocument::from(&record);

    assert_eq!(document.page_content, "The plot of The Matrix.");
    assert_eq!(document.metadata.id, "42");
    assert_eq!(document.metadata.title, "The Matrix");
    assert_eq!(document.metadata.year, 1999);
    assert_eq!(document.metadata.genre, "science fiction");
}

#[test]
fn genre_filter_normalizes_term() {
    let filter = GenreFilter::new("  Comedy ");
    assert_eq!(filter.term(), "comedy");
    assert_eq!(filter.to_predicate(), "lower(genre) LIKE '%comedy%'");
}

#[test]
fn genre_filter_escapes_quotes_and_wildcards() {
    let filter = GenreFilter::new("rock'n%roll_");
    assert_eq!(filter.to_predicate(), "lower(genre) LIKE '%rock''nroll%'");
}

#[test]
fn schema_describes_movie_columns() {
    let schema = IndexSchema::for_movies("movieindex", 1536, 10);

    assert_eq!(schema.index_name, "movieindex");
    assert_eq!(schema.dimension, 1536);
    assert_eq!(schema.distance_metric, "cosine");
    assert_eq!(schema.vector_field, "vector");
    assert_eq!(schema.content_field, "content");
    assert!(
        schema
            .fields
            .iter()
            .any(|f| f.name == "genre" && f.kind == FieldKind::Text)
    );
    assert!(
        schema
            .fields
            .iter()
            .any(|f| f.name == "year" && f.kind == FieldKind::Numeric)
    );
}

#[test]
fn schema_round_trips_through_file() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = dir.path().join("nested").join("index_schema.toml");

    let schema = IndexSchema::for_movies("movieindex", 5, 3);
    schema.write(&path).expect("schema should be written");

    let loaded = IndexSchema::read(&path).expect("schema should be read");
    assert_eq!(loaded, schema);
}

#[test]
fn missing_schema_suggests_indexing() {
    let dir = TempDir::new().expect("should create TempDir");
    let err = IndexSchema::read(&dir.path().join("index_schema.toml"))
        .expect_err("missing schema should fail");
    assert!(err.to_string().contains("movie-chat index"), "{}", err);
}

#[test]
fn display_score_rounds_to_four_places() {
    let scored = ScoredDocument {
        document: MovieDocument::from(&movie(1, "Heat", "crime")),
        distance: 0.123_456,
        similarity_score: 0.876_544,
    };
    assert!((scored.display_score() - 0.8765).abs() < 1e-6);
}
