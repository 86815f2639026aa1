use super::*;
use std::fs;
use tempfile::TempDir;

const SAMPLE_CSV: &str = r#"Release Year,Title,Origin/Ethnicity,Director,Cast,Genre,Wiki Page,Plot
1901,Kansas Saloon Smashers,American,Unknown,,unknown,https://en.wikipedia.org/wiki/Kansas_Saloon_Smashers,"A bartender is working at a saloon."
1996,Independence Day,American,Roland Emmerich,"Will Smith, Bill Pullman",science fiction,https://en.wikipedia.org/wiki/Independence_Day_(1996_film),"Aliens arrive.   Heroes
fight back.. The end."
1997,Bean,British,Mel Smith,Rowan Atkinson,comedy,https://en.wikipedia.org/wiki/Bean_(film),"Mr. Bean travels to America."
2003,Kal Ho Naa Ho,Bollywood,Nikhil Advani,Shah Rukh Khan,drama,https://en.wikipedia.org/wiki/Kal_Ho_Naa_Ho,"A love story in New York."
"#;

fn write_sample(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("wiki_movie_plots_deduped.csv");
    fs::write(&path, SAMPLE_CSV).expect("should write sample dataset");
    path
}

#[test]
fn normalize_collapses_whitespace_and_newlines() {
    assert_eq!(
        normalize_text("  Aliens   arrive.\n\nHeroes\tfight back.  "),
        "Aliens arrive. Heroes fight back."
    );
}

#[test]
fn normalize_removes_double_periods() {
    assert_eq!(normalize_text("The end.. Or is it"), "The end. Or is it");
    assert_eq!(normalize_text("Stop. . Go"), "Stop. Go");
}

#[test]
fn normalize_strips_dangling_commas() {
    // "x ," is removed along with the character before the space
    assert_eq!(normalize_text("He left [1] , then"), "He left [1 then");
}

#[test]
fn tokens_are_counted_with_cl100k() {
    assert_eq!(count_tokens(""), 0);
    assert_eq!(count_tokens("hello world"), 2);
    assert_eq!(count_tokens("tiktoken is great!"), 6);
}

#[test]
fn loaded_movies_carry_token_counts() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = write_sample(&dir);

    let movies = load_movies(&path).expect("dataset should load");
    for movie in &movies {
        assert_eq!(movie.n_tokens, count_tokens(&movie.plot));
    }
}

#[test]
fn load_assigns_ids_in_file_order() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = write_sample(&dir);

    let movies = load_movies(&path).expect("dataset should load");
    assert_eq!(movies.len(), 4);
    assert_eq!(movies[0].id, 0);
    assert_eq!(movies[1].id, 1);
    assert_eq!(movies[1].title, "Independence Day");
    assert_eq!(movies[1].year, 1996);
    assert_eq!(movies[1].origin, "American");
    assert_eq!(movies[1].cast, "Will Smith, Bill Pullman");
}

#[test]
fn load_missing_file_mentions_download_location() {
    let dir = TempDir::new().expect("should create TempDir");
    let err = load_movies(&dir.path().join("missing.csv")).expect_err("should fail");
    let message = err.to_string();
    assert!(message.contains("missing.csv"));
    assert!(message.contains(DATASET_SOURCE_URL));
}

#[test]
fn filter_keeps_recent_english_language_movies() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = write_sample(&dir);
    let movies = load_movies(&path).expect("dataset should load");

    let filtered = filter_movies(movies, &DatasetConfig::default());
    let titles: Vec<&str> = filtered.iter().map(|m| m.title.as_str()).collect();

    assert_eq!(titles, vec!["Independence Day", "Bean"]);
    // ids survive filtering
    assert_eq!(filtered[0].id, 1);
    assert_eq!(filtered[1].id, 2);
    assert_eq!(filtered[0].plot, "Aliens arrive. Heroes fight back. The end.");
}

#[test]
fn filter_year_bound_is_exclusive() {
    let movie = MovieRecord {
        id: 0,
        title: "Boundary".to_string(),
        director: String::new(),
        cast: String::new(),
        genre: "drama".to_string(),
        wiki_page: String::new(),
        plot: "Something happens.".to_string(),
        year: 1970,
        origin: "American".to_string(),
        n_tokens: 0,
    };
    let later = MovieRecord {
        year: 1971,
        ..movie.clone()
    };

    let filtered = filter_movies(vec![movie, later], &DatasetConfig::default());
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].year, 1971);
}

#[test]
fn filter_drops_plots_at_token_limit() {
    let config = DatasetConfig {
        max_tokens: 5,
        ..DatasetConfig::default()
    };
    let movie = MovieRecord {
        id: 0,
        title: "Wordy".to_string(),
        director: String::new(),
        cast: String::new(),
        genre: String::new(),
        wiki_page: String::new(),
        plot: "one two three four five six seven eight".to_string(),
        year: 2000,
        origin: "Canadian".to_string(),
        n_tokens: 0,
    };

    assert!(filter_movies(vec![movie], &config).is_empty());
}

#[test]
fn summary_totals_tokens() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = write_sample(&dir);
    let filtered = filter_movies(
        load_movies(&path).expect("dataset should load"),
        &DatasetConfig::default(),
    );

    let summary = summarize(&filtered);
    assert_eq!(summary.movies, 2);
    assert_eq!(
        summary.total_tokens,
        filtered[0].n_tokens + filtered[1].n_tokens
    );
}

#[test]
fn export_writes_snake_case_headers_and_quotes_text() {
    let dir = TempDir::new().expect("should create TempDir");
    let path = write_sample(&dir);
    let filtered = filter_movies(
        load_movies(&path).expect("dataset should load"),
        &DatasetConfig::default(),
    );

    let export_path = dir.path().join("movie_list.csv");
    export_movie_list(&filtered, &export_path).expect("export should succeed");

    let content = fs::read_to_string(&export_path).expect("should read export");
    let mut lines = content.lines();
    assert_eq!(
        lines.next(),
        Some(r#""id","title","director","cast","genre","wiki_page","plot","year","origin","n_tokens""#)
    );
    let first = lines.next().expect("should have a data row");
    assert!(first.starts_with(r#"1,"Independence Day","Roland Emmerich""#));
    assert!(first.contains(r#","American","#));
}

#[test]
fn export_doubles_embedded_quotes() {
    let dir = TempDir::new().expect("should create TempDir");
    let movie = MovieRecord {
        id: 1,
        title: "Quoted".to_string(),
        director: String::new(),
        cast: String::new(),
        genre: "drama".to_string(),
        wiki_page: String::new(),
        plot: r#"He said "hi" back"#.to_string(),
        year: 1999,
        origin: "American".to_string(),
        n_tokens: 5,
    };

    let export_path = dir.path().join("movie_list.csv");
    export_movie_list(std::slice::from_ref(&movie), &export_path).expect("export should succeed");

    let content = fs::read_to_string(&export_path).expect("should read export");
    assert!(content.contains(r#""He said ""hi"" back""#), "{}", content);

    let mut reader = csv::Reader::from_path(&export_path).expect("export should open");
    let read_back: Vec<MovieRecord> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .expect("export should parse");
    assert_eq!(read_back, vec![movie]);
}
