use std::sync::Mutex;

use epub2md::html::parse_html;
use epub2md::{ChapterDocument, ConversionInput, ConversionOptions, Metadata, Pipeline};
use log::{Level, LevelFilter, Log, Record};

static RECORDS: Mutex<Vec<(Level, String, String)>> = Mutex::new(Vec::new());

struct Recorder;

impl Log for Recorder {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        if let Ok(mut records) = RECORDS.lock() {
            records.push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ));
        }
    }

    fn flush(&self) {}
}

static RECORDER: Recorder = Recorder;

#[test]
fn test_render_warnings_are_returned_not_logged_as_warnings() {
    log::set_logger(&RECORDER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let chapter = ChapterDocument::new("ch1", 0, parse_html(r#"<p><img src="missing.png"/></p>"#));
    let input = ConversionInput::new(vec![chapter], Metadata::default());
    let result = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap();
    assert_eq!(result.warnings.len(), 1);

    let records = RECORDS.lock().unwrap();
    let about_missing: Vec<_> = records
        .iter()
        .filter(|(_, target, message)| target.starts_with("epub2md") && message.contains("missing.png"))
        .collect();
    assert!(!about_missing.is_empty());
    assert!(
        about_missing.iter().all(|(level, _, _)| *level == Level::Debug),
        "{about_missing:?}"
    );
}
