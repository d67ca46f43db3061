use epub2md::html::parse_html;
use epub2md::{
    AssetSet, CancellationToken, ChapterDocument, ChapterProgress, ConversionInput,
    ConversionOptions, Error, MediaAsset, Metadata, OutlineEntry, Pipeline, RenderWarning,
};
use tempfile::TempDir;

fn chapters(pages: &[(&str, &str)]) -> Vec<ChapterDocument> {
    pages
        .iter()
        .enumerate()
        .map(|(order, (id, html))| {
            ChapterDocument::new(*id, order, parse_html(html))
                .with_href(format!("OEBPS/Text/{id}.xhtml"))
        })
        .collect()
}

fn convert(html: &str) -> String {
    let input = ConversionInput::new(chapters(&[("ch1", html)]), Metadata::default());
    Pipeline::new(ConversionOptions::new().with_generate_toc(false))
        .convert(&input)
        .expect("conversion failed")
        .markdown
}

#[test]
fn test_heading_paragraph_and_strong() {
    assert_eq!(
        convert("<h2>Intro</h2><p>Hello <b>world</b>.</p>"),
        "## Intro\n\nHello **world**.\n"
    );
}

#[test]
fn test_unordered_list() {
    assert_eq!(convert("<ul><li>A</li><li>B</li></ul>"), "- A\n- B\n");
}

#[test]
fn test_fence_longer_than_content() {
    let markdown = convert("<pre><code>```nested```</code></pre>");
    let mut lines = markdown.lines();
    assert_eq!(lines.next(), Some("````"));
    assert_eq!(lines.next(), Some("```nested```"));
    assert_eq!(lines.next(), Some("````"));
}

#[test]
fn test_missing_image_warns_once_and_keeps_path() {
    let input = ConversionInput::new(
        chapters(&[("ch1", r#"<p><img src="../Images/missing.png"/></p>"#)]),
        Metadata::default(),
    );
    let result = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap();

    assert_eq!(
        result.warnings,
        vec![RenderWarning::MissingAsset {
            chapter: "ch1".into(),
            reference: "../Images/missing.png".into(),
        }]
    );
    assert!(result.markdown.contains("](../Images/missing.png)"));
    assert_eq!(result.image_count, 0);
}

#[test]
fn test_front_matter_only_title() {
    let input = ConversionInput::new(chapters(&[("ch1", "<p>x</p>")]), Metadata::new("Agnes Grey"));
    let result = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap();

    let front_matter: Vec<&str> = result.markdown.split("\n---\n").next().unwrap().lines().collect();
    assert_eq!(front_matter, vec!["---", "title: \"Agnes Grey\""]);
}

#[test]
fn test_native_outline_links_to_anchors() {
    let input = ConversionInput::new(
        chapters(&[
            ("ch1", "<h1>Chapter One</h1><p>Text.</p><h2>Detail</h2><p>More.</p>"),
            ("ch2", "<h1>Chapter Two</h1><p>End.</p>"),
        ]),
        Metadata::new("Book").with_language("en"),
    )
    .with_outline(vec![
        OutlineEntry::new("Chapter One", "OEBPS/Text/ch1.xhtml"),
        OutlineEntry::new("Chapter Two", "OEBPS/Text/ch2.xhtml"),
    ]);

    let result = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap();
    let markdown = &result.markdown;

    assert!(markdown.contains(
        "## Contents\n\n\
         - [Chapter One](#ch1-chapter-one)\n  \
         - [Detail](#ch1-detail)\n\
         - [Chapter Two](#ch2-chapter-two)\n"
    ));
    assert!(markdown.contains("<a id=\"ch1-chapter-one\"></a>\n\n# Chapter One"));
    assert!(markdown.contains("<a id=\"ch1-detail\"></a>\n\n## Detail"));
    assert_eq!(result.heading_count, 3);
}

#[test]
fn test_emphasis_heading_inferred() {
    let markdown = convert(
        "<p><b>第一章 风起</b></p><p>正文内容很长很长，不会被当作标题，因为它是一段普通的叙述文字。</p>",
    );
    assert!(markdown.starts_with("## 第一章 风起\n\n正文"));
}

#[test]
fn test_load_error_names_chapter() {
    let mut docs = chapters(&[("ch1", "<p>a</p>"), ("ch2", "<p>b</p>")]);
    docs[1].order = 0;
    let input = ConversionInput::new(docs, Metadata::default());

    let err = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
    assert!(err.to_string().contains("ch2"));
}

#[test]
fn test_write_publishes_markdown_and_images() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out").join("book.md");

    let mut assets = AssetSet::new();
    assets.insert_image("OEBPS/Images/a.png", "image/png", vec![0x89, b'P', b'N', b'G']);
    let input = ConversionInput::new(
        chapters(&[("ch1", r#"<p><img src="../Images/a.png" alt="A"/></p>"#)]),
        Metadata::default(),
    )
    .with_assets(assets);

    let result = Pipeline::new(ConversionOptions::new())
        .write(&input, &output)
        .unwrap();

    assert_eq!(std::fs::read_to_string(&output).unwrap(), "![A](images/a.png)\n");
    assert_eq!(result.image_count, 1);
    assert_eq!(
        std::fs::read(dir.path().join("out/images/a.png")).unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );

    let entries: Vec<_> = std::fs::read_dir(dir.path().join("out"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries.len(), 2, "unexpected files: {entries:?}");
}

#[test]
fn test_write_without_images() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("book.md");

    let mut assets = AssetSet::new();
    assets.insert_image("OEBPS/Images/a.png", "image/png", vec![1, 2, 3]);
    let input = ConversionInput::new(
        chapters(&[("ch1", r#"<p><img src="../Images/a.png"/></p>"#)]),
        Metadata::default(),
    )
    .with_assets(assets);

    Pipeline::new(ConversionOptions::new().with_extract_images(false))
        .write(&input, &output)
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "![a.png](../Images/a.png)\n"
    );
    assert!(!dir.path().join("images").exists());
}

#[test]
fn test_cancelled_write_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("book.md");
    let input = ConversionInput::new(
        chapters(&[("ch1", "<p>1</p>"), ("ch2", "<p>2</p>"), ("ch3", "<p>3</p>")]),
        Metadata::default(),
    );

    let token = CancellationToken::new();
    let observer = |p: &ChapterProgress<'_>| {
        if p.completed == 2 {
            token.cancel();
        }
    };
    let result = Pipeline::new(ConversionOptions::new())
        .with_observer(&observer)
        .with_cancellation(token.clone())
        .write(&input, &output);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_assembly_error_leaves_no_file() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("book.md");
    let input = ConversionInput::new(chapters(&[("ch1", "<p>1</p>")]), Metadata::new("bad\0title"));

    let err = Pipeline::new(ConversionOptions::new())
        .write(&input, &output)
        .unwrap_err();
    assert!(matches!(err, Error::Assembly { .. }));
    assert!(!output.exists());
}

#[test]
fn test_asset_with_explicit_output_path() {
    let mut assets = AssetSet::new();
    assets.insert(MediaAsset::new("OEBPS/Images/cover.jpg", "images/cover_1.jpg"));
    let input = ConversionInput::new(
        chapters(&[("ch1", r#"<div><img src="../Images/cover.jpg"/></div>"#)]),
        Metadata::default(),
    )
    .with_assets(assets);

    let result = Pipeline::new(ConversionOptions::new()).convert(&input).unwrap();
    assert_eq!(result.markdown, "![cover_1.jpg](images/cover_1.jpg)\n");
}
