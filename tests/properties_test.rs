use epub2md::assemble::cleanup;
use epub2md::html::parse_html;
use epub2md::outline::{AnchorRegistry, HeadingClassifier, TocEntry, build_outline, scan_chapter};
use epub2md::{ChapterDocument, ConversionOptions, OutlineEntry};
use proptest::prelude::*;

fn block() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u8..=6).prop_map(|l| format!("<h{l}>Heading {l}</h{l}>")),
        Just("<p><b>Bold title</b></p>".to_string()),
        Just("<p><strong>第三节</strong></p>".to_string()),
        Just("<p>（一）分节</p>".to_string()),
        Just("<p>2. Numbered</p>".to_string()),
        Just("<p class=\"chapter-title\">Styled</p>".to_string()),
        Just("<p>Plain body text that goes on for quite a while, well past any title length.</p>".to_string()),
        Just("<ul><li><b>Not a heading</b></li></ul>".to_string()),
        Just("<table><tr><td><h2>Cell</h2></td></tr></table>".to_string()),
    ]
}

fn chapter_html() -> impl Strategy<Value = String> {
    prop::collection::vec(block(), 0..12).prop_map(|blocks| blocks.concat())
}

fn markdown_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        Just("```".to_string()),
        Just("````rust".to_string()),
        Just("~~~".to_string()),
        Just("> ```".to_string()),
        Just(">".to_string()),
        Just("text  \t".to_string()),
        "[a-z #*`~>-]{0,12}",
    ]
}

fn check_nesting(entries: &[TocEntry]) -> Result<(), TestCaseError> {
    for entry in entries {
        prop_assert!(entry.level >= 1);
        for child in &entry.children {
            prop_assert!(
                child.level > entry.level,
                "child {} (level {}) under {} (level {})",
                child.title,
                child.level,
                entry.title,
                entry.level
            );
        }
        check_nesting(&entry.children)?;
    }
    Ok(())
}

proptest! {
    #[test]
    fn cleanup_is_idempotent(lines in prop::collection::vec(markdown_line(), 0..40)) {
        let text = lines.join("\n");
        let once = cleanup(&text);
        prop_assert_eq!(cleanup(&once), once);
    }

    #[test]
    fn cleanup_has_no_trailing_whitespace(lines in prop::collection::vec(markdown_line(), 0..40)) {
        let cleaned = cleanup(&lines.join("\n"));
        for line in cleaned.lines() {
            prop_assert_eq!(line, line.trim_end());
        }
        prop_assert!(cleaned.is_empty() || (cleaned.ends_with('\n') && !cleaned.ends_with("\n\n")));
    }

    #[test]
    fn heading_levels_within_bounds(pages in prop::collection::vec(chapter_html(), 1..4)) {
        let classifier = HeadingClassifier::default();
        let mut registry = AnchorRegistry::new();
        for (order, html) in pages.iter().enumerate() {
            let chapter = ChapterDocument::new(format!("ch{order}"), order, parse_html(html));
            let found = scan_chapter(&chapter, &classifier, &mut registry);
            for candidate in &found.candidates {
                prop_assert!((1..=6).contains(&candidate.level), "level {}", candidate.level);
            }
        }
    }

    #[test]
    fn outline_children_are_deeper(
        pages in prop::collection::vec(chapter_html(), 1..4),
        with_native in any::<bool>(),
    ) {
        let chapters: Vec<ChapterDocument> = pages
            .iter()
            .enumerate()
            .map(|(order, html)| {
                ChapterDocument::new(format!("ch{order}"), order, parse_html(html))
                    .with_href(format!("Text/ch{order}.xhtml"))
            })
            .collect();
        let refs: Vec<&ChapterDocument> = chapters.iter().collect();

        let native: Vec<OutlineEntry> = if with_native {
            chapters
                .iter()
                .map(|c| OutlineEntry::new(format!("Part {}", c.order), c.href.clone()))
                .collect()
        } else {
            Vec::new()
        };

        let classifier = HeadingClassifier::default();
        let mut registry = AnchorRegistry::new();
        let headings: Vec<_> = refs
            .iter()
            .map(|c| scan_chapter(c, &classifier, &mut registry))
            .collect();
        let outline = build_outline(&refs, &headings, &native, &ConversionOptions::new(), &mut registry);

        check_nesting(&outline.entries)?;
    }
}
