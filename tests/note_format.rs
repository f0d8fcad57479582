// Tests for reading and writing Tomboy .note files

use conboy::dates::{epoch, format_date, parse_date};
use conboy::note::{CONTENT_VERSION, Note};
use conboy::richtext::xml_reader::{read_note, read_note_content};
use conboy::richtext::xml_writer::{write_content_body, write_note, write_note_content};
use conboy::richtext::{LinkKind, NoteBuffer, SizeScale, TagKind};
use conboy::NoteError;
use std::time::{Duration, Instant};

const SAMPLE: &str = include_str!("data/packing_list.note");
const CONTENT_OPEN: &str = "<note-content version=\"0.1\">";

fn content_body(xml: &str) -> &str {
    let start = xml.find(CONTENT_OPEN).unwrap() + CONTENT_OPEN.len();
    let end = xml.find("</note-content>").unwrap();
    &xml[start..end]
}

#[test]
fn test_plain_note_loads() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<note version="0.3" xmlns:link="http://beatniksoftware.com/tomboy/link" xmlns:size="http://beatniksoftware.com/tomboy/size" xmlns="http://beatniksoftware.com/tomboy">
  <title>Hello</title>
  <text xml:space="preserve"><note-content version="0.1">Hello

World</note-content></text>
  <last-change-date>2020-01-01T00:00:00.0000000+00:00</last-change-date>
  <open-on-startup>False</open-on-startup>
</note>"#;

    let loaded = read_note(xml).unwrap();
    assert_eq!(loaded.buffer.text(), "Hello\n\nWorld");
    assert!(loaded.buffer.runs().iter().all(|run| run.tags.is_empty()));
    assert_eq!(loaded.note.title, "Hello");
    assert_eq!(
        loaded.note.last_change_date,
        parse_date("2020-01-01T00:00:00+00:00").unwrap()
    );
}

#[test]
fn test_sample_note_metadata() {
    let loaded = read_note(SAMPLE).unwrap();
    let note = &loaded.note;
    assert_eq!(note.title, "Packing List");
    assert_eq!(note.note_version, 0.3);
    assert_eq!(note.content_version, 0.1);
    assert_eq!((note.width, note.height), (450, 360));
    assert_eq!((note.x, note.y), (10, 20));
    assert!(note.pinned);
    assert_eq!(note.tags, vec!["system:notebook:Travel".to_string()]);
    assert!(note.open_on_startup);
    assert_eq!(note.cursor_position, 14);
    assert_eq!(loaded.buffer.cursor(), 14);
    assert_eq!(
        format_date(&note.create_date),
        "2009-03-20T09:00:00.0000000+01:00"
    );
}

#[test]
fn test_sample_note_document() {
    let buffer = read_note(SAMPLE).unwrap().buffer;
    assert_eq!(
        buffer.text(),
        "Packing List\n\nThings to remember for the Trip Plan:\n\
         \u{2022} Passport\n\u{2022} Clothes\n\u{2218} Socks\n\u{2218} Shirts\n\
         \u{2022} Charger\n\nDone & see http://example.com"
    );

    let depths: Vec<u32> = (0..buffer.line_count())
        .map(|line| buffer.line_depth(line))
        .collect();
    assert_eq!(depths, vec![0, 0, 0, 1, 1, 2, 2, 1, 0, 0]);

    let things = buffer.line_start(2);
    assert!(buffer.has_tag_at(things + 10, &TagKind::Bold));
    assert_eq!(
        buffer.link_at(things + 27),
        Some((LinkKind::Internal, "Trip Plan".to_string()))
    );
    assert!(buffer.has_tag_at(buffer.line_start(4) + 2, &TagKind::Italic));
    assert!(buffer.has_tag_at(
        buffer.line_start(9),
        &TagKind::Size(SizeScale::Large)
    ));
}

#[test]
fn test_sample_content_is_written_back_unchanged() {
    let loaded = read_note(SAMPLE).unwrap();
    assert_eq!(write_content_body(&loaded.buffer), content_body(SAMPLE));
}

#[test]
fn test_note_survives_write_and_read() {
    let first = read_note(SAMPLE).unwrap();
    let second = read_note(&write_note(&first.note)).unwrap();
    assert_eq!(second.note, first.note);
    assert_eq!(second.buffer.runs(), first.buffer.runs());
}

#[test]
fn test_write_note() {
    let date = parse_date("2020-01-01T00:00:00+00:00").unwrap();
    let mut buffer = NoteBuffer::with_text("Hello\n\nWorld");
    buffer.apply_tag(&TagKind::Bold, 7, 12);
    let note = Note {
        guid: "0d5c4b3a".to_string(),
        title: "Hello".to_string(),
        content: write_note_content(&buffer, CONTENT_VERSION),
        create_date: date,
        last_change_date: date,
        last_metadata_change_date: date,
        cursor_position: 3,
        width: 400,
        height: 300,
        x: 5,
        y: 6,
        pinned: true,
        tags: vec!["work".to_string()],
        ..Note::default()
    };

    insta::assert_snapshot!(write_note(&note), @r#"
<?xml version="1.0" encoding="utf-8"?>
<note version="0.3" xmlns:link="http://beatniksoftware.com/tomboy/link" xmlns:size="http://beatniksoftware.com/tomboy/size" xmlns="http://beatniksoftware.com/tomboy">
  <title>Hello</title>
  <text xml:space="preserve"><note-content version="0.1" xmlns:link="http://beatniksoftware.com/tomboy/link" xmlns:size="http://beatniksoftware.com/tomboy/size" xmlns="http://beatniksoftware.com/tomboy">Hello

<bold>World</bold></note-content></text>
  <last-change-date>2020-01-01T00:00:00.0000000+00:00</last-change-date>
  <last-metadata-change-date>2020-01-01T00:00:00.0000000+00:00</last-metadata-change-date>
  <create-date>2020-01-01T00:00:00.0000000+00:00</create-date>
  <cursor-position>3</cursor-position>
  <width>400</width>
  <height>300</height>
  <x>5</x>
  <y>6</y>
  <tags>
    <tag>work</tag>
    <tag>system:pinned</tag>
  </tags>
  <open-on-startup>False</open-on-startup>
</note>
"#);
}

#[test]
fn test_empty_note_content() {
    let content = write_note_content(&NoteBuffer::new(), CONTENT_VERSION);
    insta::assert_snapshot!(content.trim_end(), @r#"<note-content version="0.1" xmlns:link="http://beatniksoftware.com/tomboy/link" xmlns:size="http://beatniksoftware.com/tomboy/size" xmlns="http://beatniksoftware.com/tomboy"></note-content>"#);
    assert!(content.ends_with("</note-content>\n"));
}

#[test]
fn test_nested_lists_are_written() {
    let mut buffer = NoteBuffer::new();
    read_note_content(
        "<note-content version=\"0.1\">Todo\n<list><list-item dir=\"ltr\">a\n\
         <list><list-item dir=\"ltr\">b\n<list><list-item dir=\"ltr\">c\n\
         </list-item></list></list-item></list></list-item>\
         <list-item dir=\"ltr\">d</list-item></list></note-content>",
        &mut buffer,
    )
    .unwrap();

    assert_eq!(buffer.line_depth(3), 3);
    assert_eq!(buffer.slice(buffer.line_start(3), buffer.line_end(3)), "\u{2023} c");
    assert_eq!(
        write_content_body(&buffer),
        "Todo\n<list><list-item dir=\"ltr\">a\n<list><list-item dir=\"ltr\">b\n\
         <list><list-item dir=\"ltr\">c\n</list-item></list></list-item></list>\
         </list-item><list-item dir=\"ltr\">d</list-item></list>"
    );
}

#[test]
fn test_blank_line_separates_lists() {
    let mut buffer = NoteBuffer::with_text("a\nb\n\nc");
    buffer.enable_bullets(0, 3);
    let end = buffer.len();
    buffer.enable_bullets(end, end);

    let body = write_content_body(&buffer);
    assert_eq!(
        body,
        "<list><list-item dir=\"ltr\">a\n</list-item><list-item dir=\"ltr\">b\n</list-item></list>\n\
         <list><list-item dir=\"ltr\">c</list-item></list>"
    );
    assert_eq!(body.matches("<list>").count(), 2);
}

#[test]
fn test_unknown_element_passes_through() {
    let mut buffer = NoteBuffer::new();
    read_note_content(
        "<note-content version=\"0.1\">Today is <datetime>Monday</datetime></note-content>",
        &mut buffer,
    )
    .unwrap();
    assert_eq!(
        write_content_body(&buffer),
        "Today is <datetime>Monday</datetime>"
    );
}

#[test]
fn test_bad_metadata_keeps_defaults() {
    let xml = r#"<note version="0.3" xmlns="http://beatniksoftware.com/tomboy">
  <text xml:space="preserve"><note-content version="0.1">First line
second</note-content></text>
  <create-date>never</create-date>
  <width>wide</width>
  <height>300</height>
  <bogus><nested>ignored</nested></bogus>
  <open-on-startup>yes</open-on-startup>
</note>"#;

    let loaded = read_note(xml).unwrap();
    assert_eq!(loaded.note.title, "First line");
    assert_eq!(loaded.note.create_date, epoch());
    assert_eq!(loaded.note.width, 0);
    assert_eq!(loaded.note.height, 300);
    assert!(!loaded.note.open_on_startup);
    assert_eq!(loaded.buffer.text(), "First line\nsecond");
}

#[test]
fn test_truncated_file_is_an_error() {
    let truncated = &SAMPLE[..SAMPLE.len() / 2];
    assert!(matches!(read_note(truncated), Err(NoteError::Xml { .. })));
}

#[test]
fn test_crlf_is_normalized() {
    let mut buffer = NoteBuffer::new();
    read_note_content(
        "<note-content version=\"0.1\">one\r\ntwo</note-content>",
        &mut buffer,
    )
    .unwrap();
    assert_eq!(buffer.text(), "one\ntwo");
}

#[test]
fn test_large_note_loads_and_saves_quickly() {
    let mut body = String::new();
    for i in 0..3000 {
        body.push_str(&format!("Line {i} with <bold>some</bold> text\n"));
    }
    body.push_str("<list>");
    for i in 0..1000 {
        body.push_str(&format!("<list-item dir=\"ltr\">item {i}\n</list-item>"));
    }
    body.push_str("</list>");
    let fragment = format!("<note-content version=\"0.1\">{body}</note-content>");

    let started = Instant::now();
    let mut buffer = NoteBuffer::new();
    read_note_content(&fragment, &mut buffer).unwrap();
    let written = write_content_body(&buffer);
    let elapsed = started.elapsed();

    assert_eq!(buffer.line_count(), 4001);
    assert_eq!(buffer.line_depth(3500), 1);
    assert_eq!(written, body);
    assert!(elapsed < Duration::from_secs(5), "load and save took {elapsed:?}");
}
