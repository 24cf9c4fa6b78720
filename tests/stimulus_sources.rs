use std::fs;

use rating_harness::prompts::{RatingPrompt, RenderOptions};
use rating_harness::scale::RatingScale;
use rating_harness::stimulus::{Modality, Payload, SourceError, SourceSpec};
use rating_harness::gateway::{ContentPart, MessageContent};
use tempfile::tempdir;

#[test]
fn directory_source_filters_and_sorts_images() {
    let dir = tempdir().unwrap();
    for name in ["b.PNG", "a.jpg", "notes.txt", "c.gif", "README"] {
        fs::write(dir.path().join(name), b"img").unwrap();
    }
    fs::create_dir(dir.path().join("nested.jpg")).unwrap();

    let source = SourceSpec::Directory {
        path: dir.path().to_path_buf(),
    };
    assert_eq!(source.modality(), Modality::ImageLocal);
    let stimuli = source.load().unwrap();

    let ids: Vec<&str> = stimuli.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a.jpg", "b.PNG", "c.gif"]);
    match &stimuli[1].payload {
        Payload::LocalImage { media_type, .. } => assert_eq!(media_type, "image/png"),
        other => panic!("expected local image, got {other:?}"),
    }
}

#[test]
fn local_image_is_encoded_when_rendered() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.jpg"), b"ABC").unwrap();
    let stimuli = SourceSpec::Directory {
        path: dir.path().to_path_buf(),
    }
    .load()
    .unwrap();

    let prompt = RatingPrompt::custom("Rate it", RatingScale::ONE_TO_FIVE);
    let messages = prompt
        .render(&stimuli[0], RenderOptions::default())
        .unwrap();
    match &messages[0].content {
        MessageContent::Parts(parts) => match &parts[1] {
            ContentPart::ImageUrl { url, .. } => {
                assert_eq!(url, "data:image/jpeg;base64,QUJD")
            }
            other => panic!("expected image part, got {other:?}"),
        },
        other => panic!("expected parts, got {other:?}"),
    }
}

#[test]
fn image_table_joins_named_column_onto_base_url() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("images.csv");
    fs::write(&path, "rating, image_name\n3,cat.jpg\n4,\n5,dog.png\n").unwrap();

    let stimuli = SourceSpec::ImageTable {
        path: path.clone(),
        id_column: "image_name".into(),
        base_url: "https://cdn.example.com/set1/".into(),
    }
    .load()
    .unwrap();

    assert_eq!(stimuli.len(), 2);
    assert_eq!(stimuli[0].id, "cat.jpg");
    assert_eq!(
        stimuli[0].payload,
        Payload::ImageUrl("https://cdn.example.com/set1/cat.jpg".into())
    );
    assert_eq!(stimuli[1].id, "dog.png");
}

#[test]
fn missing_column_is_a_load_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("images.csv");
    fs::write(&path, "file,score\na.jpg,1\n").unwrap();

    let err = SourceSpec::ImageTable {
        path,
        id_column: "image_name".into(),
        base_url: "https://cdn.example.com/".into(),
    }
    .load()
    .unwrap_err();

    match err {
        SourceError::MissingColumn {
            column, available, ..
        } => {
            assert_eq!(column, "image_name");
            assert_eq!(available, "file, score");
        }
        other => panic!("expected missing column, got {other:?}"),
    }
}

#[test]
fn text_table_reads_id_and_text_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("responses.csv");
    fs::write(
        &path,
        "respondent,response\nr1,\"Loved it, would take again\"\nr2,Too long\n",
    )
    .unwrap();

    let source = SourceSpec::TextTable {
        path,
        id_column: "respondent".into(),
        text_column: "response".into(),
    };
    assert_eq!(source.modality(), Modality::Text);
    let stimuli = source.load().unwrap();

    assert_eq!(stimuli.len(), 2);
    assert_eq!(stimuli[0].id, "r1");
    assert_eq!(
        stimuli[0].payload,
        Payload::Text("Loved it, would take again".into())
    );
}

#[test]
fn text_table_skips_rows_without_text() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("responses.csv");
    fs::write(
        &path,
        "respondent,response\nr1,Fine\nr2,\nr3,\"   \"\nr4\nr5,Boring\n",
    )
    .unwrap();

    let stimuli = SourceSpec::TextTable {
        path,
        id_column: "respondent".into(),
        text_column: "response".into(),
    }
    .load()
    .unwrap();

    let ids: Vec<&str> = stimuli.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r5"]);
}

#[test]
fn url_file_skips_blank_and_comment_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("urls.txt");
    fs::write(
        &path,
        "# set one\nhttps://example.com/a.jpg\n\n  https://example.com/b.jpg  \n",
    )
    .unwrap();

    let stimuli = SourceSpec::UrlFile { path }.load().unwrap();
    let ids: Vec<&str> = stimuli.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["https://example.com/a.jpg", "https://example.com/b.jpg"]
    );
}

#[test]
fn missing_directory_is_an_error() {
    let dir = tempdir().unwrap();
    let source = SourceSpec::Directory {
        path: dir.path().join("absent"),
    };
    assert!(source.load().is_err());
}
