use coursekit_core::db::{open_db, open_db_in_memory};
use coursekit_core::model::content::{
    DEFAULT_MODULE_TITLE, DEFAULT_TEXT_LESSON_TITLE, DEFAULT_VIDEO_LESSON_TITLE,
};
use coursekit_core::{
    ContentEdit, ContentRepository, CourseId, CourseService, EditorError, EditorService,
    LessonBody, LessonKind, LessonUpdate, RepoError, SqliteContentRepository,
    SqliteCourseRepository, ValidationReason,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_course(conn: &Connection) -> CourseId {
    CourseService::new(SqliteCourseRepository::try_new(conn).unwrap())
        .create_course("Data Structures", "author-1")
        .unwrap()
        .id
}

fn editor(conn: &Connection) -> EditorService<SqliteContentRepository<'_>> {
    EditorService::new(SqliteContentRepository::try_new(conn).unwrap())
}

#[test]
fn new_course_has_empty_tree() {
    let conn = setup();
    let course_id = create_course(&conn);

    let tree = editor(&conn).get_tree(course_id).unwrap();
    assert_eq!(tree.course_id, course_id);
    assert!(tree.modules.is_empty());
    assert_eq!(tree.lesson_count(), 0);
}

#[test]
fn add_module_and_lessons_use_defaults() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);

    let module_id = editor.add_module(course_id, None).unwrap();
    let video_id = editor
        .add_lesson(module_id, LessonKind::Video, None)
        .unwrap();
    let text_id = editor.add_lesson(module_id, LessonKind::Text, None).unwrap();

    let tree = editor.get_tree(course_id).unwrap();
    let module = tree.module(module_id).unwrap();
    assert_eq!(module.title, DEFAULT_MODULE_TITLE);
    assert_eq!(module.lessons.len(), 2);

    let video = tree.lesson(video_id).unwrap();
    assert_eq!(video.title, DEFAULT_VIDEO_LESSON_TITLE);
    assert_eq!(video.body, LessonBody::Video { url: String::new() });
    assert_eq!(video.duration_min, 0);
    assert!(!video.is_preview);

    let text = tree.lesson(text_id).unwrap();
    assert_eq!(text.title, DEFAULT_TEXT_LESSON_TITLE);
    assert_eq!(text.kind(), LessonKind::Text);
    assert_ne!(video_id, text_id);
}

#[test]
fn reorder_omitting_an_id_is_rejected_and_tree_unchanged() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);

    let first = editor.add_module(course_id, Some("Arrays".into())).unwrap();
    let second = editor.add_module(course_id, Some("Lists".into())).unwrap();
    editor.add_lesson(first, LessonKind::Video, None).unwrap();
    editor.add_lesson(first, LessonKind::Text, None).unwrap();
    let before = editor.get_tree(course_id).unwrap();

    let err = editor.reorder_modules(course_id, vec![second]).unwrap_err();
    match err {
        EditorError::Validation(validation) => {
            assert_eq!(validation.reason, ValidationReason::NotAPermutation);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let after = editor.get_tree(course_id).unwrap();
    assert_eq!(before, after);
}

#[test]
fn reorder_with_permutation_persists_order() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);

    let a = editor.add_module(course_id, Some("A".into())).unwrap();
    let b = editor.add_module(course_id, Some("B".into())).unwrap();
    let c = editor.add_module(course_id, Some("C".into())).unwrap();
    editor.reorder_modules(course_id, vec![c, a, b]).unwrap();

    let order: Vec<_> = editor
        .get_tree(course_id)
        .unwrap()
        .modules
        .iter()
        .map(|module| module.id())
        .collect();
    assert_eq!(order, vec![c, a, b]);

    let x = editor.add_lesson(a, LessonKind::Text, None).unwrap();
    let y = editor.add_lesson(a, LessonKind::Text, None).unwrap();
    editor.reorder_lessons(a, vec![y, x]).unwrap();
    let tree = editor.get_tree(course_id).unwrap();
    let lesson_order: Vec<_> = tree
        .module(a)
        .unwrap()
        .lessons
        .iter()
        .map(|lesson| lesson.id())
        .collect();
    assert_eq!(lesson_order, vec![y, x]);

    let err = editor.reorder_lessons(a, vec![y, y]).unwrap_err();
    assert!(matches!(err, EditorError::Validation(_)));
}

#[test]
fn update_lesson_keeps_id_and_validates() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let module_id = editor.add_module(course_id, None).unwrap();
    let lesson_id = editor
        .add_lesson(module_id, LessonKind::Video, Some("Intro".into()))
        .unwrap();

    let lesson = editor
        .update_lesson(
            lesson_id,
            LessonUpdate::Body("https://youtu.be/dQw4w9WgXcQ".into()),
        )
        .unwrap();
    assert_eq!(lesson.id(), lesson_id);
    editor
        .update_lesson(lesson_id, LessonUpdate::DurationMin(12))
        .unwrap();
    editor
        .update_lesson(lesson_id, LessonUpdate::Preview(true))
        .unwrap();
    let retagged = editor
        .update_lesson(lesson_id, LessonUpdate::Kind(LessonKind::Text))
        .unwrap();
    assert_eq!(retagged.id(), lesson_id);
    assert_eq!(
        retagged.body,
        LessonBody::Text {
            body: "https://youtu.be/dQw4w9WgXcQ".into()
        }
    );
    assert_eq!(retagged.duration_min, 12);
    assert!(retagged.is_preview);

    let blank = editor
        .update_lesson(lesson_id, LessonUpdate::Title("   ".into()))
        .unwrap_err();
    assert!(matches!(
        blank,
        EditorError::Validation(ref err) if err.reason == ValidationReason::BlankTitle
    ));
    let negative = editor
        .update_lesson(lesson_id, LessonUpdate::DurationMin(-1))
        .unwrap_err();
    assert!(matches!(
        negative,
        EditorError::Validation(ref err) if err.reason == ValidationReason::NegativeDuration
    ));

    let stored = editor.get_tree(course_id).unwrap();
    assert_eq!(stored.lesson(lesson_id).unwrap().title, "Intro");
}

#[test]
fn rename_module_rejects_blank_title() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let module_id = editor.add_module(course_id, None).unwrap();

    editor.rename_module(module_id, "Graphs").unwrap();
    let err = editor.rename_module(module_id, "").unwrap_err();
    assert!(matches!(err, EditorError::Validation(_)));

    let tree = editor.get_tree(course_id).unwrap();
    assert_eq!(tree.module(module_id).unwrap().title, "Graphs");
}

#[test]
fn remove_module_drops_its_lessons() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let keep = editor.add_module(course_id, None).unwrap();
    let drop = editor.add_module(course_id, None).unwrap();
    let kept_lesson = editor.add_lesson(keep, LessonKind::Text, None).unwrap();
    let dropped_lesson = editor.add_lesson(drop, LessonKind::Text, None).unwrap();

    editor.remove_module(course_id, drop).unwrap();

    let tree = editor.get_tree(course_id).unwrap();
    assert_eq!(tree.modules.len(), 1);
    assert!(tree.contains_lesson(kept_lesson));
    assert!(!tree.contains_lesson(dropped_lesson));

    let err = editor.remove_lesson(dropped_lesson).unwrap_err();
    assert!(matches!(err, EditorError::LessonNotFound(id) if id == dropped_lesson));
}

#[test]
fn missing_targets_are_not_found() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let missing = Uuid::new_v4();

    assert!(matches!(
        editor.add_module(missing, None).unwrap_err(),
        EditorError::CourseNotFound(id) if id == missing
    ));
    assert!(matches!(
        editor.add_lesson(missing, LessonKind::Video, None).unwrap_err(),
        EditorError::ModuleNotFound(id) if id == missing
    ));
    assert!(editor
        .update_lesson(missing, LessonUpdate::Preview(true))
        .unwrap_err()
        .is_not_found());
    assert!(editor
        .remove_module(course_id, missing)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn batch_edits_are_all_or_nothing() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let module_id = editor.add_module(course_id, Some("Basics".into())).unwrap();
    let before = editor.get_tree(course_id).unwrap();

    let err = editor
        .apply_edits(
            course_id,
            vec![
                ContentEdit::AddLesson {
                    module_id,
                    kind: LessonKind::Video,
                    title: Some("Setup".into()),
                },
                ContentEdit::RenameModule {
                    module_id,
                    title: String::new(),
                },
            ],
        )
        .unwrap_err();
    assert!(matches!(err, EditorError::Validation(_)));
    assert_eq!(editor.get_tree(course_id).unwrap(), before);

    let tree = editor
        .apply_edits(
            course_id,
            vec![
                ContentEdit::AddModule {
                    title: Some("Advanced".into()),
                },
                ContentEdit::AddLesson {
                    module_id,
                    kind: LessonKind::Text,
                    title: Some("Reading".into()),
                },
            ],
        )
        .unwrap();
    assert_eq!(tree.modules.len(), 2);
    assert_eq!(tree.lesson_count(), 1);
    assert!(tree.revision > before.revision);
}

#[test]
fn duration_beyond_stored_range_is_rejected() {
    let conn = setup();
    let course_id = create_course(&conn);
    let editor = editor(&conn);
    let module_id = editor.add_module(course_id, None).unwrap();
    let lesson_id = editor.add_lesson(module_id, LessonKind::Video, None).unwrap();
    editor
        .update_lesson(lesson_id, LessonUpdate::DurationMin(45))
        .unwrap();

    let err = editor
        .update_lesson(
            lesson_id,
            LessonUpdate::DurationMin(i64::from(u32::MAX) + 1),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EditorError::Validation(ref validation)
            if validation.reason == ValidationReason::DurationOutOfRange
                && validation.field == "duration_min"
    ));

    let tree = editor.get_tree(course_id).unwrap();
    assert_eq!(tree.lesson(lesson_id).unwrap().duration_min, 45);
}

#[test]
fn consistent_read_sees_one_snapshot_across_concurrent_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coursekit.db");
    let reader_conn = open_db(&path).unwrap();
    let writer_conn = open_db(&path).unwrap();
    let course_id = create_course(&writer_conn);
    editor(&writer_conn).add_module(course_id, None).unwrap();

    let reader = SqliteContentRepository::try_new(&reader_conn).unwrap();
    let (before, during) = reader
        .consistent_read(|| {
            let before = reader.get_tree(course_id)?.unwrap();
            editor(&writer_conn)
                .add_module(course_id, Some("Late".into()))
                .unwrap();
            let during = reader.get_tree(course_id)?.unwrap();
            Ok::<_, RepoError>((before, during))
        })
        .unwrap();
    assert_eq!(before, during);
    assert_eq!(during.modules.len(), 1);

    let after = reader.get_tree(course_id).unwrap().unwrap();
    assert_eq!(after.modules.len(), 2);
    assert!(after.revision > during.revision);
}
