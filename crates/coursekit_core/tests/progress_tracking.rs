use coursekit_core::db::{open_db, open_db_in_memory};
use coursekit_core::{
    CompletionOutcome, CourseId, CourseService, EditorService, EnrollmentService, LessonId,
    LessonKind, ProgressError, ProgressService, SqliteContentRepository, SqliteCourseRepository,
    SqliteEnrollmentRepository, Viewer, ViewerRole,
};
use rusqlite::Connection;
use std::thread;
use uuid::Uuid;

const AUTHOR: &str = "author-1";
const LEARNER: &str = "learner-1";

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn progress(
    conn: &Connection,
) -> ProgressService<SqliteCourseRepository<'_>, SqliteContentRepository<'_>, SqliteEnrollmentRepository<'_>>
{
    ProgressService::new(
        SqliteCourseRepository::try_new(conn).unwrap(),
        SqliteContentRepository::try_new(conn).unwrap(),
        SqliteEnrollmentRepository::try_new(conn).unwrap(),
    )
}

fn editor(conn: &Connection) -> EditorService<SqliteContentRepository<'_>> {
    EditorService::new(SqliteContentRepository::try_new(conn).unwrap())
}

fn enroll(conn: &Connection, learner_id: &str, course_id: CourseId) {
    EnrollmentService::new(SqliteEnrollmentRepository::try_new(conn).unwrap())
        .enroll(learner_id, course_id)
        .unwrap();
}

/// Creates a course with `lessons_per_module.len()` modules; returns lesson ids in display order.
fn seed_course(conn: &Connection, lessons_per_module: &[usize]) -> (CourseId, Vec<LessonId>) {
    let course = CourseService::new(SqliteCourseRepository::try_new(conn).unwrap())
        .create_course("Intro to Rust", AUTHOR)
        .unwrap();
    let editor = editor(conn);
    let mut lesson_ids = Vec::new();
    for (index, count) in lessons_per_module.iter().enumerate() {
        let module_id = editor
            .add_module(course.id, Some(format!("Week {}", index + 1)))
            .unwrap();
        for _ in 0..*count {
            lesson_ids.push(editor.add_lesson(module_id, LessonKind::Video, None).unwrap());
        }
    }
    (course.id, lesson_ids)
}

#[test]
fn deleted_lesson_leaves_denominator_and_progress_is_recomputed() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[2, 2]);
    let (a, b, c) = (lessons[0], lessons[1], lessons[2]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);

    let first = service.complete_lesson(&viewer, course_id, a).unwrap();
    assert_eq!(first.enrollment().unwrap().progress, 25);

    editor(&conn).remove_lesson(b).unwrap();

    let second = service.complete_lesson(&viewer, course_id, c).unwrap();
    match second {
        CompletionOutcome::Recorded(enrollment) => {
            assert_eq!(enrollment.progress, 67);
            assert!(enrollment.has_completed(a));
            assert!(enrollment.has_completed(c));
        }
        other => panic!("expected recorded completion, got {other:?}"),
    }
}

#[test]
fn completing_twice_is_a_noop() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[3]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);

    let once = service
        .complete_lesson(&viewer, course_id, lessons[0])
        .unwrap();
    let twice = service
        .complete_lesson(&viewer, course_id, lessons[0])
        .unwrap();

    let CompletionOutcome::AlreadyCompleted(repeated) = twice else {
        panic!("second completion should be a no-op");
    };
    assert_eq!(once.enrollment(), Some(&repeated));
    assert_eq!(repeated.progress, 33);
    assert_eq!(repeated.completed_lesson_ids.len(), 1);
}

#[test]
fn progress_is_monotonic_and_reaches_complete() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[3, 4]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);

    let mut last = 0u8;
    for lesson_id in lessons.iter().chain(lessons.iter().take(2)) {
        let outcome = service
            .complete_lesson(&viewer, course_id, *lesson_id)
            .unwrap();
        let enrollment = outcome.enrollment().unwrap();
        assert!(enrollment.progress >= last);
        assert!(enrollment.progress <= 100);
        last = enrollment.progress;
    }

    let view = service.progress_view(LEARNER, course_id).unwrap();
    assert_eq!(last, 100);
    assert!(view.is_complete);
    assert_eq!(view.next_lesson_id, None);

    let enrollment = EnrollmentService::new(SqliteEnrollmentRepository::try_new(&conn).unwrap())
        .get(LEARNER, course_id)
        .unwrap();
    assert!(enrollment.completed_at.is_some());
}

#[test]
fn unknown_lesson_is_rejected_without_write() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[2]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);

    editor(&conn).remove_lesson(lessons[1]).unwrap();

    let err = service
        .complete_lesson(&viewer, course_id, lessons[1])
        .unwrap_err();
    assert!(matches!(err, ProgressError::UnknownLesson(id) if id == lessons[1]));

    let err = service
        .complete_lesson(&viewer, course_id, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ProgressError::UnknownLesson(_)));

    let view = service.progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.progress, 0);
    assert_eq!(view.completed_lessons, 0);
}

#[test]
fn not_enrolled_learner_cannot_complete() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[1]);

    let err = progress(&conn)
        .complete_lesson(&Viewer::student("stranger"), course_id, lessons[0])
        .unwrap_err();
    assert!(matches!(err, ProgressError::NotEnrolled { course_id: id } if id == course_id));

    let err = progress(&conn)
        .complete_lesson(&Viewer::anonymous(), course_id, lessons[0])
        .unwrap_err();
    assert!(matches!(err, ProgressError::NotEnrolled { .. }));
}

#[test]
fn admin_and_author_without_enrollment_are_untracked() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[1]);
    let service = progress(&conn);

    let admin = service
        .complete_lesson(&Viewer::admin("admin-1"), course_id, lessons[0])
        .unwrap();
    assert_eq!(admin, CompletionOutcome::Untracked);

    let author = service
        .complete_lesson(&Viewer::student(AUTHOR), course_id, lessons[0])
        .unwrap();
    assert_eq!(author, CompletionOutcome::Untracked);

    let err = service
        .complete_lesson(&Viewer::admin("admin-1"), course_id, Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ProgressError::UnknownLesson(_)));
}

#[test]
fn disabled_course_blocks_enrolled_learner() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[1]);
    enroll(&conn, LEARNER, course_id);
    CourseService::new(SqliteCourseRepository::try_new(&conn).unwrap())
        .disable(course_id)
        .unwrap();

    let err = progress(&conn)
        .complete_lesson(
            &Viewer::with_role(LEARNER, ViewerRole::Student),
            course_id,
            lessons[0],
        )
        .unwrap_err();
    assert!(matches!(err, ProgressError::NotEnrolled { .. }));
}

#[test]
fn unknown_course_is_not_found() {
    let conn = setup();
    let err = progress(&conn)
        .complete_lesson(&Viewer::student(LEARNER), Uuid::new_v4(), Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, ProgressError::CourseNotFound(_)));
}

#[test]
fn stale_ids_are_reported_then_compacted_on_next_write() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[3]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);

    service
        .complete_lesson(&viewer, course_id, lessons[0])
        .unwrap();
    editor(&conn).remove_lesson(lessons[0]).unwrap();

    let view = service.progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.progress, 0);
    assert_eq!(view.stale_references, 1);
    assert_eq!(view.total_lessons, 2);
    assert_eq!(view.next_lesson_id, Some(lessons[1]));

    let outcome = service
        .complete_lesson(&viewer, course_id, lessons[1])
        .unwrap();
    let enrollment = outcome.enrollment().unwrap();
    assert_eq!(enrollment.progress, 50);
    assert!(!enrollment.has_completed(lessons[0]));

    let view = service.progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.stale_references, 0);
    assert_eq!(view.next_lesson_id, Some(lessons[2]));
}

#[test]
fn ledger_reads_recompute_progress_after_lesson_removal() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[4]);
    enroll(&conn, LEARNER, course_id);
    progress(&conn)
        .complete_lesson(&Viewer::student(LEARNER), course_id, lessons[0])
        .unwrap();

    editor(&conn).remove_lesson(lessons[0]).unwrap();

    let ledger = EnrollmentService::new(SqliteEnrollmentRepository::try_new(&conn).unwrap());
    let stored = ledger.get(LEARNER, course_id).unwrap();
    assert_eq!(stored.progress, 0);
    let listed = ledger.list_for_learner(LEARNER).unwrap();
    assert_eq!(listed[0].progress, 0);
    let again = ledger.enroll(LEARNER, course_id).unwrap();
    assert_eq!(again.enrollment().progress, 0);

    let view = progress(&conn).progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.progress, stored.progress);
}

#[test]
fn ledger_progress_follows_added_lessons() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[2]);
    enroll(&conn, LEARNER, course_id);
    progress(&conn)
        .complete_lesson(&Viewer::student(LEARNER), course_id, lessons[0])
        .unwrap();

    let module_id = editor(&conn).get_tree(course_id).unwrap().modules[0].id();
    editor(&conn)
        .add_lesson(module_id, LessonKind::Text, None)
        .unwrap();
    editor(&conn)
        .add_lesson(module_id, LessonKind::Text, None)
        .unwrap();

    let stored = EnrollmentService::new(SqliteEnrollmentRepository::try_new(&conn).unwrap())
        .get(LEARNER, course_id)
        .unwrap();
    assert_eq!(stored.progress, 25);
}

#[test]
fn empty_course_reports_zero_progress() {
    let conn = setup();
    let (course_id, _) = seed_course(&conn, &[]);
    enroll(&conn, LEARNER, course_id);

    let view = progress(&conn).progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.progress, 0);
    assert_eq!(view.total_lessons, 0);
    assert!(!view.is_complete);
}

#[test]
fn lesson_edits_keep_completed_ids_valid() {
    let conn = setup();
    let (course_id, lessons) = seed_course(&conn, &[2]);
    enroll(&conn, LEARNER, course_id);
    let viewer = Viewer::student(LEARNER);
    let service = progress(&conn);
    service
        .complete_lesson(&viewer, course_id, lessons[0])
        .unwrap();

    let editor = editor(&conn);
    editor
        .update_lesson(
            lessons[0],
            coursekit_core::LessonUpdate::Title("Ownership".to_string()),
        )
        .unwrap();
    editor
        .update_lesson(lessons[0], coursekit_core::LessonUpdate::Kind(LessonKind::Text))
        .unwrap();

    let view = service.progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.progress, 50);
    assert_eq!(view.stale_references, 0);
}

#[test]
fn concurrent_completions_on_one_enrollment_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("coursekit.db");

    let (course_id, lessons) = {
        let conn = open_db(&db_path).unwrap();
        let seeded = seed_course(&conn, &[5, 5]);
        enroll(&conn, LEARNER, seeded.0);
        seeded
    };

    let halves: Vec<Vec<LessonId>> = lessons.chunks(5).map(<[LessonId]>::to_vec).collect();
    let handles: Vec<_> = halves
        .into_iter()
        .map(|chunk| {
            let db_path = db_path.clone();
            thread::spawn(move || {
                let conn = open_db(&db_path).unwrap();
                let service = progress(&conn);
                let viewer = Viewer::student(LEARNER);
                for lesson_id in chunk {
                    service
                        .complete_lesson(&viewer, course_id, lesson_id)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&db_path).unwrap();
    let view = progress(&conn).progress_view(LEARNER, course_id).unwrap();
    assert_eq!(view.completed_lessons, 10);
    assert_eq!(view.progress, 100);
}
