use chrono::Duration;
use pathway_core::model::{
    ApprovalStatus, ChapterDraft, CertificateCode, CodePrefix, LessonDraft, LessonId, LessonKind,
    NewCertificate, PathDraft, PathId, ProgressChange, ProgressId, Submission, UserId,
};
use pathway_core::time::fixed_now;
use storage::repository::{
    CertificateRepository, CurriculumRepository, ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn seed_path(repo: &SqliteRepository, kinds: &[LessonKind]) -> (PathId, Vec<LessonId>) {
    let path = repo
        .insert_path(
            PathDraft {
                title: "Embedded Linux".into(),
                description: "Boards and buses".into(),
            }
            .validate(fixed_now())
            .unwrap(),
        )
        .await
        .unwrap();
    let chapter = repo
        .insert_chapter(
            ChapterDraft {
                path_id: path.id,
                title: "Getting started".into(),
                order: 1,
            }
            .validate(fixed_now())
            .unwrap(),
        )
        .await
        .unwrap();

    let mut lessons = Vec::new();
    for (i, kind) in kinds.iter().enumerate() {
        let draft = LessonDraft {
            path_id: path.id,
            chapter_id: chapter.id,
            title: format!("Lesson {i}"),
            kind: *kind,
            order: i32::try_from(i).unwrap(),
        };
        let lesson = repo
            .insert_lesson(draft.validate(&chapter, fixed_now()).unwrap())
            .await
            .unwrap();
        lessons.push(lesson.id);
    }
    (path.id, lessons)
}

fn new_certificate(user: u64, path: PathId, suffix: [u8; 4]) -> NewCertificate {
    NewCertificate {
        user_id: UserId::new(user),
        path_id: path,
        code: CertificateCode::compose(&CodePrefix::default(), path, suffix),
        issued_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_curriculum_roundtrip() {
    let repo = connect("memdb_curriculum").await;
    let (path, lessons) =
        seed_path(&repo, &[LessonKind::Material, LessonKind::Quiz, LessonKind::Project]).await;

    let stored = repo.get_path(path).await.unwrap().expect("path");
    assert_eq!(stored.title, "Embedded Linux");
    assert_eq!(stored.created_at, fixed_now());

    let listed = repo.list_lessons(path).await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[2].kind, LessonKind::Project);
    assert_eq!(listed[1].order, 1);
    assert_eq!(repo.count_lessons(path).await.unwrap(), 3);
    assert_eq!(repo.list_chapters(path).await.unwrap().len(), 1);

    let lesson = repo.get_lesson(lessons[1]).await.unwrap().expect("lesson");
    assert_eq!(lesson.path_id, path);
    assert!(repo.get_lesson(LessonId::new(9_999)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_chapter_for_missing_path_is_not_found() {
    let repo = connect("memdb_missing_parent").await;
    let err = repo
        .insert_chapter(
            ChapterDraft {
                path_id: PathId::new(404),
                title: "Orphan".into(),
                order: 0,
            }
            .validate(fixed_now())
            .unwrap(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_progress_is_unique_per_user_and_lesson() {
    let repo = connect("memdb_progress_unique").await;
    let (_, lessons) = seed_path(&repo, &[LessonKind::Quiz]).await;
    let user = UserId::new(11);

    let first = repo
        .find_or_create_progress(user, lessons[0], fixed_now())
        .await
        .unwrap();
    let second = repo
        .find_or_create_progress(user, lessons[0], fixed_now() + Duration::minutes(5))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.created_at, fixed_now());
    assert_eq!(first.approval_status, ApprovalStatus::Unset);
    assert!(!first.completed);
}

fn completion(kind: LessonKind, file: Option<&str>, link: Option<&str>) -> ProgressChange {
    ProgressChange::completion(
        kind,
        Submission::new(file.map(str::to_owned), link.map(str::to_owned)),
    )
}

#[tokio::test]
async fn sqlite_resubmission_keeps_approved_status() {
    let repo = connect("memdb_ratchet").await;
    let (_, lessons) = seed_path(&repo, &[LessonKind::Project]).await;
    let user = UserId::new(2);

    let record = repo
        .find_or_create_progress(user, lessons[0], fixed_now())
        .await
        .unwrap();

    let stored = repo
        .update_progress(record.id, &ProgressChange::Approved, fixed_now())
        .await
        .unwrap();
    assert_eq!(stored.approval_status, ApprovalStatus::Approved);

    let stored = repo
        .update_progress(
            record.id,
            &completion(LessonKind::Project, None, Some("https://drive.example/x")),
            fixed_now(),
        )
        .await
        .unwrap();
    assert_eq!(stored.approval_status, ApprovalStatus::Approved);
    assert!(stored.completed);
    assert_eq!(
        stored.submission_drive_link.as_deref(),
        Some("https://drive.example/x")
    );

    let stored = repo
        .update_progress(
            record.id,
            &ProgressChange::Rejected {
                admin_note: "missing wiring diagram".into(),
            },
            fixed_now(),
        )
        .await
        .unwrap();
    assert_eq!(stored.approval_status, ApprovalStatus::Rejected);
    assert_eq!(stored.admin_note, "missing wiring diagram");

    let stored = repo
        .update_progress(
            record.id,
            &completion(LessonKind::Project, Some("/uploads/v2.zip"), None),
            fixed_now(),
        )
        .await
        .unwrap();
    assert_eq!(stored.approval_status, ApprovalStatus::Pending);
    assert_eq!(stored.admin_note, "missing wiring diagram");
    assert_eq!(
        stored.submission_drive_link.as_deref(),
        Some("https://drive.example/x")
    );
    assert_eq!(stored.submission_file_url.as_deref(), Some("/uploads/v2.zip"));
}

#[tokio::test]
async fn sqlite_updates_touch_only_their_own_columns() {
    let repo = connect("memdb_scoped_updates").await;
    let (_, lessons) = seed_path(&repo, &[LessonKind::Project]).await;
    let user = UserId::new(3);
    let later = fixed_now() + Duration::minutes(1);

    let record = repo
        .find_or_create_progress(user, lessons[0], fixed_now())
        .await
        .unwrap();
    repo.update_progress(
        record.id,
        &ProgressChange::Rejected {
            admin_note: "add photos".into(),
        },
        fixed_now(),
    )
    .await
    .unwrap();
    repo.update_progress(record.id, &ProgressChange::QuizFailed, fixed_now())
        .await
        .unwrap();

    let approved = repo
        .update_progress(record.id, &ProgressChange::Approved, later)
        .await
        .unwrap();
    assert!(approved.admin_note.is_empty());
    assert_eq!(approved.quiz_failed_at, Some(fixed_now()));
    assert!(!approved.completed);
    assert_eq!(approved.updated_at, later);

    let resubmitted = repo
        .update_progress(
            record.id,
            &completion(LessonKind::Project, None, Some("drive.google.com/file/d/abc")),
            later,
        )
        .await
        .unwrap();
    assert!(resubmitted.admin_note.is_empty());
    assert_eq!(resubmitted.approval_status, ApprovalStatus::Approved);
    assert_eq!(resubmitted.quiz_failed_at, Some(fixed_now()));
    assert_eq!(
        resubmitted.submission_drive_link.as_deref(),
        Some("drive.google.com/file/d/abc")
    );
}

#[tokio::test]
async fn sqlite_update_unknown_record_is_not_found() {
    let repo = connect("memdb_update_missing").await;
    let (_, lessons) = seed_path(&repo, &[LessonKind::Quiz]).await;

    let record = repo
        .find_or_create_progress(UserId::new(1), lessons[0], fixed_now())
        .await
        .unwrap();
    let err = repo
        .update_progress(
            ProgressId::new(record.id.value() + 100),
            &ProgressChange::QuizFailed,
            fixed_now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_counts_and_failure_timestamp() {
    let repo = connect("memdb_counts").await;
    let (path, lessons) =
        seed_path(&repo, &[LessonKind::Quiz, LessonKind::Project, LessonKind::Material]).await;
    let user = UserId::new(5);

    let failed = repo
        .find_or_create_progress(user, lessons[0], fixed_now())
        .await
        .unwrap();
    let failed = repo
        .update_progress(failed.id, &ProgressChange::QuizFailed, fixed_now())
        .await
        .unwrap();
    assert_eq!(failed.quiz_failed_at, Some(fixed_now()));

    for (lesson, kind) in [
        (lessons[1], LessonKind::Project),
        (lessons[2], LessonKind::Material),
    ] {
        let rec = repo
            .find_or_create_progress(user, lesson, fixed_now())
            .await
            .unwrap();
        repo.update_progress(rec.id, &completion(kind, None, None), fixed_now())
            .await
            .unwrap();
    }
    assert_eq!(repo.count_completed(user, path).await.unwrap(), 2);
    assert_eq!(repo.count_unapproved_projects(user, path).await.unwrap(), 1);
    assert_eq!(repo.count_completed_for_user(user).await.unwrap(), 2);
    assert_eq!(
        repo.count_completed(UserId::new(6), path).await.unwrap(),
        0
    );

    let records = repo.list_path_progress(user, path).await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.lesson_id).collect();
    assert_eq!(ids, lessons);

    let submissions = repo.list_project_submissions(10).await.unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].path_title, "Embedded Linux");
    assert_eq!(submissions[0].lesson_title, "Lesson 1");
}

#[tokio::test]
async fn sqlite_certificate_is_unique_per_user_and_path() {
    let repo = connect("memdb_certificates").await;
    let (path, _) = seed_path(&repo, &[LessonKind::Quiz]).await;

    let issued = repo
        .insert_certificate_if_absent(new_certificate(1, path, [0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap()
        .expect("first insert issues");
    assert_eq!(issued.code.as_str(), format!("AIOT-{path}-DEADBEEF"));

    let again = repo
        .insert_certificate_if_absent(new_certificate(1, path, [1, 2, 3, 4]))
        .await
        .unwrap();
    assert!(again.is_none());

    let clash = repo
        .insert_certificate_if_absent(new_certificate(2, path, [0xde, 0xad, 0xbe, 0xef]))
        .await
        .unwrap_err();
    assert!(matches!(clash, StorageError::Conflict));

    let by_code = repo
        .get_certificate_by_code(&issued.code)
        .await
        .unwrap()
        .expect("lookup by code");
    assert_eq!(by_code, issued);
    assert_eq!(
        repo.find_certificate(UserId::new(1), path).await.unwrap(),
        Some(issued.clone())
    );
    assert_eq!(repo.list_user_certificates(UserId::new(1)).await.unwrap().len(), 1);

    assert!(repo.delete_certificate(issued.id).await.unwrap());
    assert!(!repo.delete_certificate(issued.id).await.unwrap());
    assert!(repo.list_certificates(10).await.unwrap().is_empty());
}
