use pathway_core::model::{ApprovalStatus, LessonId, LessonKind, PathId, UserId};
use pathway_core::time::fixed_now;
use services::{AppServices, Clock, IssueOutcome, IssuerConfig};
use storage::repository::Storage;

async fn build_path(services: &AppServices, kinds: &[LessonKind]) -> (PathId, Vec<LessonId>) {
    let curriculum = services.curriculum();
    let path = curriculum
        .create_path("Smart agriculture".into(), "Sensors in the field".into())
        .await
        .expect("create path");
    let chapter = curriculum
        .add_chapter(path.id, "Fundamentals".into(), 0)
        .await
        .expect("add chapter");

    let mut lessons = Vec::new();
    for (i, kind) in kinds.iter().enumerate() {
        let lesson = curriculum
            .add_lesson(
                path.id,
                chapter.id,
                format!("Step {}", i + 1),
                *kind,
                i32::try_from(i).unwrap(),
            )
            .await
            .expect("add lesson");
        lessons.push(lesson.id);
    }
    (path.id, lessons)
}

fn in_memory_services() -> AppServices {
    AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        IssuerConfig::default(),
    )
}

#[tokio::test]
async fn quiz_then_project_then_approval_issues_one_certificate() {
    let services = in_memory_services();
    let (path, lessons) = build_path(&services, &[LessonKind::Quiz, LessonKind::Project]).await;
    let user = UserId::new(21);
    let recorder = services.recorder();

    let first = recorder
        .complete_lesson(user, lessons[0], None, None)
        .await
        .expect("complete quiz");
    assert!(!first.is_path_complete);
    assert!(first.certificate.is_none());

    let second = recorder
        .complete_lesson(user, lessons[1], Some(String::new()), Some("http://drive/x".into()))
        .await
        .expect("submit project");
    assert_eq!(second.progress.approval_status, ApprovalStatus::Pending);
    assert!(second.certificate.is_none());

    let pending = services
        .issuer()
        .try_issue_certificate(user, path)
        .await
        .unwrap();
    assert_eq!(pending, IssueOutcome::PendingProjects { pending: 1 });

    let approved = services
        .review()
        .approve_submission(second.progress.id)
        .await
        .expect("approve");
    assert_eq!(approved.progress.approval_status, ApprovalStatus::Approved);
    let certificate = approved.issue.into_certificate().expect("issued on approval");
    assert!(!certificate.code.as_str().is_empty());

    let certificates = services
        .registry()
        .user_certificates(user)
        .await
        .unwrap();
    assert_eq!(certificates, vec![certificate.clone()]);

    let verified = services
        .registry()
        .verify(certificate.code.as_str())
        .await
        .unwrap();
    assert_eq!(verified.path_id, path);
}

#[tokio::test]
async fn resubmission_after_approval_stays_approved() {
    let services = in_memory_services();
    let (_, lessons) = build_path(&services, &[LessonKind::Project]).await;
    let user = UserId::new(3);
    let recorder = services.recorder();

    let submitted = recorder
        .complete_lesson(user, lessons[0], Some("/uploads/a.zip".into()), None)
        .await
        .unwrap();
    services
        .review()
        .reject_submission(submitted.progress.id, "archive is empty".into())
        .await
        .unwrap();
    let approved = services
        .review()
        .approve_submission(submitted.progress.id)
        .await
        .unwrap();
    assert!(approved.issue.issued());

    let again = recorder
        .complete_lesson(user, lessons[0], Some("/uploads/b.zip".into()), None)
        .await
        .unwrap();
    assert_eq!(again.progress.approval_status, ApprovalStatus::Approved);
    assert!(again.progress.admin_note.is_empty());
    assert_eq!(
        again.progress.submission_file_url.as_deref(),
        Some("/uploads/b.zip")
    );
    assert!(again.is_path_complete);
    assert!(again.certificate.is_none());
}

#[tokio::test]
async fn incomplete_path_never_issues() {
    let services = in_memory_services();
    let (path, lessons) = build_path(
        &services,
        &[LessonKind::Material, LessonKind::Quiz, LessonKind::Quiz],
    )
    .await;
    let user = UserId::new(5);

    let result = services
        .recorder()
        .complete_lesson(user, lessons[2], None, None)
        .await
        .unwrap();
    assert!(!result.is_path_complete);

    let completion = services
        .aggregator()
        .compute_path_completion(user, path)
        .await
        .unwrap();
    assert_eq!((completion.completed, completion.total), (1, 3));
    assert_eq!(completion.percentage, 33);

    for _ in 0..3 {
        let outcome = services
            .issuer()
            .try_issue_certificate(user, path)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            IssueOutcome::Incomplete {
                completed: 1,
                total: 3
            }
        );
    }
    assert!(services.registry().all_certificates(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn back_to_back_issue_calls_create_one_certificate() {
    let services = in_memory_services();
    let (path, lessons) = build_path(&services, &[LessonKind::Quiz]).await;
    let user = UserId::new(9);

    let completed = services
        .recorder()
        .complete_lesson(user, lessons[0], None, None)
        .await
        .unwrap();
    assert!(completed.certificate.is_some());

    let issuer = services.issuer();
    assert_eq!(
        issuer.try_issue_certificate(user, path).await.unwrap(),
        IssueOutcome::AlreadyIssued
    );
    assert_eq!(
        issuer.try_issue_certificate(user, path).await.unwrap(),
        IssueOutcome::AlreadyIssued
    );
    assert_eq!(services.registry().all_certificates(10).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_final_completions_issue_exactly_one_certificate() {
    for round in 0..20_u64 {
        let services = in_memory_services();
        let (path, lessons) = build_path(
            &services,
            &[LessonKind::Quiz, LessonKind::Quiz, LessonKind::Quiz],
        )
        .await;
        let user = UserId::new(100 + round);

        services
            .recorder()
            .complete_lesson(user, lessons[0], None, None)
            .await
            .unwrap();

        let handles: Vec<_> = [lessons[1], lessons[2]]
            .into_iter()
            .map(|lesson| {
                let recorder = services.recorder();
                tokio::spawn(async move {
                    recorder.complete_lesson(user, lesson, None, None).await
                })
            })
            .collect();

        let mut issued = 0;
        for handle in handles {
            let result = handle.await.expect("task").expect("completion");
            if result.certificate.is_some() {
                issued += 1;
            }
        }
        assert_eq!(issued, 1, "round {round}");

        let stored = services.registry().user_certificates(user).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].path_id, path);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issue_calls_race_to_one_insert() {
    let services = in_memory_services();
    let (path, lessons) = build_path(&services, &[LessonKind::Material]).await;
    let user = UserId::new(44);

    // Completing issues immediately; revoke so the racers start from scratch.
    let first = services
        .recorder()
        .complete_lesson(user, lessons[0], None, None)
        .await
        .unwrap()
        .certificate
        .expect("issued");
    services.registry().revoke(first.id).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let issuer = services.issuer();
            tokio::spawn(async move { issuer.try_issue_certificate(user, path).await })
        })
        .collect();

    let mut issued = 0;
    for handle in handles {
        let outcome = handle.await.expect("task").expect("issue");
        match outcome {
            IssueOutcome::Issued { .. } => issued += 1,
            IssueOutcome::AlreadyIssued => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(issued, 1);
}

#[tokio::test]
async fn sqlite_end_to_end_scenario() {
    let services = AppServices::new_sqlite(
        "sqlite:file:memdb_services_flow?mode=memory&cache=shared",
        Clock::fixed(fixed_now()),
        IssuerConfig::default(),
    )
    .await
    .expect("sqlite services");
    let (path, lessons) = build_path(&services, &[LessonKind::Quiz, LessonKind::Project]).await;
    let user = UserId::new(1);

    let failure = services
        .cooldown()
        .record_failure(user, lessons[0], fixed_now())
        .await
        .unwrap();
    assert_eq!(failure.progress.quiz_failed_at, Some(fixed_now()));

    let quiz = services
        .recorder()
        .complete_lesson(user, lessons[0], None, None)
        .await
        .unwrap();
    assert!(!quiz.is_path_complete);
    let cooldown = services
        .cooldown()
        .check_cooldown(user, lessons[0], fixed_now())
        .await
        .unwrap();
    assert!(!cooldown.on_cooldown);

    let project = services
        .recorder()
        .complete_lesson(user, lessons[1], None, Some("https://drive.example/p".into()))
        .await
        .unwrap();
    assert_eq!(project.progress.approval_status, ApprovalStatus::Pending);
    assert!(project.is_path_complete);
    assert!(project.certificate.is_none());

    let queue = services.review().list_submissions(10).await.unwrap();
    assert_eq!(queue.len(), 1);

    let approved = services
        .review()
        .approve_submission(project.progress.id)
        .await
        .unwrap();
    let certificate = approved.issue.into_certificate().expect("issued");
    assert!(certificate.code.as_str().starts_with(&format!("AIOT-{path}-")));

    let again = services
        .issuer()
        .try_issue_certificate(user, path)
        .await
        .unwrap();
    assert_eq!(again, IssueOutcome::AlreadyIssued);

    let summary = services.aggregator().user_summary(user).await.unwrap();
    assert_eq!(summary.points, 100);
}

#[tokio::test]
async fn custom_prefix_is_used_for_codes() {
    let services = AppServices::new(
        &Storage::in_memory(),
        Clock::fixed(fixed_now()),
        IssuerConfig {
            code_prefix: pathway_core::model::CodePrefix::new("edu").unwrap(),
        },
    );
    let (path, lessons) = build_path(&services, &[LessonKind::Quiz]).await;

    let certificate = services
        .recorder()
        .complete_lesson(UserId::new(2), lessons[0], None, None)
        .await
        .unwrap()
        .certificate
        .expect("issued");
    assert!(certificate.code.as_str().starts_with(&format!("EDU-{path}-")));
}
