//! Whole runs over a local blob store and mock services

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use seed_ingest::config::{CourseSelection, IngestConfig};
use seed_ingest::dispatch::Dispatcher;
use seed_ingest::orchestrator::{BatchOrchestrator, PoolOrigin};
use seed_ingest::schema::EntityKind;
use seed_ingest::storage::{archive_key, LocalBlobStore};

use common::{
    bodies, config_for, max_in_flight, sorted_arrivals, IdFromField, RecordingProgress,
    SequentialIds, TimedResponder,
};

fn orchestrator(config: IngestConfig, sources: &TempDir) -> BatchOrchestrator {
    let dispatcher = Dispatcher::from_config(&config).unwrap();
    BatchOrchestrator::new(config, dispatcher, Arc::new(LocalBlobStore::new(sources.path())))
}

fn write_source(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(name), content).expect("Failed to write source");
}

async fn mount_enrollments(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/inscripciones"))
        .respond_with(SequentialIds::starting_at(1000))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_synthetic_enrollments_use_ingested_students() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .expect(3)
        .mount(&server)
        .await;
    mount_enrollments(&server, 10).await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre,edad\nAna,21\nLuis,22\nEva,23\n");

    let mut config = config_for(&server);
    config.course_selection = CourseSelection::Range;
    config.course_id_range = 1..=5;

    let progress = Arc::new(RecordingProgress::default());
    let summary = orchestrator(config, &sources)
        .with_progress(progress.clone())
        .run()
        .await;

    let students = summary.report(EntityKind::Students).unwrap();
    assert_eq!(students.ids.len(), 3);
    assert_eq!(
        summary.skipped_sources,
        vec![EntityKind::Instructors, EntityKind::Courses, EntityKind::Enrollments]
    );

    assert_eq!(summary.enrollments.student_pool, 3);
    assert_eq!(summary.enrollments.student_origin, PoolOrigin::Ingested);
    assert_eq!(summary.enrollments.course_origin, Some(PoolOrigin::Range));
    assert_eq!(summary.enrollments.submitted, 10);
    assert_eq!(summary.enrollments.succeeded, 10);
    assert_eq!(summary.enrollments.batches, 3);

    let sent = bodies(&server, "POST", "/inscripciones").await;
    assert_eq!(sent.len(), 10);
    let student_ids: HashSet<i64> = sent
        .iter()
        .map(|b| b["estudianteId"].as_i64().unwrap())
        .collect();
    assert!(student_ids.is_subset(&HashSet::from([1, 2, 3])));
    assert!(sent
        .iter()
        .all(|b| (1..=5).contains(&b["cursoId"].as_i64().unwrap())));

    assert_eq!(*progress.updates.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    assert!(*progress.finished.lock().unwrap());
}

#[tokio::test]
async fn test_empty_student_pool_submits_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [], "last": true})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_enrollments(&server, 0).await;

    let sources = TempDir::new().unwrap();
    let progress = Arc::new(RecordingProgress::default());

    let summary = orchestrator(config_for(&server), &sources)
        .with_progress(progress.clone())
        .run()
        .await;

    assert!(summary.reports.is_empty());
    assert_eq!(summary.skipped_sources.len(), 4);
    assert_eq!(summary.enrollments.student_origin, PoolOrigin::Fetched);
    assert_eq!(summary.enrollments.submitted, 0);
    assert_eq!(summary.enrollments.course_origin, None);
    assert!(progress.updates.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_skipped_students_are_listed_from_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/estudiantes"))
        .and(query_param("page", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"content": [{"id": "s-1"}, {"id": "s-2"}], "last": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cursos"))
        .and(query_param("page", "0"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 9}], "last": true})),
        )
        .mount(&server)
        .await;
    mount_enrollments(&server, 5).await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre\nAna\n");

    let mut config = config_for(&server);
    config.skip_students = true;
    config.enrollment_count = 5;
    config.course_selection = CourseSelection::Known;

    let summary = orchestrator(config, &sources).run().await;

    assert_eq!(summary.enrollments.student_origin, PoolOrigin::Fetched);
    assert_eq!(summary.enrollments.course_origin, Some(PoolOrigin::Fetched));
    assert_eq!(summary.enrollments.student_pool, 2);
    assert_eq!(summary.enrollments.succeeded, 5);

    for body in bodies(&server, "POST", "/inscripciones").await {
        assert!(body["estudianteId"] == "s-1" || body["estudianteId"] == "s-2");
        assert_eq!(body["cursoId"], 9);
    }
}

#[tokio::test]
async fn test_ingested_courses_feed_known_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cursos"))
        .respond_with(SequentialIds::starting_at(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/cursos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": [{"id": 1}], "last": true})),
        )
        .expect(0)
        .mount(&server)
        .await;
    mount_enrollments(&server, 10).await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre\nAna\n");
    write_source(&sources, "cursos.csv", "titulo,duration\nRust,40\nGo,30\n");

    let mut config = config_for(&server);
    config.course_selection = CourseSelection::Known;

    let summary = orchestrator(config, &sources).run().await;

    assert_eq!(summary.enrollments.course_origin, Some(PoolOrigin::Ingested));
    for body in bodies(&server, "POST", "/inscripciones").await {
        assert_eq!(body["estudianteId"], 1);
        let course = body["cursoId"].as_i64().unwrap();
        assert!(course == 500 || course == 501);
    }
}

#[tokio::test]
async fn test_archive_copies_read_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .mount(&server)
        .await;
    mount_enrollments(&server, 2).await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre\nAna\n");

    let mut config = config_for(&server);
    config.archive = true;
    config.enrollment_count = 2;
    config.course_selection = CourseSelection::Range;

    let summary = orchestrator(config, &sources).run().await;

    let expected = archive_key("students.csv", summary.started_at.date_naive());
    assert_eq!(summary.archived, vec![expected.clone()]);
    assert!(sources.path().join(&expected).exists());
}

#[tokio::test]
async fn test_batches_drain_before_the_next_starts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .mount(&server)
        .await;
    let delay = Duration::from_millis(150);
    let responder = TimedResponder::new(delay);
    let arrivals = responder.arrivals();
    Mock::given(method("POST"))
        .and(path("/inscripciones"))
        .respond_with(responder)
        .expect(8)
        .mount(&server)
        .await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre\nAna\n");

    let mut config = config_for(&server);
    config.concurrency = 10;
    config.batch_size = 4;
    config.enrollment_count = 8;
    config.course_selection = CourseSelection::Range;

    let summary = orchestrator(config, &sources).run().await;
    assert_eq!(summary.enrollments.batches, 2);
    assert_eq!(summary.enrollments.succeeded, 8);

    let times = sorted_arrivals(&arrivals);
    assert_eq!(times.len(), 8);
    // A batch smaller than the pool runs entirely in parallel
    assert_eq!(max_in_flight(&times, delay), 4);
    // The second batch waits for the slowest request of the first
    assert!(times[4] - times[3] >= delay);
}

#[tokio::test]
async fn test_natural_keys_do_not_leak_between_runs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/estudiantes"))
        .respond_with(SequentialIds::starting_at(1))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/instructores"))
        .respond_with(IdFromField::new("nombre", "inst-"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cursos"))
        .respond_with(SequentialIds::starting_at(500))
        .expect(2)
        .mount(&server)
        .await;
    mount_enrollments(&server, 4).await;

    let sources = TempDir::new().unwrap();
    write_source(&sources, "students.csv", "nombre\nAna\n");
    write_source(&sources, "instructores.csv", "nombre\nAda\n");
    write_source(&sources, "cursos.csv", "titulo,instructores\nRust,Ada\n");

    let mut config = config_for(&server);
    config.enrollment_count = 2;
    config.course_selection = CourseSelection::Range;
    let orchestrator = orchestrator(config, &sources);

    orchestrator.run().await;
    std::fs::remove_file(sources.path().join("instructores.csv")).unwrap();
    let second = orchestrator.run().await;

    assert!(second.skipped_sources.contains(&EntityKind::Instructors));
    let courses = bodies(&server, "POST", "/cursos").await;
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["instructores"], json!(["inst-Ada"]));
    assert_eq!(courses[1]["instructores"], json!([]));
}
