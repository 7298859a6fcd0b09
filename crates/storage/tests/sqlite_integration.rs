use exam_core::model::{
    ChoiceId, ExamDocument, ExamSetId, PreparedQuestion, QuestionId, QuestionOutcome, SessionMode,
    SessionReport, UserId,
};
use exam_core::time::fixed_now;
use storage::repository::{
    ExamSetRepository, NewExamSetRecord, QuestionProgressRepository, SessionResultRecord,
    SessionResultRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

const DOC: &str = r#"{ "questions": [
    { "id": "q1", "text": "2 * 3?", "explanation": "Times table.", "choices": [
        { "id": "a", "identifier": "A", "text": "6", "isCorrect": true },
        { "id": "b", "identifier": "B", "text": "5" }
    ] },
    { "id": "q2", "text": "10 / 2?", "choices": [
        { "id": "a", "identifier": "A", "text": "2" },
        { "id": "b", "identifier": "B", "text": "5", "isCorrect": true }
    ] }
] }"#;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn new_record(title: &str, owner: &str) -> NewExamSetRecord {
    NewExamSetRecord::new(
        title,
        UserId::new(owner),
        ExamDocument::from_json(DOC).unwrap(),
        fixed_now(),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_exam_set_document() {
    let repo = connect("memdb_exam_roundtrip").await;
    let id = repo.insert_exam_set(new_record("Arithmetic", "alice")).await.unwrap();

    let fetched = repo.get_exam_set(id).await.unwrap().expect("exam set");
    assert_eq!(fetched.title(), "Arithmetic");
    assert_eq!(fetched.owner(), &UserId::new("alice"));
    assert_eq!(fetched.questions().len(), 2);
    assert_eq!(fetched.questions()[0].explanation(), Some("Times table."));
    assert!(!fetched.is_shared());
    assert_eq!(fetched.created_at(), fixed_now());

    assert!(repo.get_exam_set(ExamSetId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_tracks_sharing_likes_and_delete() {
    let repo = connect("memdb_exam_sharing").await;
    let id = repo.insert_exam_set(new_record("Shared", "alice")).await.unwrap();
    repo.insert_exam_set(new_record("Private", "alice")).await.unwrap();

    repo.set_shared(id, true).await.unwrap();
    let bob = UserId::new("bob");
    assert_eq!(repo.toggle_like(id, &bob).await.unwrap(), (true, 1));
    assert_eq!(repo.toggle_like(id, &UserId::new("carol")).await.unwrap(), (true, 2));

    let shared = repo.list_shared_exam_sets(10).await.unwrap();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].like_count(), 2);

    let mine = repo.list_exam_sets(&UserId::new("alice"), 10).await.unwrap();
    assert_eq!(mine.len(), 2);

    repo.delete_exam_set(id).await.unwrap();
    assert!(matches!(
        repo.delete_exam_set(id).await,
        Err(StorageError::NotFound)
    ));
    assert!(matches!(
        repo.toggle_like(id, &bob).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_counts_each_user_like_once() {
    let repo = connect("memdb_exam_likes").await;
    let id = repo.insert_exam_set(new_record("Shared", "alice")).await.unwrap();
    let bob = UserId::new("bob");

    assert_eq!(repo.toggle_like(id, &bob).await.unwrap(), (true, 1));
    assert_eq!(repo.toggle_like(id, &bob).await.unwrap(), (false, 0));
    assert_eq!(repo.toggle_like(id, &bob).await.unwrap(), (true, 1));
    assert_eq!(repo.get_exam_set(id).await.unwrap().unwrap().like_count(), 1);

    repo.migrate().await.unwrap();
    assert_eq!(repo.get_exam_set(id).await.unwrap().unwrap().like_count(), 1);
}

#[tokio::test]
async fn sqlite_persists_session_results_with_outcomes() {
    let repo = connect("memdb_results").await;
    let exam_id = repo.insert_exam_set(new_record("Arithmetic", "bob")).await.unwrap();
    let exam = repo.get_exam_set(exam_id).await.unwrap().unwrap();

    let outcomes = vec![
        QuestionOutcome::resolve(
            PreparedQuestion::with_order(&exam.questions()[0], &[1, 0]),
            Some(ChoiceId::new("A")),
            4,
        ),
        QuestionOutcome::resolve(PreparedQuestion::unshuffled(&exam.questions()[1]), None, 30),
    ];
    let report =
        SessionReport::finalize(outcomes, SessionMode::Review, fixed_now(), fixed_now()).unwrap();
    let record = SessionResultRecord::from_report(UserId::new("bob"), exam_id, &report).unwrap();

    let id = repo.append_result(&record).await.unwrap();
    let fetched = repo.get_result(id).await.unwrap();
    assert_eq!(fetched, record);
    assert_eq!(fetched.score, 1);
    assert_eq!(fetched.total_questions, 2);
    assert_eq!(fetched.questions_data[0].question().choices()[0].id().as_str(), "B");

    let rows = repo
        .list_results(&UserId::new("bob"), Some(exam_id), 10)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, id);

    let none = repo.list_results(&UserId::new("carol"), None, 10).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn sqlite_upserts_question_progress() {
    let repo = connect("memdb_progress").await;
    let exam_id = repo.insert_exam_set(new_record("Arithmetic", "dana")).await.unwrap();
    let user = UserId::new("dana");
    let q1 = QuestionId::new("q1");

    let first = repo
        .record_attempt(&user, exam_id, &q1, false, fixed_now())
        .await
        .unwrap();
    assert_eq!(first.attempt_count, 1);

    let later = fixed_now() + chrono::Duration::minutes(3);
    let second = repo.record_attempt(&user, exam_id, &q1, true, later).await.unwrap();
    assert_eq!(second.attempt_count, 2);
    assert!(second.last_result);
    assert_eq!(second.last_attempted, later);

    repo.record_attempt(&user, exam_id, &QuestionId::new("q2"), false, later)
        .await
        .unwrap();
    let all = repo.list_progress(&user, exam_id).await.unwrap();
    let ids: Vec<_> = all.iter().map(|p| p.question_id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q2"]);
}
