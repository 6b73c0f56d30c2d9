use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::models::{FeedbackStatus, RetrievedChunk, Session, SessionListRequest};
use crate::rag::tracer::ReasoningTrace;

/// Fields written when a session is created; everything else is
/// initialised by the log.
pub struct NewSession {
    pub query: String,
    pub query_embedding: Vec<f32>,
    pub answer: String,
    pub retrieved: Vec<RetrievedChunk>,
    pub trace: ReasoningTrace,
}

/// Persistent record of each (query, answer, retrieved chunks, feedback)
/// tuple. A session is written once by its own request; feedback
/// finalises it exactly once.
pub struct SessionLog {
    rows: RwLock<Vec<Session>>,
    persist_path: PathBuf,
}

impl SessionLog {
    pub fn open_or_create(persist_path: &Path) -> Result<Self> {
        let rows = if persist_path.exists() {
            let data = std::fs::read_to_string(persist_path)?;
            serde_json::from_str(&data).unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            rows: RwLock::new(rows),
            persist_path: persist_path.to_path_buf(),
        })
    }

    /// Single atomic write of a complete session. The retrieved list
    /// must carry gapless 1-based ranks.
    pub fn create(&self, new: NewSession) -> Result<i64> {
        for (i, entry) in new.retrieved.iter().enumerate() {
            if entry.rank != i + 1 {
                return Err(CoreError::Internal(format!(
                    "retrieved list has rank {} at position {}",
                    entry.rank,
                    i + 1
                )));
            }
        }

        let mut rows = self.rows.write();
        let id = rows.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        rows.push(Session {
            id,
            query: new.query,
            query_embedding: new.query_embedding,
            answer: new.answer,
            retrieved: new.retrieved,
            trace: new.trace,
            feedback_status: FeedbackStatus::Pending,
            correction: None,
            notes: None,
            created_at: chrono::Utc::now(),
        });
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Session> {
        let rows = self.rows.read();
        rows.iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))
    }

    /// Filtered listing, newest first. Returns (total matching, page).
    pub fn list(&self, req: &SessionListRequest) -> (usize, Vec<Session>) {
        let rows = self.rows.read();

        let mut matching: Vec<&Session> = rows
            .iter()
            .filter(|s| {
                if let Some(has_feedback) = req.has_feedback {
                    if (s.feedback_status != FeedbackStatus::Pending) != has_feedback {
                        return false;
                    }
                }
                if let Some(is_correct) = req.is_correct {
                    let correct = s.feedback_status == FeedbackStatus::Correct;
                    if s.feedback_status == FeedbackStatus::Pending || correct != is_correct {
                        return false;
                    }
                }
                true
            })
            .collect();

        matching.sort_by(|a, b| b.id.cmp(&a.id));
        let total = matching.len();

        let page = matching
            .into_iter()
            .skip(req.offset)
            .take(req.limit)
            .cloned()
            .collect();

        (total, page)
    }

    /// Atomically finalise feedback on a session: set the status, store
    /// the correction/notes, and stamp was_useful on the listed
    /// retrieved entries. Rejects a session that is already finalised,
    /// which makes feedback application at-most-once.
    ///
    /// Returns the updated session.
    pub fn finalise_feedback(
        &self,
        id: i64,
        is_correct: bool,
        usefulness: &HashMap<i64, bool>,
        correction: Option<String>,
        notes: Option<String>,
    ) -> Result<Session> {
        let mut rows = self.rows.write();
        let session = rows
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("session {id}")))?;

        if session.feedback_status != FeedbackStatus::Pending {
            return Err(CoreError::AlreadyFinalised(id));
        }

        session.feedback_status = if is_correct {
            FeedbackStatus::Correct
        } else {
            FeedbackStatus::Incorrect
        };
        session.correction = correction;
        session.notes = notes;

        for entry in session.retrieved.iter_mut() {
            if let Some(useful) = usefulness.get(&entry.chunk_id) {
                entry.was_useful = Some(*useful);
            }
        }

        let updated = session.clone();
        super::save_atomic(&self.persist_path, &*rows)?;
        Ok(updated)
    }

    /// (total, correct, incorrect, pending) for stats.
    pub fn status_counts(&self) -> (usize, usize, usize, usize) {
        let rows = self.rows.read();
        let mut correct = 0;
        let mut incorrect = 0;
        let mut pending = 0;
        for s in rows.iter() {
            match s.feedback_status {
                FeedbackStatus::Correct => correct += 1,
                FeedbackStatus::Incorrect => incorrect += 1,
                FeedbackStatus::Pending => pending += 1,
            }
        }
        (rows.len(), correct, incorrect, pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::tracer::WorkflowTracer;

    fn log() -> (tempfile::TempDir, SessionLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = SessionLog::open_or_create(&dir.path().join("sessions.json")).unwrap();
        (dir, log)
    }

    fn retrieved(ids: &[i64]) -> Vec<RetrievedChunk> {
        ids.iter()
            .enumerate()
            .map(|(i, &chunk_id)| RetrievedChunk {
                chunk_id,
                rank: i + 1,
                similarity: 0.9 - 0.1 * i as f32,
                effective_score: 0.9 - 0.1 * i as f32,
                workflow_boosted: false,
                was_useful: None,
            })
            .collect()
    }

    fn new_session(query: &str, ids: &[i64]) -> NewSession {
        NewSession {
            query: query.to_string(),
            query_embedding: vec![1.0, 0.0],
            answer: "answer".to_string(),
            retrieved: retrieved(ids),
            trace: WorkflowTracer::new(query).snapshot(),
        }
    }

    #[test]
    fn test_create_assigns_monotone_ids_and_pending_status() {
        let (_dir, log) = log();
        let a = log.create(new_session("q1", &[10])).unwrap();
        let b = log.create(new_session("q2", &[10, 11])).unwrap();
        assert!(b > a);
        assert_eq!(log.get(a).unwrap().feedback_status, FeedbackStatus::Pending);
    }

    #[test]
    fn test_create_rejects_gapped_ranks() {
        let (_dir, log) = log();
        let mut new = new_session("q", &[10, 11]);
        new.retrieved[1].rank = 3;
        assert!(matches!(log.create(new), Err(CoreError::Internal(_))));
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let (_dir, log) = log();
        assert!(matches!(log.get(5), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn test_finalise_sets_status_and_usefulness() {
        let (_dir, log) = log();
        let id = log.create(new_session("q", &[10, 11, 12])).unwrap();

        let usefulness = HashMap::from([(10, true), (12, false)]);
        let session = log
            .finalise_feedback(id, true, &usefulness, None, Some("good".into()))
            .unwrap();

        assert_eq!(session.feedback_status, FeedbackStatus::Correct);
        assert_eq!(session.retrieved[0].was_useful, Some(true));
        assert_eq!(session.retrieved[1].was_useful, None);
        assert_eq!(session.retrieved[2].was_useful, Some(false));
        assert_eq!(session.notes.as_deref(), Some("good"));
    }

    #[test]
    fn test_second_finalise_is_rejected() {
        let (_dir, log) = log();
        let id = log.create(new_session("q", &[10])).unwrap();
        let usefulness = HashMap::from([(10, true)]);

        log.finalise_feedback(id, true, &usefulness, None, None).unwrap();
        let err = log
            .finalise_feedback(id, false, &usefulness, None, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyFinalised(sid) if sid == id));

        // First outcome sticks
        let session = log.get(id).unwrap();
        assert_eq!(session.feedback_status, FeedbackStatus::Correct);
    }

    #[test]
    fn test_list_filters_and_pages() {
        let (_dir, log) = log();
        for i in 0..5 {
            log.create(new_session(&format!("q{i}"), &[10])).unwrap();
        }
        let finalised = log.create(new_session("q-done", &[10])).unwrap();
        log.finalise_feedback(finalised, false, &HashMap::new(), None, None)
            .unwrap();

        let (total, page) = log.list(&SessionListRequest {
            has_feedback: Some(false),
            is_correct: None,
            limit: 3,
            offset: 0,
        });
        assert_eq!(total, 5);
        assert_eq!(page.len(), 3);
        // Newest first
        assert!(page[0].id > page[1].id);

        let (total, page) = log.list(&SessionListRequest {
            has_feedback: None,
            is_correct: Some(false),
            limit: 10,
            offset: 0,
        });
        assert_eq!(total, 1);
        assert_eq!(page[0].id, finalised);
    }

    #[test]
    fn test_status_counts() {
        let (_dir, log) = log();
        let a = log.create(new_session("a", &[10])).unwrap();
        log.create(new_session("b", &[10])).unwrap();
        log.finalise_feedback(a, true, &HashMap::new(), None, None).unwrap();

        let (total, correct, incorrect, pending) = log.status_counts();
        assert_eq!((total, correct, incorrect, pending), (2, 1, 0, 1));
    }

    #[test]
    fn test_reload_preserves_feedback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let id = {
            let log = SessionLog::open_or_create(&path).unwrap();
            let id = log.create(new_session("q", &[10])).unwrap();
            log.finalise_feedback(id, true, &HashMap::from([(10, true)]), None, None)
                .unwrap();
            id
        };

        let reopened = SessionLog::open_or_create(&path).unwrap();
        let session = reopened.get(id).unwrap();
        assert_eq!(session.feedback_status, FeedbackStatus::Correct);
        assert_eq!(session.retrieved[0].was_useful, Some(true));
    }
}
