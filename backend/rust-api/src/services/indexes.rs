use anyhow::{Context, Result};
use mongodb::{
    bson::{doc, Document},
    options::IndexOptions,
    Database, IndexModel,
};

use crate::models::cheating_log::CheatingLog;
use crate::models::coding::{CodingQuestion, CodingSubmission};
use crate::models::question::Question;
use crate::models::result::ExamResult;
use crate::models::user::User;

fn index(keys: Document, name: &str, unique: bool, sparse: bool) -> IndexModel {
    let options = IndexOptions::builder()
        .name(name.to_string())
        .unique(unique.then_some(true))
        .sparse(sparse.then_some(true))
        .build();
    IndexModel::builder().keys(keys).options(options).build()
}

/// Indexes backing the uniqueness rules and the per-exam lookups
pub fn index_plan() -> Vec<(&'static str, Vec<IndexModel>)> {
    vec![
        (
            User::COLLECTION,
            vec![
                index(doc! { "email": 1 }, "email_unique", true, false),
                index(doc! { "userId": 1 }, "user_id_unique", true, true),
                index(doc! { "username": 1 }, "username_unique", true, true),
            ],
        ),
        (
            Question::COLLECTION,
            vec![index(doc! { "examId": 1, "createdAt": 1 }, "exam_questions", false, false)],
        ),
        (
            CodingQuestion::COLLECTION,
            vec![index(doc! { "examId": 1 }, "exam_coding_questions", false, false)],
        ),
        (
            CodingSubmission::COLLECTION,
            vec![
                index(
                    doc! { "questionId": 1, "userId": 1 },
                    "question_user_unique",
                    true,
                    false,
                ),
                index(doc! { "examId": 1, "userId": 1 }, "exam_user", false, false),
            ],
        ),
        (
            ExamResult::COLLECTION,
            vec![
                index(doc! { "examId": 1, "createdAt": -1 }, "exam_results", false, false),
                index(doc! { "userId": 1, "createdAt": -1 }, "user_results", false, false),
            ],
        ),
        (
            CheatingLog::COLLECTION,
            vec![index(
                doc! { "userId": 1, "examId": 1 },
                "user_exam_unique",
                true,
                false,
            )],
        ),
    ]
}

pub async fn ensure_indexes(mongo: &Database) -> Result<()> {
    for (collection, models) in index_plan() {
        let count = models.len();
        mongo
            .collection::<Document>(collection)
            .create_indexes(models)
            .await
            .with_context(|| format!("Failed to create indexes on {}", collection))?;
        tracing::debug!(collection, count, "Indexes ensured");
    }
    tracing::info!("MongoDB indexes ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_rules_are_indexed() {
        let plan = index_plan();
        let unique: Vec<(&str, Document)> = plan
            .iter()
            .flat_map(|(coll, models)| {
                models.iter().filter_map(move |m| {
                    let opts = m.options.as_ref()?;
                    opts.unique.filter(|u| *u).map(|_| (*coll, m.keys.clone()))
                })
            })
            .collect();

        assert!(unique.contains(&("users", doc! { "email": 1 })));
        assert!(unique.contains(&("users", doc! { "userId": 1 })));
        assert!(unique.contains(&("cheating_logs", doc! { "userId": 1, "examId": 1 })));
        assert!(unique.contains(&("coding_submissions", doc! { "questionId": 1, "userId": 1 })));
    }

    #[test]
    fn test_generated_ids_use_sparse_indexes() {
        let plan = index_plan();
        let (_, users) = plan.iter().find(|(c, _)| *c == "users").unwrap();
        let sparse: Vec<_> = users
            .iter()
            .filter(|m| m.options.as_ref().and_then(|o| o.sparse) == Some(true))
            .map(|m| m.keys.clone())
            .collect();
        assert_eq!(sparse, vec![doc! { "userId": 1 }, doc! { "username": 1 }]);
    }
}
