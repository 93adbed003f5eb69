use std::collections::HashMap;

use crate::models::question::Question;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub total_marks: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub percentage: f64,
}

/// Marks MCQ answers (`questionId -> optionId`, both hex).
///
/// A question scores its `ansmarks` when the chosen option is the one flagged
/// correct. The percentage counts correct answers over all questions of the
/// exam, not marks, and is 0 for an exam without questions.
pub fn score_answers(questions: &[Question], answers: &HashMap<String, String>) -> Score {
    let mut total_marks = 0u32;
    let mut correct_answers = 0u32;

    for question in questions {
        let Some(qid) = question.id.map(|id| id.to_hex()) else {
            continue;
        };
        let Some(chosen) = answers.get(&qid) else {
            continue;
        };
        if let Some(correct) = question.correct_option() {
            if correct.id.to_hex() == *chosen {
                total_marks = total_marks.saturating_add(question.ansmarks);
                correct_answers += 1;
            }
        }
    }

    let total_questions = questions.len() as u32;
    let percentage = if total_questions > 0 {
        f64::from(correct_answers) / f64::from(total_questions) * 100.0
    } else {
        0.0
    };

    Score {
        total_marks,
        correct_answers,
        total_questions,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionOption;
    use chrono::Utc;
    use mongodb::bson::oid::ObjectId;

    fn question(ansmarks: u32) -> (Question, String, String) {
        let right = ObjectId::new();
        let wrong = ObjectId::new();
        let q = Question {
            id: Some(ObjectId::new()),
            exam_id: ObjectId::new(),
            question: "?".into(),
            options: vec![
                QuestionOption {
                    id: wrong,
                    option_text: "no".into(),
                    is_correct: false,
                },
                QuestionOption {
                    id: right,
                    option_text: "yes".into(),
                    is_correct: true,
                },
            ],
            ansmarks,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        (q, right.to_hex(), wrong.to_hex())
    }

    fn qid(q: &Question) -> String {
        q.id.unwrap().to_hex()
    }

    #[test]
    fn test_all_correct() {
        let (q1, r1, _) = question(1);
        let (q2, r2, _) = question(3);
        let answers = HashMap::from([(qid(&q1), r1), (qid(&q2), r2)]);

        let score = score_answers(&[q1, q2], &answers);
        assert_eq!(score.total_marks, 4);
        assert_eq!(score.correct_answers, 2);
        assert_eq!(score.percentage, 100.0);
    }

    #[test]
    fn test_partial_and_unanswered() {
        let (q1, r1, _) = question(2);
        let (q2, _, w2) = question(2);
        let (q3, _, _) = question(2);
        let (q4, _, _) = question(2);
        let answers = HashMap::from([(qid(&q1), r1), (qid(&q2), w2)]);

        let score = score_answers(&[q1, q2, q3, q4], &answers);
        assert_eq!(score.total_marks, 2);
        assert_eq!(score.correct_answers, 1);
        assert_eq!(score.total_questions, 4);
        assert_eq!(score.percentage, 25.0);
    }

    #[test]
    fn test_percentage_counts_answers_not_marks() {
        let (q1, r1, _) = question(10);
        let (q2, _, _) = question(1);
        let answers = HashMap::from([(qid(&q1), r1)]);

        let score = score_answers(&[q1, q2], &answers);
        assert_eq!(score.total_marks, 10);
        assert_eq!(score.percentage, 50.0);
    }

    #[test]
    fn test_exam_without_questions() {
        let score = score_answers(&[], &HashMap::from([("x".into(), "y".into())]));
        assert_eq!(score.total_marks, 0);
        assert_eq!(score.percentage, 0.0);
    }

    #[test]
    fn test_question_without_correct_option_scores_nothing() {
        let (mut q, r, _) = question(5);
        for o in &mut q.options {
            o.is_correct = false;
        }
        let answers = HashMap::from([(qid(&q), r)]);
        assert_eq!(score_answers(&[q], &answers).total_marks, 0);
    }
}
