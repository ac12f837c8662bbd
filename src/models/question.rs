use serde::{Deserialize, Serialize};

/// 每道题的选项数量
pub const OPTION_COUNT: usize = 4;

/// 单道题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// 题干
    pub question: String,
    /// 四个选项，按返回顺序保存
    pub options: Vec<String>,
    /// 正确答案，必须与某个选项完全一致
    pub correct_answer: String,
}

impl Question {
    pub fn new(
        question: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_answer: correct_answer.into(),
        }
    }

    /// 判断所选选项是否正确
    pub fn is_correct(&self, option: &str) -> bool {
        option == self.correct_answer
    }

    /// 题目结构是否完整：题干非空、四个互不相同的选项、答案恰好命中一个选项
    pub fn is_well_formed(&self) -> bool {
        if self.question.trim().is_empty() || self.options.len() != OPTION_COUNT {
            return false;
        }
        let distinct = self
            .options
            .iter()
            .enumerate()
            .all(|(i, a)| self.options[i + 1..].iter().all(|b| a != b));
        let hits = self
            .options
            .iter()
            .filter(|o| **o == self.correct_answer)
            .count();
        distinct && hits == 1
    }
}

/// 一次会话的题目列表
///
/// 只保证非空，不保证长度等于请求数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QuestionBatch(Vec<Question>);

impl QuestionBatch {
    /// 空列表返回 None
    pub fn new(questions: Vec<Question>) -> Option<Self> {
        if questions.is_empty() {
            None
        } else {
            Some(Self(questions))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.0.get(index)
    }

    /// 结构不完整的题目下标
    pub fn malformed_indices(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.is_well_formed())
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Question {
        Question::new("2 + 2 = ?", ["3", "4", "5", "6"], "4")
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{"question":"Q","options":["a","b","c","d"],"correctAnswer":"c"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.correct_answer, "c");
        assert!(q.is_correct("c"));
        assert!(!q.is_correct("a"));
    }

    #[test]
    fn test_well_formed() {
        assert!(sample().is_well_formed());

        let three = Question::new("Q", ["a", "b", "c"], "a");
        assert!(!three.is_well_formed());

        let dup = Question::new("Q", ["a", "a", "c", "d"], "c");
        assert!(!dup.is_well_formed());

        let missing = Question::new("Q", ["a", "b", "c", "d"], "e");
        assert!(!missing.is_well_formed());

        let blank = Question::new(" ", ["a", "b", "c", "d"], "a");
        assert!(!blank.is_well_formed());
    }

    #[test]
    fn test_batch_rejects_empty() {
        assert!(QuestionBatch::new(Vec::new()).is_none());

        let batch = QuestionBatch::new(vec![
            sample(),
            Question::new("Q", ["a", "b"], "a"),
        ])
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.malformed_indices(), vec![1]);
    }
}
