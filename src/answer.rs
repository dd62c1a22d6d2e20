//! Answer composition: retrieved units become a context block, the
//! context and question fill a fixed prompt, and the completion
//! service's output is returned verbatim.

use crate::{
    error::Result,
    retrieve::{Retrieved, Retriever},
    services::{TextCompletion, TextEmbedder},
};

/// Prompt sent to the completion service. `{context}` and `{question}`
/// are substituted before the call.
const PROMPT_TEMPLATE: &str = "\
You are a helpful assistant. Use the provided context from a PDF (and \
images/tables) to answer the user's question.
If the question asks for an exact table cell but the user doesn't know \
headers, try to find relevant rows by approximate values or synonyms.
If the context isn't sufficient, use your general knowledge but say when \
you are inferring.

Context:
{context}

Question: {question}
Answer:";

/// Concatenate retrieved units into the context block, preserving
/// retriever order. Each unit contributes one tagged line followed by a
/// blank line.
pub fn compose_context(hits: &[Retrieved]) -> String {
    let mut context = String::new();
    for hit in hits {
        context.push_str(&format!("[source: {}] {}\n\n", hit.metadata, hit.text));
    }
    context
}

/// Substitute the context and question into the prompt template.
pub fn fill_prompt(question: &str, context: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Compose the prompt from already-retrieved hits and run the
/// completion. The completion's text is returned as-is: the service
/// always produces an answer, uncertainty included.
pub fn compose_answer<L: TextCompletion>(
    question: &str,
    hits: &[Retrieved],
    completion: &L,
) -> Result<String> {
    let prompt = fill_prompt(question, &compose_context(hits));
    completion.complete(&prompt)
}

/// Retrieve and answer in one step.
pub fn answer_question<E, L>(
    question: &str,
    retriever: &Retriever<'_, E>,
    completion: &L,
    k: usize,
) -> Result<String>
where
    E: TextEmbedder,
    L: TextCompletion,
{
    let hits = retriever.retrieve(question, k)?;
    compose_answer(question, &hits, completion)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::{
        indexer::build_bundle,
        unit::{RetrievableUnit, UnitMetadata},
    };

    struct ConstEmbedder;

    impl TextEmbedder for ConstEmbedder {
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    struct RecordingCompletion {
        prompts: RefCell<Vec<String>>,
    }

    impl TextCompletion for RecordingCompletion {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok("the model's answer".into())
        }
    }

    fn hit(text: &str, metadata: UnitMetadata) -> Retrieved {
        Retrieved {
            text: text.into(),
            metadata,
            distance: 0.0,
        }
    }

    #[test]
    fn context_preserves_order_and_tags_sources() {
        let hits = vec![
            hit(
                "chunk one",
                UnitMetadata::Text {
                    source: "report".into(),
                    chunk: 0,
                },
            ),
            hit(
                "a chart",
                UnitMetadata::Image {
                    source: "pic.png".into(),
                },
            ),
            hit(
                "1 | 2",
                UnitMetadata::Table {
                    source: "t.json".into(),
                },
            ),
        ];

        let context = compose_context(&hits);
        assert_eq!(
            context,
            "[source: text:report:0] chunk one\n\n\
             [source: image:pic.png] a chart\n\n\
             [source: table:t.json] 1 | 2\n\n"
        );
    }

    #[test]
    fn prompt_contains_question_and_context() {
        let prompt = fill_prompt("what is it?", "[source: x] y\n\n");
        assert!(prompt.contains("Question: what is it?"));
        assert!(prompt.contains("Context:\n[source: x] y\n\n"));
        assert!(prompt.ends_with("Answer:"));
        assert!(prompt.contains("approximate values or synonyms"));
        assert!(prompt.contains("say when you are inferring"));
    }

    #[test]
    fn answer_is_returned_verbatim() {
        let units = vec![RetrievableUnit::new(
            "only unit",
            UnitMetadata::Text {
                source: "doc".into(),
                chunk: 0,
            },
        )];
        let bundle = build_bundle(units, &ConstEmbedder).unwrap();
        let retriever = Retriever::new(&bundle, &ConstEmbedder);
        let completion = RecordingCompletion {
            prompts: RefCell::new(Vec::new()),
        };

        let answer =
            answer_question("a question", &retriever, &completion, 6).unwrap();

        assert_eq!(answer, "the model's answer");
        let prompt = completion.prompts.borrow()[0].clone();
        assert!(prompt.contains("[source: text:doc:0] only unit"));
        assert!(prompt.contains("Question: a question"));
    }
}
