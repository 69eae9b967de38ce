//! Prompt composition for retrieval-augmented generation.
//!
//! With no retrieved documents the query goes to the backend as-is.
//! Otherwise the documents are joined with newlines and rendered, together
//! with the query, through one fixed question-answering template.

/// The retrieval template. `{question}` and `{context}` are substituted
/// exactly once each.
pub const RAG_TEMPLATE: &str = "You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question. If you don't know the answer, just say that you don't know. Use three sentences maximum and keep the answer concise. \n Question: {question} \n Context: {context} \n Answer:";

const QUESTION_SLOT: &str = "{question}";
const CONTEXT_SLOT: &str = "{context}";

/// Build the prompt sent to the backend.
///
/// Total for any input: substitution is positional, so braces inside the
/// query or the documents are copied through untouched.
pub fn compose(query: &str, documents: &[String]) -> String {
    if documents.is_empty() {
        return query.to_string();
    }

    let context = documents.join("\n");
    render(query, &context)
}

fn render(question: &str, context: &str) -> String {
    let mut out = String::with_capacity(RAG_TEMPLATE.len() + question.len() + context.len());
    let mut rest = RAG_TEMPLATE;

    // The template is a constant with each slot appearing once, question first.
    if let Some((head, tail)) = rest.split_once(QUESTION_SLOT) {
        out.push_str(head);
        out.push_str(question);
        rest = tail;
    }
    if let Some((head, tail)) = rest.split_once(CONTEXT_SLOT) {
        out.push_str(head);
        out.push_str(context);
        rest = tail;
    }
    out.push_str(rest);
    out
}
