//! Offline RAG evaluation.
//!
//! 1. Ingest (cache-aware) and build the index.
//! 2. Generate questions from the first `eval.max_documents` chunks.
//! 3. For each question, retrieve `retrieval.eval_top_k` passages, answer
//!    with the QA prompt, then judge correctness, faithfulness and
//!    relevancy. Each judge reply is reduced to 0/1 by whether it contains
//!    `Yes`.
//! 4. Write `evaluation_results.csv`, `evaluation_questions.csv` and
//!    `average_scores.txt` to `paths.eval_output_dir`.
//!
//! Questions are processed sequentially; any remote failure aborts the run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::Config;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::{build_indexes, VectorCollection};
use crate::ingest::ingest_documents;
use crate::llm::{complete_text, AgentMessage, ChatModel, CompletionRequest};
use crate::models::Chunk;
use crate::prompts;

#[derive(Debug, Clone, Serialize)]
pub struct EvalQuestion {
    pub question: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalResult {
    pub question: String,
    pub answer: String,
    pub correctness: u8,
    pub faithfulness: u8,
    pub relevancy: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageScores {
    pub correctness: f64,
    pub faithfulness: f64,
    pub relevancy: f64,
}

/// Question lines of a generation reply: the `count` lines following the
/// first one, trimmed, with blanks dropped.
pub fn parse_questions(output: &str, count: usize) -> Vec<String> {
    output
        .split('\n')
        .skip(1)
        .take(count)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect()
}

/// A judge reply passes when it contains `Yes`.
pub fn judge_passes(output: &str) -> bool {
    output.contains("Yes")
}

/// Per-axis means. An empty run averages to zero.
pub fn average_scores(results: &[EvalResult]) -> AverageScores {
    if results.is_empty() {
        return AverageScores {
            correctness: 0.0,
            faithfulness: 0.0,
            relevancy: 0.0,
        };
    }
    let n = results.len() as f64;
    let mean = |f: fn(&EvalResult) -> u8| results.iter().map(|r| f(r) as f64).sum::<f64>() / n;
    AverageScores {
        correctness: mean(|r| r.correctness),
        faithfulness: mean(|r| r.faithfulness),
        relevancy: mean(|r| r.relevancy),
    }
}

fn request(config: &Config, prompt: String, temperature: f32) -> CompletionRequest {
    CompletionRequest::new(config.llm.eval_model.clone(), vec![AgentMessage::User(prompt)])
        .temperature(temperature)
}

pub async fn generate_questions(
    config: &Config,
    chat: &dyn ChatModel,
    chunks: &[Chunk],
) -> Result<Vec<EvalQuestion>> {
    let per_doc = config.eval.questions_per_document;
    let mut questions = Vec::new();
    for chunk in chunks.iter().take(config.eval.max_documents) {
        let prompt = prompts::question_prompt(&chunk.text, per_doc);
        let output = complete_text(chat, &request(config, prompt, config.llm.question_temperature))
            .await
            .context("Question generation failed")?;
        questions.extend(
            parse_questions(&output, per_doc)
                .into_iter()
                .map(|question| EvalQuestion { question }),
        );
    }
    tracing::info!(count = questions.len(), "generated evaluation questions");
    Ok(questions)
}

pub async fn evaluate_question(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
    collection: &VectorCollection,
    question: &str,
) -> Result<EvalResult> {
    let query_vec = embed_query(embedder, question).await?;
    let hits = collection
        .query(&query_vec, config.retrieval.eval_top_k)
        .await?;
    let passages: Vec<&str> = hits.iter().map(|h| h.document.as_str()).collect();
    let qa_context = passages.join("\n\n");
    let judge_context = passages.join(" ");

    let answer = complete_text(
        chat,
        &request(config, prompts::qa_prompt(&qa_context, question), 0.0),
    )
    .await
    .context("Answer generation failed")?;

    let correctness = complete_text(
        chat,
        &request(config, prompts::correctness_prompt(question, &answer), 0.0),
    )
    .await
    .context("Correctness judge failed")?;
    let relevancy = complete_text(
        chat,
        &request(config, prompts::relevancy_prompt(question, &judge_context), 0.0),
    )
    .await
    .context("Relevancy judge failed")?;
    let faithfulness = complete_text(
        chat,
        &request(config, prompts::faithfulness_prompt(&answer, &judge_context), 0.0),
    )
    .await
    .context("Faithfulness judge failed")?;

    Ok(EvalResult {
        question: question.to_string(),
        answer,
        correctness: judge_passes(&correctness) as u8,
        faithfulness: judge_passes(&faithfulness) as u8,
        relevancy: judge_passes(&relevancy) as u8,
    })
}

/// Run the full evaluation and write its outputs.
pub async fn evaluate(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
) -> Result<(Vec<EvalResult>, AverageScores)> {
    let chunks = ingest_documents(config, chat, embedder).await?;
    let collection = build_indexes(config, embedder).await?;
    let questions = generate_questions(config, chat, &chunks).await?;

    let mut results = Vec::with_capacity(questions.len());
    for (i, q) in questions.iter().enumerate() {
        tracing::info!(n = i + 1, total = questions.len(), "evaluating question");
        results.push(evaluate_question(config, chat, embedder, &collection, &q.question).await?);
    }

    let averages = average_scores(&results);
    write_outputs(&config.paths.eval_output_dir, &questions, &results, &averages)?;
    Ok((results, averages))
}

pub fn write_outputs(
    dir: &Path,
    questions: &[EvalQuestion],
    results: &[EvalResult],
    averages: &AverageScores,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    write_csv(
        &dir.join("evaluation_results.csv"),
        results,
        &["question", "answer", "correctness", "faithfulness", "relevancy"],
    )?;
    write_csv(&dir.join("evaluation_questions.csv"), questions, &["question"])?;
    std::fs::write(dir.join("average_scores.txt"), format_averages(averages))?;
    Ok(())
}

/// Serialize `rows` with a header line, written even when `rows` is empty.
fn write_csv<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn format_averages(averages: &AverageScores) -> String {
    format!(
        "Correctness scores: {}\nFaithfulness scores: {}\nRelevancy scores: {}\n",
        averages.correctness, averages.faithfulness, averages.relevancy
    )
}

/// CLI entry point for `mindcare evaluate`.
pub async fn run_evaluate(
    config: &Config,
    chat: &dyn ChatModel,
    embedder: &dyn EmbeddingProvider,
) -> Result<()> {
    let (results, averages) = evaluate(config, chat, embedder).await?;
    println!("evaluate");
    println!("  questions: {}", results.len());
    print!("{}", format_averages(&averages));
    println!("  output: {}", config.paths.eval_output_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn result(c: u8, f: u8, r: u8) -> EvalResult {
        EvalResult {
            question: "q".into(),
            answer: "a".into(),
            correctness: c,
            faithfulness: f,
            relevancy: r,
        }
    }

    #[test]
    fn question_lines_skip_header_and_blanks() {
        let output = "Questions:\n1. What is MDD?\n\n  2. What is GAD?  \n3. c\n4. d\n5. e\n6. extra";
        let qs = parse_questions(output, 5);
        assert_eq!(qs, vec!["1. What is MDD?", "2. What is GAD?", "3. c", "4. d"]);
    }

    #[test]
    fn judge_is_substring_match() {
        assert!(judge_passes("Yes, it is."));
        assert!(judge_passes("Answer: Yes"));
        assert!(!judge_passes("yes"));
        assert!(!judge_passes("No"));
    }

    #[test]
    fn averages_per_axis() {
        let avg = average_scores(&[result(1, 0, 1), result(0, 0, 1)]);
        assert_eq!(
            avg,
            AverageScores {
                correctness: 0.5,
                faithfulness: 0.0,
                relevancy: 1.0
            }
        );
        assert_eq!(average_scores(&[]).correctness, 0.0);
    }

    #[test]
    fn outputs_are_written() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("eval_results");
        let questions = vec![EvalQuestion {
            question: "Tiêu chuẩn chẩn đoán trầm cảm, là gì?".into(),
        }];
        let results = vec![result(1, 1, 0)];
        write_outputs(&dir, &questions, &results, &average_scores(&results)).unwrap();

        let res = std::fs::read_to_string(dir.join("evaluation_results.csv")).unwrap();
        assert!(res.starts_with("question,answer,correctness,faithfulness,relevancy\n"));
        assert!(res.contains("q,a,1,1,0"));
        let qs = std::fs::read_to_string(dir.join("evaluation_questions.csv")).unwrap();
        assert!(qs.contains("\"Tiêu chuẩn chẩn đoán trầm cảm, là gì?\""));
        let avg = std::fs::read_to_string(dir.join("average_scores.txt")).unwrap();
        assert_eq!(
            avg,
            "Correctness scores: 1\nFaithfulness scores: 1\nRelevancy scores: 0\n"
        );
    }
}
