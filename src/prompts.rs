//! Prompt construction: pure mappings from (document, persona, task) to the
//! content payload sent upstream. Deterministic by construction.

use crate::error::{MedimindError, Result};
use crate::models::{Content, Document, DocumentKind, Part, Persona, SummaryFocus};

pub fn system_instruction(persona: Persona) -> &'static str {
    match persona {
        Persona::Professional => {
            "You are a professional medical assistant. Your tone should be formal, clear, and precise. Provide accurate answers based strictly on the provided document."
        }
        Persona::Empathetic => {
            "You are an empathetic and caring medical assistant. Your tone should be supportive, understanding, and gentle. Provide answers with a compassionate approach, while remaining factually accurate based on the provided document."
        }
        Persona::Concise => {
            "You are a medical assistant that gets straight to the point. Your tone should be direct and brief. Provide concise answers, focusing only on the essential information from the provided document."
        }
    }
}

pub fn summary_prompt(focus: SummaryFocus) -> &'static str {
    match focus {
        SummaryFocus::KeyPoints => {
            "Summarize the key points of the following medical document in 3-4 bullet points. Focus on the main diagnosis, critical findings, and primary instructions."
        }
        SummaryFocus::TreatmentPlan => {
            "Extract and summarize the treatment plan from the following medical document. List all medications with dosages, therapies, and follow-up instructions in a clear, itemized format."
        }
        SummaryFocus::Diagnosis => {
            "Identify and summarize the diagnosis from the following medical document. State the primary diagnosis clearly and list any secondary or differential diagnoses mentioned."
        }
    }
}

pub fn question_prompt(query: &str) -> String {
    format!("QUESTION: {query}")
}

pub fn verification_prompt(answer: &str) -> String {
    format!("GENERATED ANSWER:\n---\n{answer}\n---")
}

pub fn suggestions_prompt(summary: &str) -> String {
    format!("SUMMARY:\n---\n{summary}\n---")
}

/// Pairs an instruction with the document body. Text documents become a
/// single text part; image documents a two-part payload with inline bytes.
pub fn build_contents(document: &Document, prompt: &str) -> Result<Content> {
    match document.kind {
        DocumentKind::Text => Ok(Content::from_parts(vec![Part::text(format!(
            "{prompt}\n\nDOCUMENT:\n---\n{}\n---",
            document.content
        ))])),
        DocumentKind::Image => {
            let mime_type = document.mime_type.as_deref().ok_or_else(|| {
                MedimindError::InvalidDocument(
                    "image document is missing a MIME type".to_string(),
                )
            })?;
            Ok(Content::from_parts(vec![
                Part::text(prompt),
                Part::inline_data(mime_type, document.content.clone()),
            ]))
        }
    }
}
