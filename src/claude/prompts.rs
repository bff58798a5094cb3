//! Prompt templates for the AI-backed modules.

use crate::event::ChangeEvent;

/// System prompt for change summarization.
pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a senior engineer reviewing activity in a git repository. \
Summarize the change you are given for a team chat channel: what changed, \
why it likely changed, and anything reviewers should look at. Be concise \
(at most five sentences), concrete, and skip pleasantries.";

/// System prompt for docstring generation.
pub const DOCSTRING_SYSTEM_PROMPT: &str = "\
You write precise, idiomatic documentation comments. Given a source \
fragment and a list of undocumented definitions, produce one short \
docstring per definition in the conventional style of the language. \
Return only the docstrings, one block per definition, no commentary.";

/// Renders a change event into the user prompt for summarization.
pub fn summary_prompt(event: &ChangeEvent) -> String {
    match event {
        ChangeEvent::Commit(change) => {
            let commit = &change.commit;
            let mut prompt = format!(
                "New commit {} by {} <{}>:\n\nMessage:\n{}\n\nFiles:\n",
                commit.short_hash(),
                commit.author,
                commit.email,
                commit.message.trim(),
            );
            for file in &commit.files {
                prompt.push_str(&format!(
                    "  {} {} (+{} -{})\n",
                    file.status, file.path, file.insertions, file.deletions
                ));
            }
            prompt
        }
        ChangeEvent::Staged(change) => format!(
            "Staged file {} ({}).\n\nContent snapshot:\n{}\n",
            change.record.path, change.record.description, change.record.content
        ),
        ChangeEvent::LocalEdit(change) => format!(
            "Local edit: {} was {} (git status {}).\n\nContent snapshot:\n{}\n",
            change.record.path, change.record.kind, change.record.status, change.record.content
        ),
        ChangeEvent::File(change) => format!(
            "A file changed in the repository: {}.",
            change
                .path
                .as_deref()
                .map_or_else(|| "path unknown".to_string(), |p| p.display().to_string())
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{normalize, EditKind, LocalEditRecord, RawChange};
    use std::path::Path;

    #[test]
    fn summary_prompt_names_the_file() {
        let event = normalize(
            RawChange::LocalEdit(LocalEditRecord {
                path: "src/main.rs".to_string(),
                kind: EditKind::Modified,
                date: chrono::Utc::now(),
                status: "M".to_string(),
                description: "Modified".to_string(),
                content: "fn main() {}".to_string(),
            }),
            Path::new("/tmp/repo"),
        );

        let prompt = summary_prompt(&event);
        assert!(prompt.contains("src/main.rs"));
        assert!(prompt.contains("modified"));
    }
}
