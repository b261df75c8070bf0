//! Rendering helpers for the sections of the base instruction.

use std::collections::HashSet;

use crate::mcp::{InstructionSource, PromptDescriptor};

/// Loaded prompt content is cut to this many characters.
pub const LOADED_PROMPT_PREVIEW_CHARS: usize = 500;

/// Render a deterministic server-instruction block, ordered by provider.
pub fn render_instruction_block(sources: &[InstructionSource]) -> Option<String> {
    let normalized = normalize_sources(sources);
    if normalized.is_empty() {
        return None;
    }

    let sections: Vec<String> = normalized
        .iter()
        .map(|source| format!("[server:{}]\n{}", source.provider, source.instructions.trim()))
        .collect();

    Some(format!(
        "MCP server instructions:\n\n{}",
        sections.join("\n\n")
    ))
}

fn normalize_sources(sources: &[InstructionSource]) -> Vec<InstructionSource> {
    let mut sources = sources
        .iter()
        .filter(|source| !source.instructions.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>();
    sources.sort_by(|left, right| left.provider.cmp(&right.provider));

    let mut seen = HashSet::new();
    sources.retain(|source| seen.insert((source.provider.clone(), source.instructions.clone())));
    sources
}

/// One line per discovered prompt: name, description, arguments, provider.
pub fn render_prompt_listing(prompts: &[PromptDescriptor]) -> Option<String> {
    if prompts.is_empty() {
        return None;
    }

    let lines: Vec<String> = prompts
        .iter()
        .map(|prompt| {
            let mut line = format!("- {}", prompt.name);
            if !prompt.description.is_empty() {
                line.push_str(&format!(": {}", prompt.description));
            }
            if !prompt.arguments.is_empty() {
                let args: Vec<String> = prompt
                    .arguments
                    .iter()
                    .map(|arg| {
                        let mut rendered = arg.name.clone();
                        if let Some(description) = arg.description.as_deref().filter(|d| !d.is_empty()) {
                            rendered.push_str(&format!(" ({description})"));
                        }
                        if arg.required {
                            rendered.push_str(" [required]");
                        }
                        rendered
                    })
                    .collect();
                line.push_str(&format!(" (arguments: {})", args.join(", ")));
            }
            line.push_str(&format!(" [provider: {}]", prompt.provider));
            line
        })
        .collect();

    Some(format!("Available prompts:\n{}", lines.join("\n")))
}

/// Loaded prompt bodies, each capped at [`LOADED_PROMPT_PREVIEW_CHARS`].
pub fn render_loaded_prompts(loaded: &[(String, String)]) -> Option<String> {
    if loaded.is_empty() {
        return None;
    }

    let sections: Vec<String> = loaded
        .iter()
        .map(|(name, content)| format!("### {name}:\n{}", preview(content)))
        .collect();
    Some(format!("Loaded prompts:\n{}", sections.join("\n\n")))
}

fn preview(content: &str) -> String {
    match content.char_indices().nth(LOADED_PROMPT_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
