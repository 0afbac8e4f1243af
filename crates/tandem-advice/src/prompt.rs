//! Prompt assembly for advice and post-session summaries.

use tandem_types::TranscriptEntry;

/// Number of trailing transcript entries included in an advice prompt.
pub const ADVICE_CONTEXT_WINDOW: usize = 20;

/// Builds the live coaching-advice prompt from recent conversation context.
///
/// The mentor is assumed to be Speaker 0. Counterpart personality notes,
/// when available, are appended to bias the advice; their absence changes
/// nothing else about the prompt.
pub fn advice_prompt(context: &[TranscriptEntry], personality_notes: Option<&str>) -> String {
    let conversation = render_conversation(context);

    let mut prompt = format!(
        "You are a coach observing a live 1-on-1 meeting. Analyze the \
         conversation log below and give the mentor (assumed to be Speaker 0) \
         a single sentence of advice: the next question to ask, or feedback \
         worth giving right now.\n\n\
         Conversation log:\n{conversation}\n"
    );

    if let Some(notes) = personality_notes {
        prompt.push_str(&format!(
            "\nNotes about the conversation counterpart:\n{notes}\n"
        ));
    }

    prompt
}

/// Builds the post-session summary prompt: a Markdown digest with decisions
/// and next actions.
pub fn summary_prompt(transcript: &[TranscriptEntry]) -> String {
    let conversation = render_conversation(transcript);

    format!(
        "Analyze the following 1-on-1 meeting conversation log and write a \
         summary in Markdown.\n\n\
         ## Format\n\
         **Meeting summary**\n\
         (around 200 words)\n\n\
         **Decisions and next actions**\n\
         - (action 1)\n\
         - (action 2)\n\n\
         ## Conversation log\n{conversation}\n"
    )
}

fn render_conversation(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("Speaker {}: {}", entry.speaker, entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(speaker: u32, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            speaker,
            text: text.to_string(),
        }
    }

    #[test]
    fn advice_prompt_renders_speakers_in_order() {
        let context = vec![
            entry(0, "how was the release"),
            entry(1, "rough, we slipped twice"),
        ];

        let prompt = advice_prompt(&context, None);
        let first = prompt.find("Speaker 0: how was the release").unwrap();
        let second = prompt.find("Speaker 1: rough, we slipped twice").unwrap();
        assert!(first < second);
        assert!(!prompt.contains("counterpart"));
    }

    #[test]
    fn advice_prompt_includes_notes_when_present() {
        let context = vec![entry(0, "hello")];
        let prompt = advice_prompt(&context, Some("gets quiet under pressure"));
        assert!(prompt.contains("gets quiet under pressure"));
    }

    #[test]
    fn summary_prompt_carries_the_whole_transcript() {
        let transcript = vec![entry(0, "first"), entry(1, "second"), entry(0, "third")];
        let prompt = summary_prompt(&transcript);
        assert!(prompt.contains("Speaker 0: first"));
        assert!(prompt.contains("Speaker 1: second"));
        assert!(prompt.contains("Speaker 0: third"));
        assert!(prompt.contains("**Decisions and next actions**"));
    }
}
