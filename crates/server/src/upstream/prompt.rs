//! Prompt templates.

use super::GenerateRequest;
use lyrebird_core::Variant;

/// Build the prompt for `request`.
pub fn build_prompt(request: &GenerateRequest<'_>) -> String {
    match request.variant {
        Variant::Translation => translation_prompt(request),
        Variant::Phonetic => phonetic_prompt(request),
    }
}

fn phonetic_prompt(request: &GenerateRequest<'_>) -> String {
    let line_count = request.line_count();
    let GenerateRequest {
        artist,
        title,
        text,
        ..
    } = request;

    format!(
        r#"You are a linguistics expert specializing in CJK phonetic transcription. Your task is to detect the language of the lyrics and transcribe them to the correct phonetic system.

**Instructions**:

1.  **Line Integrity**: The output MUST contain exactly {line_count} lines. Each transcribed line must correspond to the original line's position. Do not add, merge, or remove lines.

2.  **Language Detection & Transcription**:
    - **If Japanese**: Transcribe to **Hepburn Romaji**.
        - Use macrons for long vowels (e.g., とうきょう → Tōkyō).
        - Particles: は→wa, へ→e, を→o.
        - Syllabic 'ん' before vowel/y -> n' (e.g., しんや → shin'ya).
    - **If Korean**: Transcribe to **Revised Romanization (Romaja)**.
    - **If Chinese**: Transcribe to **Hanyu Pinyin** with tone marks.

3.  **Preserve Content**:
    - Leave all non-CJK text (English, numbers) and punctuation unchanged.
    - Preserve empty lines.

**Verification**:
- [ ] Output has exactly {line_count} lines.
- [ ] Language correctly identified and transcribed.
- [ ] Non-CJK text and punctuation are preserved.

**Song Info**:
- Artist: {artist}
- Title: {title}

**Output Format**:
- Respond with ONLY a single, raw JSON object.
- Do NOT use markdown code fences.
- JSON schema: {{"phonetic": "transcribed_lyrics_with_\n_for_newlines", "detected_language": "ja|ko|zh"}}

**Input Lyrics**:
----
{text}
----"#
    )
}

fn translation_prompt(request: &GenerateRequest<'_>) -> String {
    let line_count = request.line_count();
    let GenerateRequest {
        artist,
        title,
        text,
        ..
    } = request;

    format!(
        r#"You are a professional lyrics translator and musical storyteller. Your task is to translate the provided song lyrics into natural, artistic, and emotionally resonant Korean. Your translation should capture both the artistic sensibility and accuracy of the original, conveying the song's flow and emotions naturally.

**--- Rules you MUST follow ---**

**1. Line Count MUST Match (Very Important):**
- The output must have exactly the same number of lines ({line_count}) as the input.
- If a line is empty in the input, the corresponding output line must also be empty.
- If a line contains only a single word, translate it as a single line.
- Do not merge, split, or omit any lines.
- To maintain the natural flow, never split or merge lines arbitrarily during translation.
- Double-check that you have not skipped any lines or left any part untranslated.

**2. Prioritize Artistry and Emotion:**
- Go beyond literal translation; express the original mood and emotion in beautiful, natural Korean.
- Ensure the translation flows naturally and can be sung as Korean lyrics.
- Avoid stiff or unnatural expressions; use poetic and musical language.

**3. Respect Nuance and Cultural Elements:**
- Properly adapt metaphors, idioms, and cultural elements into Korean.
- The original emotion (e.g., joy, sadness, anger) should be clearly reflected in the translation.

**4. Final Check:**
- Make sure the result array has exactly {line_count} elements. If not, revise it.
- Double-check that you have not skipped any lines or left any part untranslated or blank (except when the original line is also empty).

**--- Example ---**

**Input (5 lines):**
Hello world

How are you?
♪
(Yeah)

**Output (5 lines, structure preserved):**
["안녕 세상아", "", "잘 지내?", "♪", "(Yeah)"]

**--- Song Info ---**
- Artist: {artist}
- Title: {title}

**--- Output Format ---**
- Return ONLY a single JSON object.
- Do NOT use markdown, code blocks, or any extra text. Just pure JSON.
- JSON structure: {{"vi": ["1st translated line", "2nd line", ...]}}

**--- Lyrics to Translate ---**
----
{text}
----"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(variant: Variant) -> GenerateRequest<'static> {
        GenerateRequest {
            artist: "YOASOBI",
            title: "Idol",
            text: "無敵の笑顔で\n\n荒らすメディア",
            variant,
        }
    }

    #[test]
    fn test_translation_prompt_embeds_song() {
        let prompt = build_prompt(&request(Variant::Translation));
        assert!(prompt.contains("exactly the same number of lines (3)"));
        assert!(prompt.contains("- Artist: YOASOBI"));
        assert!(prompt.contains("- Title: Idol"));
        assert!(prompt.contains(r#"{"vi": ["1st translated line""#));
        assert!(prompt.ends_with("荒らすメディア\n----"));
    }

    #[test]
    fn test_phonetic_prompt_asks_for_romanization() {
        let prompt = build_prompt(&request(Variant::Phonetic));
        assert!(prompt.contains("exactly 3 lines"));
        assert!(prompt.contains("Hepburn Romaji"));
        assert!(prompt.contains("Revised Romanization"));
        assert!(prompt.contains("Hanyu Pinyin"));
        assert!(prompt.contains(r#""detected_language": "ja|ko|zh""#));
        assert!(!prompt.contains(r#"{"vi""#));
    }
}
