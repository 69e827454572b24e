/// Split text into sentence-bounded chunks of at most `max_len` characters.
///
/// Sentence terminators stay attached to their sentence. Sentences longer
/// than `max_len` are split on word boundaries; a single word longer than
/// `max_len` becomes its own chunk.
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for sentence in sentences(text) {
        if sentence.chars().count() <= max_len {
            chunks.push(sentence.to_string());
            continue;
        }

        let mut current = String::new();
        for word in sentence.split_whitespace() {
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };

            if needed > max_len && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
    }

    if chunks.is_empty() && !text.trim().is_empty() {
        chunks.push(text.trim().to_string());
    }
    chunks
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            // Keep runs like "?!" or "..." together
            while let Some((_, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    chars.next();
                } else {
                    break;
                }
            }
            let end = chars.peek().map(|(j, _)| *j).unwrap_or(text.len());
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
