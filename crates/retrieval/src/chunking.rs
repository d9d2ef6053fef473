/// Packs paragraphs into chunks of at most `max_chunk_chars`, heading prefix
/// included (a single longer paragraph becomes its own chunk). A markdown heading closes the current
/// chunk, and every chunk is prefixed with the heading it sits under.
pub fn chunk_document(body: &str, max_chunk_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut heading: Option<String> = None;
    let mut current = String::new();

    for paragraph in body.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with('#') {
            flush(&mut chunks, &mut current, heading.as_deref());

            // "## Title\nbody" written without a blank line
            let (title_line, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
            heading = Some(title_line.trim_start_matches('#').trim().to_string());
            current.push_str(rest.trim());
            continue;
        }

        let budget = max_chunk_chars.saturating_sub(prefix_len(heading.as_deref()));
        if !current.is_empty() && current.len() + trimmed.len() + 2 > budget {
            flush(&mut chunks, &mut current, heading.as_deref());
        }

        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(trimmed);
    }

    flush(&mut chunks, &mut current, heading.as_deref());
    chunks
}

fn prefix_len(heading: Option<&str>) -> usize {
    match heading {
        Some(heading) if !heading.is_empty() => heading.len() + 2,
        _ => 0,
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String, heading: Option<&str>) {
    let text = current.trim();
    if text.is_empty() {
        current.clear();
        return;
    }

    match heading {
        Some(heading) if !heading.is_empty() => chunks.push(format!("{heading}: {text}")),
        _ => chunks.push(text.to_string()),
    }
    current.clear();
}
