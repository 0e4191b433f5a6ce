use lopdf::Document;
use tracing::{debug, warn};

/// Extract the text of every page, in page order, joined by newlines
pub(crate) fn extract_text(bytes: &[u8]) -> Result<String, String> {
    let document = Document::load_mem(bytes).map_err(|e| format!("failed to parse PDF: {}", e))?;

    // BTreeMap keyed by page number, so iteration is already in page order
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages = Vec::with_capacity(page_numbers.len());

    for page_number in page_numbers {
        match document.extract_text(&[page_number]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                warn!("Failed to extract text from PDF page {}: {}", page_number, e);
                pages.push(String::new());
            }
        }
    }

    debug!("Extracted text from {} PDF pages", pages.len());
    Ok(join_pages(&pages))
}

#[inline]
pub(crate) fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}
