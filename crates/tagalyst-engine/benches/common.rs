// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_article(paragraphs: usize) -> String {
    let mut markup = String::from("<body>");
    for i in 0..paragraphs {
        markup.push_str(&format!(
            "<p>Paragraph {i} opens with <em>some emphasis</em> and closes with plain words about item {i}.</p>"
        ));
    }
    markup.push_str("</body>");
    markup
}

/// The same article with a new paragraph in front, so structural and
/// position anchors no longer verify.
#[allow(dead_code)]
pub fn generate_shifted_article(paragraphs: usize) -> String {
    generate_article(paragraphs).replacen("<body>", "<body><p>Breaking news first.</p>", 1)
}
