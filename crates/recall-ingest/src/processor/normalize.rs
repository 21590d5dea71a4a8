//! Text normalization and large-document windowing.

/// Windowing applied to long documents before embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Texts longer than this many characters are windowed
    pub threshold: usize,
    /// Window length in characters
    pub window: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            threshold: 10_000,
            window: 1000,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    fn step(&self) -> usize {
        self.window.saturating_sub(self.overlap).max(1)
    }
}

/// Removes NUL and other non-whitespace control characters, then collapses
/// every whitespace run to a single space.
pub fn normalize_text(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_whitespace() || !c.is_control())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Overlapping character windows covering `text`. The last window always
/// ends at the end of the text.
pub fn split_windows(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let window = config.window.max(1);
    if chars.len() <= window {
        return vec![text.to_string()];
    }

    let step = config.step();
    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + window).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Text handed to the embedder plus the number of windows it was built from.
///
/// Texts over the threshold are windowed and the windows rejoined, so one
/// document always yields exactly one text.
pub fn prepare_for_embedding(text: &str, config: &ChunkConfig) -> (String, usize) {
    if text.chars().count() <= config.threshold {
        return (text.to_string(), 1);
    }

    let windows = split_windows(text, config);
    let count = windows.len();
    (windows.join(" "), count)
}
