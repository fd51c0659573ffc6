//! Recursive character splitting with ordered separator fallback.
//!
//! Text is split on the first separator of [`DEFAULT_SEPARATORS`] that occurs in it. Pieces that
//! still reach the chunk size are split again with the separators that follow, down to single
//! characters. Small pieces are merged greedily into windows of at most `chunk_size` characters,
//! and each new window keeps up to `chunk_overlap` characters from the tail of the previous one.
//!
//! Separators stay attached to the start of the piece that follows them, so every chunk is a
//! contiguous slice of the input and carries its byte offset. The separator order decides the
//! chunk boundaries; changing it changes what gets embedded.
//!
//! Lengths are counted in Unicode scalar values.

use std::collections::VecDeque;

use super::types::ChunkingError;

/// Separators tried in priority order. The trailing empty string means "split into characters".
pub const DEFAULT_SEPARATORS: [&str; 11] = [
    "\n\n",
    "\n",
    " ",
    ".",
    ",",
    "\u{200b}", // zero-width space
    "\u{ff0c}", // fullwidth comma
    "\u{3001}", // ideographic comma
    "\u{ff0e}", // fullwidth full stop
    "\u{3002}", // ideographic full stop
    "",
];

/// Default target chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between neighbouring chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// One segment of a document, ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk within the document.
    pub index: usize,
    /// Chunk content; never empty.
    pub text: String,
    /// Byte offset of `text` within the source document.
    pub byte_offset: usize,
}

impl TextChunk {
    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits extracted text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &'static [&'static str],
}

/// Byte range of the source text plus its length in characters.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

impl Span {
    fn new(text: &str, start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            chars: text[start..end].chars().count(),
        }
    }
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: &DEFAULT_SEPARATORS,
        }
    }
}

impl TextSegmenter {
    /// Build a segmenter using [`DEFAULT_SEPARATORS`].
    ///
    /// `chunk_overlap` must be strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: chunk_overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: &DEFAULT_SEPARATORS,
        })
    }

    /// Target chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between neighbouring chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into ordered, non-empty chunks.
    ///
    /// Returns an empty vector when the input is empty or whitespace only.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let whole = Span::new(text, 0, text.len());
        self.split_span(text, whole, self.separators)
            .into_iter()
            .enumerate()
            .map(|(index, span)| TextChunk {
                index,
                text: text[span.start..span.end].to_string(),
                byte_offset: span.start,
            })
            .collect()
    }

    fn split_span(&self, text: &str, span: Span, separators: &'static [&'static str]) -> Vec<Span> {
        let (separator, fallback) = choose_separator(&text[span.start..span.end], separators);
        let mut chunks = Vec::new();
        let mut pending = Vec::new();

        for piece in split_keeping_separator(text, span, separator) {
            if piece.chars < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(text, &pending));
                pending.clear();
            }

            if fallback.is_empty() {
                chunks.extend(trimmed(text, piece.start, piece.end));
            } else {
                chunks.extend(self.split_span(text, piece, fallback));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(text, &pending));
        }

        chunks
    }

    /// Greedily combine consecutive pieces into windows, carrying the overlap forward.
    fn merge(&self, text: &str, pieces: &[Span]) -> Vec<Span> {
        let mut merged = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            if total + piece.chars > self.chunk_size && !window.is_empty() {
                merged.extend(join_window(text, &window));
                while total > self.chunk_overlap
                    || (total + piece.chars > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= front.chars,
                        None => break,
                    }
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }

        merged.extend(join_window(text, &window));
        merged
    }
}

/// Pick the first separator present in `text`, returning it with the separators after it.
fn choose_separator(
    text: &str,
    separators: &'static [&'static str],
) -> (&'static str, &'static [&'static str]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[position + 1..]);
        }
    }
    (separators.last().copied().unwrap_or(""), &[])
}

/// Split a span on `separator`, attaching each separator to the piece that follows it.
fn split_keeping_separator(text: &str, span: Span, separator: &str) -> Vec<Span> {
    let slice = &text[span.start..span.end];

    if separator.is_empty() {
        return slice
            .char_indices()
            .map(|(offset, ch)| Span {
                start: span.start + offset,
                end: span.start + offset + ch.len_utf8(),
                chars: 1,
            })
            .collect();
    }

    let mut boundaries = vec![0];
    boundaries.extend(slice.match_indices(separator).map(|(offset, _)| offset));
    boundaries.push(slice.len());

    boundaries
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .map(|pair| Span::new(text, span.start + pair[0], span.start + pair[1]))
        .collect()
}

fn join_window(text: &str, window: &VecDeque<Span>) -> Option<Span> {
    let (first, last) = (window.front()?, window.back()?);
    trimmed(text, first.start, last.end)
}

/// Strip surrounding whitespace from a byte range, dropping it if nothing remains.
fn trimmed(text: &str, start: usize, end: usize) -> Option<Span> {
    let slice = &text[start..end];
    let inner = slice.trim();
    if inner.is_empty() {
        return None;
    }
    let leading = slice.len() - slice.trim_start().len();
    Some(Span::new(text, start + leading, start + leading + inner.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[TextChunk]) -> Vec<&str> {
        chunks.iter().map(|chunk| chunk.text.as_str()).collect()
    }

    fn sample_document() -> String {
        let sentences = [
            "Conan the barbarian crossed the frozen wastes of Nordheim.",
            "The wind howled through the pines, carrying snow and the smell of smoke.",
            "Atali waited at the edge of the ice, laughing.",
            "Nobody in Cimmeria believed the tale when he returned, but the scars were real.",
        ];
        let mut document = String::new();
        for paragraph in 0..6 {
            for (index, sentence) in sentences.iter().enumerate() {
                if index > 0 {
                    document.push(' ');
                }
                document.push_str(sentence);
            }
            if paragraph % 2 == 0 {
                document.push('\n');
                document.push_str("Line break within the paragraph.");
            }
            document.push_str("\n\n");
        }
        document
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert_eq!(
            TextSegmenter::new(0, 0).unwrap_err(),
            ChunkingError::InvalidChunkSize
        );
        assert_eq!(
            TextSegmenter::new(10, 10).unwrap_err(),
            ChunkingError::OverlapTooLarge {
                overlap: 10,
                chunk_size: 10
            }
        );
    }

    #[test]
    fn default_matches_documented_budget() {
        let segmenter = TextSegmenter::default();
        assert_eq!(segmenter.chunk_size(), 1000);
        assert_eq!(segmenter.chunk_overlap(), 200);
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_chunks() {
        let segmenter = TextSegmenter::new(10, 2).unwrap();
        assert!(segmenter.split("").is_empty());
        assert!(segmenter.split(" \n\n\t ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let segmenter = TextSegmenter::default();
        let chunks = segmenter.split("  Test content\n");
        assert_eq!(texts(&chunks), vec!["Test content"]);
        assert_eq!(chunks[0].byte_offset, 2);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn words_are_merged_without_overlap() {
        let segmenter = TextSegmenter::new(10, 0).unwrap();
        let chunks = segmenter.split("one two three four five");
        assert_eq!(texts(&chunks), vec!["one two", "three", "four five"]);
    }

    #[test]
    fn overlap_repeats_trailing_words() {
        let segmenter = TextSegmenter::new(10, 4).unwrap();
        let chunks = segmenter.split("one two three four five");
        assert_eq!(texts(&chunks), vec!["one two", "two three", "four five"]);
        let offsets: Vec<_> = chunks.iter().map(|chunk| chunk.byte_offset).collect();
        assert_eq!(offsets, vec![0, 4, 14]);
    }

    #[test]
    fn paragraph_breaks_take_priority() {
        let segmenter = TextSegmenter::new(15, 0).unwrap();
        let chunks = segmenter.split("alpha beta\n\ngamma delta");
        assert_eq!(texts(&chunks), vec!["alpha beta", "gamma delta"]);
        assert_eq!(chunks[1].byte_offset, 12);
    }

    #[test]
    fn oversized_pieces_recurse_into_finer_separators() {
        let segmenter = TextSegmenter::new(5, 0).unwrap();
        let chunks = segmenter.split("aaaaaaaa bb");
        assert_eq!(texts(&chunks), vec!["aaaaa", "aaa", "bb"]);
        let offsets: Vec<_> = chunks.iter().map(|chunk| chunk.byte_offset).collect();
        assert_eq!(offsets, vec![0, 5, 9]);
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let segmenter = TextSegmenter::new(5, 0).unwrap();
        let chunks = segmenter.split("abcdefghijkl");
        assert_eq!(texts(&chunks), vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn ideographic_full_stop_is_a_separator() {
        let segmenter = TextSegmenter::new(3, 0).unwrap();
        let chunks = segmenter.split("你好。世界。");
        assert_eq!(texts(&chunks), vec!["你好", "。世界", "。"]);
        assert_eq!(chunks[1].byte_offset, "你好".len());
    }

    #[test]
    fn segmentation_is_deterministic() {
        let segmenter = TextSegmenter::new(120, 30).unwrap();
        let document = sample_document();
        assert_eq!(segmenter.split(&document), segmenter.split(&document));
    }

    #[test]
    fn chunks_reconstruct_the_document() {
        let segmenter = TextSegmenter::new(100, 20).unwrap();
        let document = sample_document();
        let chunks = segmenter.split(&document);
        assert!(chunks.len() > 1);

        let mut covered = 0;
        for (position, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.char_len() <= 100, "chunk too long: {:?}", chunk.text);

            let end = chunk.byte_offset + chunk.text.len();
            assert_eq!(&document[chunk.byte_offset..end], chunk.text);

            if chunk.byte_offset > covered {
                let gap = &document[covered..chunk.byte_offset];
                assert!(gap.trim().is_empty(), "lost text between chunks: {gap:?}");
            }
            covered = covered.max(end);
        }
        assert!(document[covered..].trim().is_empty());
    }

    #[test]
    fn neighbouring_chunks_share_bounded_overlap() {
        let segmenter = TextSegmenter::new(100, 20).unwrap();
        let document = sample_document();
        let chunks = segmenter.split(&document);

        for pair in chunks.windows(2) {
            assert!(pair[1].byte_offset >= pair[0].byte_offset);
            let previous_end = pair[0].byte_offset + pair[0].text.len();
            if pair[1].byte_offset < previous_end {
                let shared = document[pair[1].byte_offset..previous_end].chars().count();
                assert!(shared <= 20, "overlap of {shared} characters");
            }
        }
    }
}
