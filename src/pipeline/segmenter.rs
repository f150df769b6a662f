//! Sentence segmentation.
//!
//! [`Segmenter::segment`] splits raw text on a configurable set of
//! terminators. Each fragment is trimmed, empty fragments are dropped, and
//! the fragment keeps its terminator. Fragments that end at a line break or
//! at the end of the input get the default marker instead.

use crate::config::SegmenterConfig;

/// One sentence of the submitted text, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUnit {
    /// Zero-based position among the units of one submission.
    pub index: usize,
    /// Trimmed sentence text, ending with its terminator.
    pub text: String,
}

/// Splits text into [`InputUnit`]s. Pure and restartable.
///
/// ```
/// use proofreader::pipeline::Segmenter;
///
/// let units = Segmenter::default().segment("今日は晴れです。明日は雨でしょう。");
/// assert_eq!(units.len(), 2);
/// assert_eq!(units[1].text, "明日は雨でしょう。");
/// ```
#[derive(Debug, Clone)]
pub struct Segmenter {
    terminators: Vec<char>,
    default_marker: char,
}

impl Segmenter {
    pub fn new(terminators: Vec<char>, default_marker: char) -> Self {
        Self {
            terminators,
            default_marker,
        }
    }

    pub fn from_config(config: &SegmenterConfig) -> Self {
        let default_marker = if config.default_marker.is_whitespace() {
            log::warn!("segmenter: whitespace default marker ignored; using 。");
            '。'
        } else {
            config.default_marker
        };
        Self::new(config.terminators.clone(), default_marker)
    }

    pub fn segment(&self, text: &str) -> Vec<InputUnit> {
        let mut units = Vec::new();
        let mut start = 0;

        for (pos, ch) in text.char_indices() {
            if self.terminators.contains(&ch) {
                self.push_unit(&mut units, &text[start..pos], Some(ch));
                start = pos + ch.len_utf8();
            }
        }
        self.push_unit(&mut units, &text[start..], None);

        units
    }

    fn push_unit(&self, units: &mut Vec<InputUnit>, fragment: &str, terminator: Option<char>) {
        let body = fragment.trim();
        if body.is_empty() {
            return;
        }
        let marker = match terminator {
            Some(ch) if !ch.is_whitespace() => ch,
            _ => self.default_marker,
        };
        units.push(InputUnit {
            index: units.len(),
            text: format!("{body}{marker}"),
        });
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&SegmenterConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Whether `ch` can close a unit produced by `segmenter`.
    fn is_marker(segmenter: &Segmenter, ch: char) -> bool {
        ch == segmenter.default_marker
            || (!ch.is_whitespace() && segmenter.terminators.contains(&ch))
    }

    /// Input text with the marker and whitespace characters removed.
    fn content(segmenter: &Segmenter, text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_whitespace() && !is_marker(segmenter, *c))
            .collect()
    }

    fn texts(units: &[InputUnit]) -> Vec<&str> {
        units.iter().map(|u| u.text.as_str()).collect()
    }

    #[test]
    fn two_japanese_sentences() {
        let units = Segmenter::default().segment("今日は晴れです。明日は雨でしょう。");
        assert_eq!(texts(&units), vec!["今日は晴れです。", "明日は雨でしょう。"]);
        assert!(units.iter().all(|u| u.text.ends_with('。')));
        assert_eq!(units[0].index, 0);
        assert_eq!(units[1].index, 1);
    }

    #[test]
    fn keeps_each_sentences_own_terminator() {
        let units = Segmenter::default().segment("本当？すごい！行きましょう。");
        assert_eq!(texts(&units), vec!["本当？", "すごい！", "行きましょう。"]);
    }

    #[test]
    fn no_terminator_yields_single_unit_with_marker() {
        let units = Segmenter::default().segment("  私は学生です  ");
        assert_eq!(texts(&units), vec!["私は学生です。"]);
    }

    #[test]
    fn line_breaks_split_and_get_default_marker() {
        let units = Segmenter::default().segment("おはよう\r\nこんにちは\n\nこんばんは。");
        assert_eq!(texts(&units), vec!["おはよう。", "こんにちは。", "こんばんは。"]);
    }

    #[test]
    fn whitespace_and_separators_only_yield_nothing() {
        let segmenter = Segmenter::default();
        assert!(segmenter.segment("").is_empty());
        assert!(segmenter.segment("   \n\t  ").is_empty());
        assert!(segmenter.segment("。。！\n？").is_empty());
    }

    #[test]
    fn repeated_terminators_do_not_create_empty_units() {
        let units = Segmenter::default().segment("えっ！！！本当？？");
        assert_eq!(texts(&units), vec!["えっ！", "本当？"]);
    }

    #[test]
    fn custom_terminators() {
        let segmenter = Segmenter::new(vec!['.'], '.');
        let units = segmenter.segment("One. Two.Three");
        assert_eq!(texts(&units), vec!["One.", "Two.", "Three."]);
    }

    #[test]
    fn whitespace_default_marker_is_replaced() {
        let config = SegmenterConfig {
            terminators: vec!['\n'],
            default_marker: ' ',
        };
        let units = Segmenter::from_config(&config).segment("a\nb");
        assert_eq!(texts(&units), vec!["a。", "b。"]);
    }

    #[test]
    fn segmentation_is_restartable() {
        let segmenter = Segmenter::default();
        let text = "一。二。三。";
        assert_eq!(segmenter.segment(text), segmenter.segment(text));
    }

    proptest! {
        /// Every unit is non-empty and ends with a marker, and the units
        /// together keep the non-whitespace content of the input in order.
        #[test]
        fn units_preserve_content_and_end_with_marker(
            text in "[今日は晴ですabc .,。！？!?\n\r\t\u{3000}]{0,64}"
        ) {
            let segmenter = Segmenter::default();
            let units = segmenter.segment(&text);

            for (i, unit) in units.iter().enumerate() {
                prop_assert_eq!(unit.index, i);
                prop_assert!(!unit.text.trim().is_empty());
                let last = unit.text.chars().last();
                prop_assert!(last.is_some_and(|c| is_marker(&segmenter, c)), "{:?}", unit.text);
            }

            let joined: String = units.iter().map(|u| content(&segmenter, &u.text)).collect();
            prop_assert_eq!(joined, content(&segmenter, &text));
        }

        #[test]
        fn whitespace_only_input_yields_no_units(
            text in "[ \n\r\t\u{3000}]{0,32}"
        ) {
            prop_assert!(Segmenter::default().segment(&text).is_empty());
        }
    }
}
