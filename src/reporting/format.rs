//! Text formatting helpers shared by the reporters

use crate::metrics::EvaluationSet;
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Default float format: five decimal places.
pub const DEFAULT_FLOAT_FORMAT: &str = "{:.5}";

/// Parse a float format (`"{}"` or `"{:.N}"`) into its precision.
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn parse_float_format(format: &str) -> Result<Option<usize>> {
    let inner = format
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| {
            Error::Validation(format!(
                "float_format must start with \"{{\" and end with \"}}\". Received: {format}"
            ))
        })?;
    if inner.is_empty() {
        return Ok(None);
    }
    inner
        .strip_prefix(":.")
        .and_then(|digits| digits.parse::<usize>().ok())
        .map(Some)
        .ok_or_else(|| {
            Error::Validation(format!(
                "float_format must be \"{{}}\" or \"{{:.N}}\". Received: {format}"
            ))
        })
}

/// Format `value` with an optional precision.
#[must_use]
pub fn format_float(value: f64, precision: Option<usize>) -> String {
    precision.map_or_else(|| format!("{value}"), |p| format!("{value:.p$}"))
}

/// Layout of [`format_fold_run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FoldRunMode {
    /// `F0/R1`
    #[default]
    Concise,
    /// `Fold/Run: 0/1`
    Verbose,
}

/// Label a fold/run pair. Either half may be absent.
#[must_use]
pub fn format_fold_run(fold: Option<usize>, run: Option<usize>, mode: FoldRunMode) -> String {
    let slash = if fold.is_some() && run.is_some() { "/" } else { "" };
    match mode {
        FoldRunMode::Verbose => {
            let mut out = String::new();
            if fold.is_some() {
                out.push_str("Fold");
            }
            out.push_str(slash);
            if run.is_some() {
                out.push_str("Run");
            }
            if fold.is_some() || run.is_some() {
                out.push_str(": ");
            }
            if let Some(f) = fold {
                out.push_str(&f.to_string());
            }
            out.push_str(slash);
            if let Some(r) = run {
                out.push_str(&r.to_string());
            }
            out
        }
        FoldRunMode::Concise => {
            let fold = fold.map(|f| format!("F{f}")).unwrap_or_default();
            let run = run.map(|r| format!("R{r}")).unwrap_or_default();
            format!("{fold}{slash}{run}")
        }
    }
}

/// Render evaluations as `OOF(roc=0.90000, f1=0.80000)  |  Holdout(...)`.
pub fn format_evaluation_results<'a, I>(results: I, separator: &str, precision: Option<usize>) -> String
where
    I: IntoIterator<Item = (EvaluationSet, &'a BTreeMap<String, f64>)>,
{
    results
        .into_iter()
        .map(|(set, values)| {
            let entries: Vec<String> = values
                .iter()
                .map(|(id, value)| format!("{id}={}", format_float(*value, precision)))
                .collect();
            format!("{}({})", set.label(), entries.join(", "))
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Append `Time: ...` to `content` when a time is given.
#[must_use]
pub fn add_time_to_content(content: &str, time: Option<&str>) -> String {
    match time {
        Some(time) if !time.is_empty() => {
            let gap = if content.is_empty() || content.ends_with(' ') {
                ""
            } else {
                "   "
            };
            format!("{content}{gap}Time: {time}")
        }
        _ => content.to_string(),
    }
}

/// Current local wall-clock time as `HH:MM:SS`.
#[must_use]
pub fn now_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// One piece of a block message.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    /// Text, separated from the previous item unless it starts with a digit or space
    Text(String),
    /// Number rendered with the block's float precision
    Number(f64),
}

impl From<&str> for BlockItem {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for BlockItem {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for BlockItem {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

/// Banner layout: a padded line, the message, and a padded line.
///
/// ```text
/// ############################   22:25:35   ############################
/// #   OOF RMSLE: 0.38592   HOLDOUT_RMSLE: 0.48759
/// ######################################################################
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFormat {
    /// Pad character
    pub pad: char,
    /// Minimum line width
    pub size: usize,
    /// Separator between items
    pub sep: String,
    /// Text embedded in the top line
    pub pre_embed: String,
    /// Text embedded in the bottom line
    pub post_embed: String,
    /// Pad characters at the start of the message line
    pub log_pad: usize,
    /// Float precision for numbers
    pub precision: Option<usize>,
}

impl Default for BlockFormat {
    fn default() -> Self {
        Self {
            pad: '#',
            size: 80,
            sep: "   ".to_string(),
            pre_embed: String::new(),
            post_embed: String::new(),
            log_pad: 1,
            precision: Some(5),
        }
    }
}

impl BlockFormat {
    /// Warning banner (`!` padding).
    #[must_use]
    pub fn warning() -> Self {
        Self {
            pad: '!',
            ..Self::default()
        }
    }

    /// Render the three-line block. Every line has even length.
    #[must_use]
    pub fn render(&self, items: &[BlockItem]) -> String {
        let pad = self.pad.to_string();
        let mut message = pad.repeat(self.log_pad);
        for item in items {
            match item {
                BlockItem::Text(text) => {
                    if !text.starts_with(|c: char| c.is_ascii_digit() || c == ' ') {
                        message.push_str(&self.sep);
                    }
                    message.push_str(text);
                }
                BlockItem::Number(value) => message.push_str(&format_float(*value, self.precision)),
            }
        }
        message.push_str(&self.sep);

        let embed = |text: &str| {
            if text.is_empty() {
                String::new()
            } else {
                format!("{0}{text}{0}", self.sep)
            }
        };
        let message = to_even(message);
        let pre_line = to_even(embed(&self.pre_embed));
        let post_line = to_even(embed(&self.post_embed));
        let size = self.size + self.size % 2;

        let (message_len, pre_len, post_len) = (
            message.chars().count(),
            pre_line.chars().count(),
            post_line.chars().count(),
        );
        let max_len = message_len.max(pre_len).max(post_len).max(size);
        let (mut pre_chars, mut post_chars) = (max_len - pre_len, max_len - post_len);
        if max_len == pre_len || max_len == post_len {
            pre_chars += 10;
            post_chars += 10;
        }

        let wrap = |line: &str, chars: usize| {
            let side = pad.repeat(chars / 2);
            format!("{side}{line}{side}")
        };
        format!(
            "{}\n{message}\n{}",
            wrap(&pre_line, pre_chars),
            wrap(&post_line, post_chars)
        )
    }
}

fn to_even(mut line: String) -> String {
    if line.chars().count() % 2 == 1 {
        line.push(' ');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_float_format() {
        assert_eq!(parse_float_format("{:.5}").unwrap(), Some(5));
        assert_eq!(parse_float_format("{}").unwrap(), None);
        assert!(parse_float_format(":.5").is_err());
        assert!(parse_float_format("{:>5}").is_err());
    }

    #[test]
    fn test_format_fold_run() {
        assert_eq!(format_fold_run(Some(0), Some(1), FoldRunMode::Concise), "F0/R1");
        assert_eq!(format_fold_run(Some(0), Some(1), FoldRunMode::Verbose), "Fold/Run: 0/1");
        assert_eq!(format_fold_run(None, Some(2), FoldRunMode::Verbose), "Run: 2");
        assert_eq!(format_fold_run(Some(3), None, FoldRunMode::Concise), "F3");
        assert_eq!(format_fold_run(None, None, FoldRunMode::Verbose), "");
    }

    #[test]
    fn test_format_evaluation_results() {
        let oof = BTreeMap::from([("roc".to_string(), 0.9), ("f1".to_string(), 0.8)]);
        let holdout = BTreeMap::from([("roc".to_string(), 0.85)]);
        let text = format_evaluation_results(
            [(EvaluationSet::Oof, &oof), (EvaluationSet::Holdout, &holdout)],
            "  |  ",
            Some(5),
        );
        assert_eq!(text, "OOF(f1=0.80000, roc=0.90000)  |  Holdout(roc=0.85000)");
    }

    #[test]
    fn test_add_time_to_content() {
        assert_eq!(add_time_to_content("Done", Some("12:00:00")), "Done   Time: 12:00:00");
        assert_eq!(add_time_to_content("Done ", Some("12:00:00")), "Done Time: 12:00:00");
        assert_eq!(add_time_to_content("Done", None), "Done");
    }

    #[test]
    fn test_block_lines_are_even_and_padded() {
        let block = BlockFormat::default().render(&["OOF RMSLE: ".into(), 0.385_923_758.into()]);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "#".repeat(80));
        assert_eq!(lines[1], "#   OOF RMSLE: 0.38592    ");
        assert!(lines.iter().all(|l| l.chars().count() % 2 == 0));
    }

    #[test]
    fn test_block_with_embed() {
        let format = BlockFormat {
            size: 70,
            pre_embed: "22:25:35".to_string(),
            ..BlockFormat::default()
        };
        let block = format.render(&["x".into()]);
        let first = block.lines().next().unwrap();
        assert_eq!(first, format!("{0}   22:25:35   {0}", "#".repeat(28)));
    }
}
