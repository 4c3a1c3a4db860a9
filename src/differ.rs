use crate::i18n::I18n;
use crate::storage::CommandRecord;
use colored::*;
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineTag {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: LineTag,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub words_inserted: usize,
    pub words_deleted: usize,
}

impl ChangeSummary {
    pub fn is_unchanged(&self) -> bool {
        self.words_inserted == 0 && self.words_deleted == 0
    }
}

pub struct Differ;

impl Differ {
    /// Header plus colored diff of a record's source and result. `None` for
    /// failed records, which have no result to compare.
    pub fn diff_record(record: &CommandRecord, i18n: &I18n) -> Option<String> {
        let result = record.result.as_deref()?;

        let mut output = String::new();
        output.push_str(&format!(
            "{}\n",
            i18n.t_format("diff_command", &[&record.command]).bold().cyan()
        ));
        output.push_str(&format!(
            "{}\n",
            i18n.t_format("diff_time", &[&record.local_time()]).yellow()
        ));
        if let Some(info) = &record.agent_info {
            output.push_str(&i18n.t_format(
                "diff_engine",
                &[&info.model, &info.processing_time_ms.to_string()],
            ));
            output.push('\n');
        }

        let summary = Self::change_summary(&record.original_text, result);
        output.push_str(&i18n.t_format(
            "diff_word_summary",
            &[&summary.words_inserted.to_string(), &summary.words_deleted.to_string()],
        ));
        output.push_str("\n\n");

        if summary.is_unchanged() && record.original_text == result {
            output.push_str(&format!("{}\n", i18n.t("output_identical").green().bold()));
        } else {
            output.push_str(&Self::diff_text(&record.original_text, result));
        }

        Some(output)
    }

    pub fn diff_text(old: &str, new: &str) -> String {
        let mut result = String::new();

        for line in Self::diff_lines(old, new) {
            match line.tag {
                LineTag::Delete => {
                    result.push_str(&format!("{}{}\n", "-".red(), line.text.red()));
                }
                LineTag::Insert => {
                    result.push_str(&format!("{}{}\n", "+".green(), line.text.green()));
                }
                LineTag::Equal => {
                    result.push_str(&format!(" {}\n", line.text));
                }
            }
        }

        result
    }

    /// Line diff for the editor's diff pane, trailing newlines stripped.
    pub fn diff_lines(old: &str, new: &str) -> Vec<DiffLine> {
        TextDiff::from_lines(old, new)
            .iter_all_changes()
            .map(|change| DiffLine {
                tag: match change.tag() {
                    ChangeTag::Equal => LineTag::Equal,
                    ChangeTag::Insert => LineTag::Insert,
                    ChangeTag::Delete => LineTag::Delete,
                },
                text: change.value().trim_end_matches(&['\r', '\n'][..]).to_string(),
            })
            .collect()
    }

    pub fn change_summary(old: &str, new: &str) -> ChangeSummary {
        let mut summary = ChangeSummary::default();
        for change in TextDiff::from_words(old, new).iter_all_changes() {
            if change.value().trim().is_empty() {
                continue;
            }
            match change.tag() {
                ChangeTag::Insert => summary.words_inserted += 1,
                ChangeTag::Delete => summary.words_deleted += 1,
                ChangeTag::Equal => {}
            }
        }
        summary
    }
}
