use std::collections::HashMap;

// (key, English, Chinese)
const MESSAGES: &[(&str, &str, &str)] = &[
    // Runtime messages
    ("processing", "Processing \"{0}\" via {1}...", "正在通过 {1} 处理 \"{0}\"..."),
    ("result_header", "Result:", "结果:"),
    ("result_written", "Result written to {0}", "结果已写入 {0}"),
    ("retry_prompt", "Retry? (yes/no): ", "重试? (yes/no): "),
    ("retry_attempt", "Retrying ({0}/{1})...", "正在重试 ({0}/{1})..."),
    ("storage_memory_only", "History storage unavailable, history is kept for this session only", "历史存储不可用，历史记录仅保留在本次会话中"),
    ("no_records", "No records found", "没有找到任何记录"),
    ("history_title", "Command history ({0} of {1} records):", "命令历史 (共 {1} 条，显示 {0} 条):"),
    ("record_not_found", "No record matching {0}", "没有匹配 {0} 的记录"),
    ("status_ok", "ok", "成功"),
    ("status_failed", "failed", "失败"),
    ("reuse_running", "Re-running \"{0}\" on its original text", "在原始文本上重新执行 \"{0}\""),
    // Record details
    ("show_id", "ID", "ID"),
    ("show_command", "Command", "命令"),
    ("show_time", "Time", "时间"),
    ("show_status", "Status", "状态"),
    ("show_error", "Error", "错误"),
    ("show_engine", "Engine", "引擎"),
    ("show_tokens", "Tokens", "Token 数"),
    ("show_confidence", "Confidence", "置信度"),
    ("show_original", "Original text:", "原始文本:"),
    // Statistics
    ("stats_title", "History statistics", "历史统计"),
    ("stats_total", "Total commands: {0}", "命令总数: {0}"),
    ("stats_success", "Succeeded: {0}", "成功: {0}"),
    ("stats_failed", "Failed: {0}", "失败: {0}"),
    ("stats_rate", "Success rate: {0}%", "成功率: {0}%"),
    ("stats_avg_time", "Average processing time: {0}ms", "平均处理时间: {0}ms"),
    ("stats_models", "By engine:", "按引擎:"),
    ("stats_routes", "By operation:", "按操作:"),
    // Clean operation
    ("confirm_clean_title", "This will delete {0} history records.", "将删除 {0} 条历史记录。"),
    ("confirm_delete_prompt", "Type 'yes' to confirm: ", "输入 'yes' 确认: "),
    ("confirm_aborted", "Aborted", "已取消"),
    ("cleaned_all", "History cleared", "历史记录已清空"),
    // Diff output
    ("diff_command", "Command: {0}", "命令: {0}"),
    ("diff_time", "Time: {0}", "时间: {0}"),
    ("diff_engine", "Engine: {0} ({1}ms)", "引擎: {0} ({1}ms)"),
    ("diff_word_summary", "+{0} / -{1} words", "+{0} / -{1} 词"),
    ("output_identical", "result is identical to the original", "结果与原文完全一致"),
    // Validation and dispatch errors
    ("error_empty_command", "Please enter a command", "请输入命令"),
    ("error_empty_text", "Please enter some text to transform", "请输入要处理的文本"),
    ("error_command_too_short", "Command is too short (at least 3 characters)", "命令太短 (至少 3 个字符)"),
    ("error_empty_result", "The server returned an empty result", "服务器返回了空结果"),
    ("error_bad_request", "The request was rejected, please rephrase the command", "请求被拒绝，请修改命令"),
    ("error_server", "The server ran into an error, please try again", "服务器出错，请重试"),
    ("error_rate_limited", "Too many requests, please wait a moment and retry", "请求过多，请稍后重试"),
    ("error_timeout", "The request timed out, please try again", "请求超时，请重试"),
    ("error_connection_refused", "Cannot reach the server, is the backend running?", "无法连接服务器，后端是否已启动?"),
    ("error_unknown", "Unexpected error", "未知错误"),
    ("error_retry_exhausted", "Retry limit reached, change the command or try again later", "已达到重试上限，请修改命令或稍后再试"),
    ("error_not_retryable", "This failure cannot be retried", "该错误无法重试"),
    ("error_nothing_to_retry", "Nothing to retry", "没有可重试的命令"),
    ("error_read_input", "Failed to read input text", "读取输入文本失败"),
    ("error_write_result", "Failed to write result", "写入结果失败"),
    // Editor
    ("tui_source_title", "Source", "原文"),
    ("tui_diff_title", "Diff", "差异"),
    ("tui_command_title", "Command", "命令"),
    ("tui_history_title", "History (Enter=reuse, Ctrl-O=close)", "历史 (Enter=复用, Ctrl-O=关闭)"),
    ("tui_hint", "Enter=run  Ctrl-R=retry  Tab=focus  Ctrl-O=history  Ctrl-S=save  Esc=dismiss  Ctrl-Q=quit", "Enter=执行  Ctrl-R=重试  Tab=切换  Ctrl-O=历史  Ctrl-S=保存  Esc=关闭错误  Ctrl-Q=退出"),
    ("tui_processing", "Processing...", "处理中..."),
    ("tui_saved", "Saved to {0}", "已保存到 {0}"),
    ("tui_no_file", "No file to save to, start the editor with a file", "没有可保存的文件，请用文件启动编辑器"),
    ("tui_retry_hint", "(Ctrl-R to retry)", "(Ctrl-R 重试)"),
    ("tui_memory_only", "history not persisted", "历史未持久化"),
    ("warning_interactive_failed", "Warning: Cannot enable interactive mode", "警告: 无法启用交互式模式"),
];

pub struct I18n {
    translations: HashMap<String, HashMap<String, String>>,
    current_lang: String,
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut en = HashMap::new();
        let mut zh = HashMap::new();
        for (key, en_text, zh_text) in MESSAGES {
            en.insert(key.to_string(), en_text.to_string());
            zh.insert(key.to_string(), zh_text.to_string());
        }

        let mut translations = HashMap::new();
        translations.insert("en".to_string(), en);
        translations.insert("zh".to_string(), zh);

        // Accept several language code spellings, default to English
        let effective_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang: effective_lang.to_string(),
        }
    }

    pub fn t(&self, key: &str) -> String {
        if let Some(lang_map) = self.translations.get(&self.current_lang) {
            if let Some(value) = lang_map.get(key) {
                return value.clone();
            }
        }
        key.to_string()
    }

    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        let template = self.t(key);
        let mut result = template;
        for (i, arg) in args.iter().enumerate() {
            result = result.replace(&format!("{{{}}}", i), arg);
        }
        result
    }
}
