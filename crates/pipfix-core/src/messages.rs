//! User-facing messages and locale resolution.
//!
//! Every message the CLI can print is a variant of [`Message`], rendered
//! per locale through a single lookup. The Chinese catalog is partial on
//! purpose; untranslated variants fall back to English per message.

use std::fmt;

/// Display locales the catalog covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Zh,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => f.write_str("en"),
            Locale::Zh => f.write_str("zh"),
        }
    }
}

/// The system locale, from the usual environment variables.
pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Resolve the display locale.
///
/// The asymmetry here is deliberate: an *unset* language on a Chinese
/// system locale defaults to `zh`, while an *explicitly invalid* value
/// warns and forces `en` even on a Chinese system.
pub fn resolve_locale(explicit: Option<&str>, system: Option<&str>) -> Locale {
    match explicit.map(str::to_lowercase).as_deref() {
        Some("en") => Locale::En,
        Some("zh") => Locale::Zh,
        Some(other) if !other.is_empty() => {
            tracing::warn!(specified = %other, "invalid language setting, defaulting to en");
            Locale::En
        }
        _ => {
            if system.is_some_and(|s| s.to_lowercase().starts_with("zh")) {
                Locale::Zh
            } else {
                Locale::En
            }
        }
    }
}

/// Everything the CLI says to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<'a> {
    Usage,
    Running { command: &'a str },
    InstallSuccess,
    InstallFail,
    AttemptingFix,
    Suggestion { text: &'a str },
    Uncertain,
    NoSuggestion,
    FilterStart,
    FilterNoSafeCommands,
    RejectedDisallowed { line: &'a str },
    RejectedNoMatch { line: &'a str },
    RejectedReplay { line: &'a str },
    RejectedParse { line: &'a str },
    ProposingCommand { command: &'a str },
    ConfirmPrompt,
    ExecutingCommand,
    SkippingExecution,
    CommandSuccess { command: &'a str },
    CommandFail { command: &'a str, code: i32 },
    FixAttempted,
    FixNotApplied,
    FixedFileCreated { filename: &'a str },
    FixedFileFailed { error: &'a str },
    InvalidServerUrl { url: &'a str },
    NetworkError { detail: &'a str },
    ServerError { status: u16 },
    JsonError { detail: &'a str },
    ServiceUnavailable { url: &'a str },
    MissingPackageName,
    Interrupted,
}

impl Message<'_> {
    /// Render this message in the given locale, falling back to English
    /// for variants the locale does not translate.
    pub fn render(&self, locale: Locale) -> String {
        match locale {
            Locale::En => self.en(),
            Locale::Zh => self.zh().unwrap_or_else(|| self.en()),
        }
    }

    fn en(&self) -> String {
        match self {
            Message::Usage => {
                "Usage: pipfix install <package_name or -r requirements.txt> [other pip options]"
                    .to_string()
            }
            Message::Running { command } => format!("[pipfix] Running: {command}"),
            Message::InstallSuccess => "[pipfix] Installation successful!".to_string(),
            Message::InstallFail => "[pipfix] Installation failed.".to_string(),
            Message::AttemptingFix => "[pipfix] Attempting advisory fix...".to_string(),
            Message::Suggestion { text } => format!("[pipfix] Suggestion:\n{text}"),
            Message::Uncertain => {
                "[pipfix] The advisory service is uncertain or provided no suitable pip command fix."
                    .to_string()
            }
            Message::NoSuggestion => "[pipfix] No suggestion provided.".to_string(),
            Message::FilterStart => {
                "[pipfix] Filtering suggested commands for safety...".to_string()
            }
            Message::FilterNoSafeCommands => {
                "[pipfix Error] No safe commands found in the suggestion.".to_string()
            }
            Message::RejectedDisallowed { line } => {
                format!("  Skipping unsafe: contains disallowed substring - {line}")
            }
            Message::RejectedNoMatch { line } => {
                format!("  Skipping unsafe: doesn't match allowed patterns - {line}")
            }
            Message::RejectedReplay { line } => {
                format!("  Skipping redundant: re-runs the original requirements file - {line}")
            }
            Message::RejectedParse { line } => {
                format!("  Skipping unparsable: {line}")
            }
            Message::ProposingCommand { command } => {
                format!("[pipfix] Proposed fix command: {command}")
            }
            Message::ConfirmPrompt => "Execute this command? [y/N]: ".to_string(),
            Message::ExecutingCommand => "[pipfix] Executing command...".to_string(),
            Message::SkippingExecution => {
                "[pipfix] Skipping execution due to user input.".to_string()
            }
            Message::CommandSuccess { command } => {
                format!("[pipfix] Command '{command}' executed successfully.")
            }
            Message::CommandFail { command, code } => {
                format!("[pipfix Error] Command '{command}' failed with code {code}.")
            }
            Message::FixAttempted => "[pipfix] Fix commands attempted.".to_string(),
            Message::FixNotApplied => {
                "[pipfix] Fix commands were not applied (either skipped by user or failed)."
                    .to_string()
            }
            Message::FixedFileCreated { filename } => {
                format!("[pipfix] Created fixed requirements file: {filename}")
            }
            Message::FixedFileFailed { error } => {
                format!("[pipfix Warning] Failed to write fixed requirements file: {error}")
            }
            Message::InvalidServerUrl { url } => {
                format!("[pipfix Error] Invalid server URL: {url}")
            }
            Message::NetworkError { detail } => {
                format!("[pipfix Error] Network error when connecting to advisory service: {detail}")
            }
            Message::ServerError { status } => {
                format!("[pipfix Error] Server error from advisory service: {status}")
            }
            Message::JsonError { detail } => {
                format!("[pipfix Error] Failed to parse advisory service response: {detail}")
            }
            Message::ServiceUnavailable { url } => format!(
                "[pipfix Error] Advisory service unavailable at {url}. Please check the server URL and try again."
            ),
            Message::MissingPackageName => {
                "[pipfix Error] No package name or options provided. Please specify a package to install."
                    .to_string()
            }
            Message::Interrupted => "[pipfix] Operation interrupted by user".to_string(),
        }
    }

    fn zh(&self) -> Option<String> {
        let rendered = match self {
            Message::Usage => "用法: pipfix install <包名或 -r requirements.txt> [其他 pip 选项]".to_string(),
            Message::Running { command } => format!("[pipfix] 正在运行：{command}"),
            Message::InstallSuccess => "[pipfix] 安装成功。".to_string(),
            Message::InstallFail => "[pipfix] 安装失败。".to_string(),
            Message::NoSuggestion => "[pipfix] 服务未提供建议。".to_string(),
            Message::FilterStart => "[pipfix] 正在过滤建议的命令以确保安全...".to_string(),
            Message::FilterNoSafeCommands => "[pipfix 错误] 未找到任何安全的修复命令。".to_string(),
            Message::RejectedDisallowed { line } => format!("  拒绝：包含不安全片段 - {line}"),
            Message::RejectedNoMatch { line } => format!("  拒绝：不匹配允许的命令模式 - {line}"),
            Message::RejectedReplay { line } => format!("  拒绝：重复运行原始需求文件 - {line}"),
            Message::RejectedParse { line } => format!("  拒绝：无法解析 - {line}"),
            Message::ProposingCommand { command } => format!("[pipfix] 建议的修复命令：{command}"),
            Message::ConfirmPrompt => "执行此命令? [y/N]: ".to_string(),
            Message::ExecutingCommand => "[pipfix] 正在执行命令...".to_string(),
            Message::SkippingExecution => "[pipfix] 用户选择跳过执行。".to_string(),
            Message::CommandSuccess { command } => format!("[pipfix] 命令 '{command}' 执行成功。"),
            Message::CommandFail { command, code } => {
                format!("[pipfix 错误] 命令 '{command}' 执行失败，代码 {code}。")
            }
            Message::FixAttempted => "[pipfix] 已尝试执行修复命令。".to_string(),
            Message::FixNotApplied => "[pipfix] 未应用修复命令（用户跳过或执行失败）。".to_string(),
            Message::FixedFileCreated { filename } => {
                format!("[pipfix] 已创建修复后的需求文件：{filename}")
            }
            Message::FixedFileFailed { error } => {
                format!("[pipfix 警告] 生成修复后需求文件失败：{error}")
            }
            Message::InvalidServerUrl { url } => format!("[pipfix 错误] 无效的服务器 URL: {url}"),
            Message::NetworkError { detail } => {
                format!("[pipfix 错误] 连接服务时发生网络错误: {detail}")
            }
            Message::ServerError { status } => {
                format!("[pipfix 错误] 服务返回服务器错误: {status}")
            }
            Message::JsonError { detail } => format!("[pipfix 错误] 无法解析服务响应: {detail}"),
            Message::ServiceUnavailable { url } => {
                format!("[pipfix 错误] 服务不可用：{url}。请检查服务器 URL 并重试。")
            }
            Message::MissingPackageName => {
                "[pipfix 错误] 未提供包名或选项。请指定一个包来安装。".to_string()
            }
            // Untranslated: fall back to English.
            Message::AttemptingFix
            | Message::Suggestion { .. }
            | Message::Uncertain
            | Message::Interrupted => return None,
        };
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_locale_wins() {
        assert_eq!(resolve_locale(Some("zh"), Some("en_US.UTF-8")), Locale::Zh);
        assert_eq!(resolve_locale(Some("en"), Some("zh_CN.UTF-8")), Locale::En);
        assert_eq!(resolve_locale(Some("ZH"), None), Locale::Zh);
    }

    #[test]
    fn test_unset_language_follows_chinese_system_locale() {
        assert_eq!(resolve_locale(None, Some("zh_CN.UTF-8")), Locale::Zh);
        assert_eq!(resolve_locale(Some(""), Some("zh_TW.UTF-8")), Locale::Zh);
    }

    #[test]
    fn test_invalid_language_forces_english_even_on_chinese_system() {
        assert_eq!(resolve_locale(Some("fr"), Some("zh_CN.UTF-8")), Locale::En);
    }

    #[test]
    fn test_unset_language_on_other_system_is_english() {
        assert_eq!(resolve_locale(None, Some("de_DE.UTF-8")), Locale::En);
        assert_eq!(resolve_locale(None, None), Locale::En);
    }

    #[test]
    fn test_render_with_parameters() {
        let msg = Message::CommandFail {
            command: "pip install x",
            code: 2,
        };
        let rendered = msg.render(Locale::En);
        assert!(rendered.contains("pip install x"));
        assert!(rendered.contains('2'));
    }

    #[test]
    fn test_chinese_translation_used_when_present() {
        let rendered = Message::InstallSuccess.render(Locale::Zh);
        assert!(rendered.contains("安装成功"));
    }

    #[test]
    fn test_untranslated_variant_falls_back_to_english() {
        let rendered = Message::Uncertain.render(Locale::Zh);
        assert_eq!(rendered, Message::Uncertain.render(Locale::En));
    }
}
