//! Context extraction from window titles.
//!
//! Pulls a single high-value string out of the title for known app families:
//! a URL for browsers, a message subject for mail clients, a document path
//! for office apps. Anything else yields nothing. Extraction never fails;
//! titles that don't match the expected shape simply produce `None`.

/// Extractor variant, selected once per snapshot by app identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Browser,
    Mail,
    Office,
    Other,
}

const BROWSER_APPS: &[&str] = &[
    "chrome.exe",
    "msedge.exe",
    "firefox.exe",
    "brave.exe",
    "opera.exe",
];

const MAIL_APPS: &[&str] = &["outlook.exe", "olk.exe", "thunderbird.exe"];

const OFFICE_APPS: &[&str] = &[
    "winword.exe",
    "excel.exe",
    "powerpnt.exe",
    "acrord32.exe",
];

impl Extractor {
    /// Select the extractor for an app identifier.
    pub fn for_app(app: &str) -> Self {
        let app = app.to_ascii_lowercase();
        if BROWSER_APPS.contains(&app.as_str()) {
            Extractor::Browser
        } else if MAIL_APPS.contains(&app.as_str()) {
            Extractor::Mail
        } else if OFFICE_APPS.contains(&app.as_str()) {
            Extractor::Office
        } else {
            Extractor::Other
        }
    }

    /// Extract the context string for this variant, if the title carries one.
    pub fn extract(&self, title: &str) -> Option<String> {
        if title.is_empty() {
            return None;
        }
        match self {
            Extractor::Browser => extract_url(title),
            Extractor::Mail => extract_mail_subject(title),
            Extractor::Office => extract_document_path(title),
            Extractor::Other => None,
        }
    }
}

/// Convenience entry point: select and run in one step.
pub fn extract_context(app: Option<&str>, title: Option<&str>) -> Option<String> {
    let app = app?;
    let title = title?;
    Extractor::for_app(app).extract(title)
}

/// First http(s) URL embedded in the title.
fn extract_url(title: &str) -> Option<String> {
    let start = title
        .find("https://")
        .or_else(|| title.find("http://"))?;
    let rest = &title[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '\'' | '|'))
        .unwrap_or(rest.len());
    let url = &rest[..end];
    // Protocol alone is not a URL
    if url.ends_with("://") {
        return None;
    }
    Some(url.to_string())
}

/// Subject line from a mail client title, e.g. "RE: Filing - Message (HTML)"
/// or "Inbox - user@firm.com - Outlook".
fn extract_mail_subject(title: &str) -> Option<String> {
    let lower = title.to_ascii_lowercase();
    // "Subject - Message (HTML)" style open-message titles
    if let Some(pos) = lower.find(" - message") {
        let subject = title[..pos].trim();
        if !subject.is_empty() {
            return Some(subject.to_string());
        }
    }
    // Otherwise take everything before the trailing client name
    let subject = title
        .rsplit_once(" - ")
        .map(|(head, _)| head.trim())
        .unwrap_or_else(|| title.trim());
    if subject.is_empty() {
        None
    } else {
        Some(subject.to_string())
    }
}

/// Document name or path from an office app title,
/// e.g. "Brief.docx - Word" or "C:\\cases\\Brief.docx - Word".
fn extract_document_path(title: &str) -> Option<String> {
    let head = title
        .rsplit_once(" - ")
        .map(|(head, _)| head.trim())
        .unwrap_or_else(|| title.trim());
    if head.is_empty() {
        return None;
    }
    // Only treat it as a document reference if it looks like a file
    let has_extension = head
        .rsplit('.')
        .next()
        .map(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(false);
    if has_extension || head.contains('\\') || head.contains('/') {
        Some(head.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_extractor_by_app() {
        assert_eq!(Extractor::for_app("chrome.exe"), Extractor::Browser);
        assert_eq!(Extractor::for_app("OUTLOOK.EXE"), Extractor::Mail);
        assert_eq!(Extractor::for_app("winword.exe"), Extractor::Office);
        assert_eq!(Extractor::for_app("notepad.exe"), Extractor::Other);
    }

    #[test]
    fn extracts_url_from_browser_title() {
        let context = extract_context(
            Some("chrome.exe"),
            Some("Docs https://example.com/page?q=1 - Google Chrome"),
        );
        assert_eq!(context.as_deref(), Some("https://example.com/page?q=1"));
    }

    #[test]
    fn browser_title_without_url_yields_none() {
        assert_eq!(extract_context(Some("firefox.exe"), Some("New Tab")), None);
    }

    #[test]
    fn extracts_mail_subject_from_open_message() {
        let context = extract_context(
            Some("outlook.exe"),
            Some("RE: Scheduling order - Message (HTML)"),
        );
        assert_eq!(context.as_deref(), Some("RE: Scheduling order"));
    }

    #[test]
    fn extracts_document_name_from_office_title() {
        let context = extract_context(Some("winword.exe"), Some("Brief.docx - Word"));
        assert_eq!(context.as_deref(), Some("Brief.docx"));
    }

    #[test]
    fn office_title_without_document_yields_none() {
        assert_eq!(extract_context(Some("winword.exe"), Some("Word")), None);
    }

    #[test]
    fn other_apps_yield_none() {
        assert_eq!(
            extract_context(Some("notepad.exe"), Some("https://example.com")),
            None
        );
    }
}
