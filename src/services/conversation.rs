use serde_json::Map;
use uuid::Uuid;

use crate::models::{Conversation, Message};

/// CJK Unified Ideographs and its extensions, compatibility ideographs,
/// CJK compatibility symbols and compatibility forms.
const CJK_RANGES: &[(u32, u32)] = &[
    (0x3300, 0x33FF),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xF900, 0xFAFF),
    (0xFE30, 0xFE4F),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2B73F),
    (0x2B740, 0x2B81F),
    (0x2B820, 0x2CEAF),
    (0x2F800, 0x2FA1F),
];

const ENGLISH_PROMPT: &str = "Please analyze this report, identify any abnormal indicators, and recommend which hospital department I should visit. If you find any concerning values, please use web search to provide additional context about these findings.";

const CHINESE_PROMPT: &str = "1. 请分析这份报告，详细分析每个异常指标,考虑异常指标之间的相关性。\n2. 根据用户的当前地理位置，使用tavily_search工具找到排名靠前的医院，推荐排名靠前的复查医院和科室。请用中文回复。";

const ENGLISH_LABEL: &str = "Medical Report Analysis";
const CHINESE_LABEL: &str = "医疗报告分析";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLanguage {
    English,
    Chinese,
}

impl ReportLanguage {
    pub fn detect(text: &str) -> Self {
        if contains_cjk(text) {
            ReportLanguage::Chinese
        } else {
            ReportLanguage::English
        }
    }

    pub fn analysis_prompt(&self) -> &'static str {
        match self {
            ReportLanguage::English => ENGLISH_PROMPT,
            ReportLanguage::Chinese => CHINESE_PROMPT,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportLanguage::English => ENGLISH_LABEL,
            ReportLanguage::Chinese => CHINESE_LABEL,
        }
    }
}

pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| {
        let cp = c as u32;
        CJK_RANGES.iter().any(|&(lo, hi)| (lo..=hi).contains(&cp))
    })
}

/// Wrap extracted report text in a fresh single-message conversation, with
/// an analysis request in the report's language appended.
pub fn medical_report_conversation(extracted_text: &str, file_name: &str) -> Conversation {
    let language = ReportLanguage::detect(extracted_text);
    let content = format!("{}\n\n{}", extracted_text, language.analysis_prompt());

    Conversation {
        id: Uuid::new_v4().to_string(),
        name: format!("{}: {}", language.label(), file_name),
        messages: vec![Message::user("1", content)],
        folder_id: None,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_cjk_detection() {
        assert!(contains_cjk("血常规 WBC 11.8"));
        assert!(contains_cjk("\u{4E00}"));
        assert!(contains_cjk("\u{9FFF}"));
        assert!(contains_cjk("rare \u{20021} glyph"));
        assert!(!contains_cjk("Hemoglobin 13.2 g/dL"));
        assert!(!contains_cjk("Größe: 180cm, Ñ"));
        assert!(!contains_cjk(""));
    }

    #[test]
    fn test_english_report() {
        let conv = medical_report_conversation("Glucose 7.9 mmol/L (high)", "labs.pdf");

        assert_eq!(conv.name, "Medical Report Analysis: labs.pdf");
        assert!(conv.folder_id.is_none());
        assert_eq!(conv.messages.len(), 1);

        let msg = &conv.messages[0];
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.id.as_deref(), Some("1"));
        assert!(msg.content.starts_with("Glucose 7.9 mmol/L (high)\n\n"));
        assert!(msg.content.ends_with(ENGLISH_PROMPT));
    }

    #[test]
    fn test_chinese_report() {
        let conv = medical_report_conversation("血糖 7.9 mmol/L", "化验单.png");

        assert_eq!(conv.name, "医疗报告分析: 化验单.png");
        assert!(conv.messages[0].content.ends_with(CHINESE_PROMPT));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = medical_report_conversation("x", "a.png");
        let b = medical_report_conversation("x", "a.png");
        assert_ne!(a.id, b.id);
    }
}
