//! Intent classification over the (lowercased) question text.
//!
//! The keyword sets are literal product behavior, not implementation detail
//! — kept verbatim rather than translated into some abstracted rule table.
//! Per the Unicode-aware-ASCII / raw-CJK-substring rule: `str::contains`
//! already matches CJK substrings correctly without case folding, and
//! `to_lowercase` only affects the ASCII subset, so a single lowercased copy
//! of the question is safe to match both kinds of keyword against.

use regex::Regex;
use std::sync::OnceLock;

const KB_OVERVIEW_SUBJECT: &[&str] = &["知识库", "库里", "文档"];
const KB_OVERVIEW_PREDICATE: &[&str] = &["哪些", "有什么", "概览", "统计", "多少"];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "分析", "摘要", "总结", "概括", "提炼", "解读", "报告", "说明", "解释", "对比", "区别",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "搜索", "联网", "查找", "最新", "今天", "最近", "实时", "网上", "互联网",
];
const SEARCH_REALTIME_TOPICS: &[&str] = &["天气", "股价", "新闻", "赛事", "分数", "发布会"];

fn analysis_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"这(篇|个|份)(文档|文章|资料)?(是)?(关于|讲|说)(的)?什么",
            r"核心(观点|思想|内容)是什么",
            r"(关键|重点)(要点|信息)有哪些",
            r"主要(内容|讲了什么|观点)是什么",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static analysis pattern must compile"))
        .collect()
    })
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// `kbOverviewIntent`: subject keyword AND predicate keyword.
pub fn is_kb_overview_intent(question: &str) -> bool {
    let q = question.to_lowercase();
    contains_any(&q, KB_OVERVIEW_SUBJECT) && contains_any(&q, KB_OVERVIEW_PREDICATE)
}

/// `analysisIntent`: keyword set OR one of four fixed regexes.
pub fn is_analysis_intent(question: &str) -> bool {
    let q = question.to_lowercase();
    if contains_any(&q, ANALYSIS_KEYWORDS) {
        return true;
    }
    analysis_patterns().iter().any(|pattern| pattern.is_match(&q))
}

/// `searchIntent`: only meaningful when the caller's web-search
/// setting is enabled; keyword set OR realtime-topic set.
pub fn is_search_intent(question: &str, web_search_enabled: bool) -> bool {
    if !web_search_enabled {
        return false;
    }
    let q = question.to_lowercase();
    contains_any(&q, SEARCH_KEYWORDS) || contains_any(&q, SEARCH_REALTIME_TOPICS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kb_overview_needs_both_subject_and_predicate() {
        assert!(is_kb_overview_intent("知识库里有哪些文档?"));
        assert!(!is_kb_overview_intent("知识库很好用"));
        assert!(!is_kb_overview_intent("有什么建议吗"));
    }

    #[test]
    fn analysis_keyword_set() {
        assert!(is_analysis_intent("帮我总结一下这份报告"));
        assert!(!is_analysis_intent("今天天气怎么样"));
    }

    #[test]
    fn analysis_regex_patterns() {
        assert!(is_analysis_intent("这篇文档是关于什么的"));
        assert!(is_analysis_intent("核心观点是什么"));
    }

    #[test]
    fn search_intent_requires_setting_enabled() {
        assert!(!is_search_intent("帮我搜索一下最新新闻", false));
        assert!(is_search_intent("帮我搜索一下最新新闻", true));
    }

    #[test]
    fn search_intent_realtime_topics() {
        assert!(is_search_intent("今天天气怎么样", true));
        assert!(!is_search_intent("这是什么意思", true));
    }
}
