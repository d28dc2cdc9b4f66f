//! Question intent classification
//!
//! Pure keyword/pattern rules, applied in a fixed order so the same
//! question always classifies identically within a process lifetime.
//! Determinism over precision: reproducible fixtures matter more here
//! than squeezing out a few percent of accuracy.

use std::sync::OnceLock;

use regex::Regex;
use sage_config::Category;

fn code_cues() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)```|\b(fn|def|class|function|import|python|javascript|typescript|java|rust|golang)\b|\b(code|program|script|algorithm|compile|debug|bug)\b|c\+\+|console\.log|写代码|写个程序|写一个函数|代码|编程|报错",
        )
        .expect("must be valid regex")
    })
}

fn math_cues() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\\[a-z]+\{|[0-9]\s*[-+*/^=]\s*[0-9]|\b(solve|integral|derivative|equation|prove|theorem|calculate)\b|计算|证明|求解|方程|积分|导数|等于多少",
        )
        .expect("must be valid regex")
    })
}

fn reasoning_cues() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bwhy\b|\bexplain\b|step[ -]by[ -]step|\bcompare\b|\banalyze\b|为什么|推理|分析|解释|比较")
            .expect("must be valid regex")
    })
}

/// Whether the text is predominantly CJK ideographs
fn mostly_cjk(text: &str) -> bool {
    let mut total = 0usize;
    let mut cjk = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if ('\u{4e00}'..='\u{9fff}').contains(&c) {
            cjk += 1;
        }
    }
    // More than 30% ideographs counts as Chinese-language content
    total > 0 && cjk * 10 > total * 3
}

/// Assign a coarse category to a question
///
/// Never fails: empty or unrecognized input is `General`. Rules are
/// checked in priority order (code, math, reasoning, Chinese, general)
/// and the first match wins.
pub fn classify(text: &str) -> Category {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Category::General;
    }
    if code_cues().is_match(trimmed) {
        return Category::Code;
    }
    if math_cues().is_match(trimmed) {
        return Category::Math;
    }
    if reasoning_cues().is_match(trimmed) {
        return Category::Reasoning;
    }
    if mostly_cjk(trimmed) {
        return Category::ChineseNlp;
    }
    Category::General
}
