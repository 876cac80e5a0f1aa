// src/validator/llm.rs
//! Chat-completions relevance judge. Tries each configured provider and each of
//! its keys in order; the first usable answer wins.

use super::{JudgeRequest, JudgeResponse, RelevanceJudge, ValidatorError, Verdict};
use crate::config::ai::{AiConfig, ProviderConfig};
use crate::trend::Category;
use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;

const TITLE_CHARS: usize = 100;
const SUMMARY_CHARS: usize = 150;

static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([\]}])").unwrap());

pub struct LlmJudge {
    http: reqwest::Client,
    providers: Vec<ProviderConfig>,
    max_tokens: u32,
}

impl LlmJudge {
    pub fn new(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("compliance-trends/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            providers: cfg
                .providers
                .iter()
                .filter(|p| !p.keys.is_empty())
                .cloned()
                .collect(),
            max_tokens: cfg.max_tokens,
        })
    }

    async fn complete(
        &self,
        provider: &ProviderConfig,
        key: &str,
        prompt: &str,
    ) -> Result<String, ValidatorError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &provider.model,
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
            temperature: 0.1,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", provider.base_url))
            .bearer_auth(key)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ValidatorError::Timeout
                } else {
                    ValidatorError::Unavailable(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ValidatorError::Unavailable(format!(
                "{} returned {status}",
                provider.name
            )));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ValidatorError::Malformed(e.to_string()))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ValidatorError::Malformed(format!("{} sent no content", provider.name)))
    }
}

#[async_trait]
impl RelevanceJudge for LlmJudge {
    async fn judge(&self, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
        if batch.is_empty() {
            return Ok(JudgeResponse::default());
        }
        let prompt = build_prompt(batch);
        let mut last = ValidatorError::Unavailable("no provider configured".into());

        for provider in &self.providers {
            for (n, key) in provider.keys.iter().enumerate() {
                tracing::debug!(target: "validator", provider = %provider.name, key = n, size = batch.len(), "calling judge");
                match self.complete(provider, key, &prompt).await {
                    Ok(content) => match parse_verdicts(&content, batch) {
                        Ok(r) => return Ok(r),
                        Err(e) => {
                            tracing::warn!(target: "validator", provider = %provider.name, error = %e, "unparseable judge answer");
                            last = e;
                        }
                    },
                    Err(e) => {
                        tracing::warn!(target: "validator", provider = %provider.name, key = n, error = %e, "judge call failed");
                        last = e;
                    }
                }
            }
        }
        Err(last)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Numbered (1-based) batch listing plus the answer contract.
pub fn build_prompt(batch: &[JudgeRequest]) -> String {
    let mut items = String::new();
    for (i, r) in batch.iter().enumerate() {
        let _ = writeln!(
            items,
            "{}. Title: {}\n   Description: {}\n   Current Category: {}\n   Source: {}",
            i + 1,
            truncate(&r.title, TITLE_CHARS),
            truncate(&r.summary, SUMMARY_CHARS),
            r.category,
            r.source_name
        );
    }

    let mut categories = String::new();
    for c in Category::ALL {
        let _ = writeln!(categories, "   - {}: {}", c.label(), category_hint(c));
    }

    format!(
        "You are a content moderator for CMMC Watch, a news aggregator covering the CMMC program, \
NIST 800-171/800-172 compliance, Defense Industrial Base cybersecurity, federal cyber policy affecting \
defense contractors, espionage and nation-state threats, and insider threats.

For each of these {n} stories decide:
1. Is it RELEVANT to that focus? (true/false)
2. Which category fits best? Choose from:
{categories}3. If irrelevant, why?

Irrelevant: career advice and job hunting, certification training questions, generic non-US politics \
(unless espionage related), generic consumer security news, non-cyber federal agencies, personal rants, \
community meta posts.

STORIES:
{items}
Respond with ONLY a JSON array. Each element has:
- index: story number (1-based)
- relevant: boolean
- category: one of the categories above
- reason: string, only when relevant is false

Example:
[
  {{\"index\": 1, \"relevant\": true, \"category\": \"cmmc_program\"}},
  {{\"index\": 2, \"relevant\": false, \"category\": \"federal_cybersecurity\", \"reason\": \"Canadian financial news\"}}
]",
        n = batch.len()
    )
}

fn category_hint(c: Category) -> &'static str {
    match c {
        Category::CmmcProgram => "CMMC certification, C3PAO, Cyber-AB, assessments",
        Category::NistCompliance => "NIST frameworks, DFARS, FedRAMP, FISMA, CUI",
        Category::IntelligenceThreats => "espionage, nation-state hackers, APTs, foreign agents",
        Category::InsiderThreats => "insider risk, data exfiltration, clearance issues",
        Category::DefenseIndustrialBase => "DoD contractors, Pentagon, defense contracts",
        Category::FederalCybersecurity => "CISA, federal cyber policy, government IT security",
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    index: Option<i64>,
    #[serde(default = "yes")]
    relevant: bool,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

fn yes() -> bool {
    true
}

/// Extract verdicts from a free-text answer. Out-of-range or missing indices
/// are ignored; unknown category labels become "no correction".
pub fn parse_verdicts(content: &str, batch: &[JudgeRequest]) -> Result<JudgeResponse, ValidatorError> {
    let raw = JSON_ARRAY
        .find(content)
        .ok_or_else(|| ValidatorError::Malformed("no JSON array in answer".into()))?
        .as_str();
    let cleaned = TRAILING_COMMA.replace_all(raw, "$1");
    let entries: Vec<RawVerdict> =
        serde_json::from_str(&cleaned).map_err(|e| ValidatorError::Malformed(e.to_string()))?;

    let mut verdicts = HashMap::with_capacity(entries.len());
    for e in entries {
        let Some(idx) = e.index.filter(|i| *i >= 1 && (*i as usize) <= batch.len()) else {
            continue;
        };
        let id = batch[idx as usize - 1].id.clone();
        let reason = e
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        verdicts.insert(
            id,
            Verdict {
                relevant: e.relevant,
                category: e.category.as_deref().and_then(Category::resolve_label),
                reason,
            },
        );
    }
    Ok(JudgeResponse { verdicts })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<JudgeRequest> {
        ["a", "b", "c"]
            .iter()
            .map(|id| JudgeRequest {
                id: id.to_string(),
                title: format!("title {id}"),
                summary: "x".repeat(300),
                category: Category::FederalCybersecurity,
                source_name: "fedscoop".into(),
            })
            .collect()
    }

    #[test]
    fn parses_array_wrapped_in_prose_with_trailing_commas() {
        let answer = r#"Sure, here you go:
[
  {"index": 1, "relevant": true, "category": "cmmc_program"},
  {"index": 2, "relevant": false, "category": "federal_cybersecurity", "reason": "off topic",},
  {"index": 9, "relevant": false},
]
Hope that helps."#;
        let r = parse_verdicts(answer, &batch()).unwrap();
        assert_eq!(r.verdicts.len(), 2);
        assert_eq!(r.verdicts["a"].category, Some(Category::CmmcProgram));
        assert!(!r.verdicts["b"].relevant);
        assert_eq!(r.verdicts["b"].reason.as_deref(), Some("off topic"));
        assert!(!r.verdicts.contains_key("c"));
    }

    #[test]
    fn unknown_category_means_no_correction() {
        let r = parse_verdicts(r#"[{"index": 3, "relevant": true, "category": "sports"}]"#, &batch())
            .unwrap();
        assert_eq!(r.verdicts["c"].category, None);
    }

    #[test]
    fn no_array_is_malformed() {
        assert!(matches!(
            parse_verdicts("I cannot help with that.", &batch()),
            Err(ValidatorError::Malformed(_))
        ));
    }

    #[test]
    fn prompt_is_numbered_and_truncated() {
        let p = build_prompt(&batch());
        assert!(p.contains("1. Title: title a"));
        assert!(p.contains("3. Title: title c"));
        assert!(p.contains(&format!("Description: {}\n", "x".repeat(150))));
        assert!(!p.contains(&"x".repeat(151)));
        assert!(p.contains("insider_threats"));
    }
}
