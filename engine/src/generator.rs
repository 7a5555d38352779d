//! Ritual Generation Gateway — turns a goal into a System + MicroActions
//!
//! The external collaborator is an LLM chat endpoint asked for strict JSON.
//! One attempt against the configured provider; any failure (unreachable,
//! unparseable, structurally invalid) resolves to a deterministic fallback
//! ritual. The gateway is total: it always produces a valid plan and never
//! raises toward the caller.

use serde::Deserialize;
use tracing::{info, warn};

use crate::claude::ClaudeClient;
use crate::config::Config;
use crate::error::EngineError;
use crate::openai::OpenAiClient;
use crate::stats::DailyCount;

const WEEKDAY_TOKENS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Shown when the insight collaborator is unavailable.
const STATIC_INSIGHT: &str = "Stay consistent! Improvement comes from daily repetition.";

/// Structured generation output: one System and its MicroActions.
#[derive(Debug, Clone, Deserialize)]
pub struct RitualPlan {
    pub system_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_frequency")]
    pub frequency: String,
    #[serde(default)]
    pub time_of_day: String,
    pub micro_actions: Vec<MicroActionPlan>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MicroActionPlan {
    pub action_ideal: String,
    pub action_bad_day: String,
    pub duration_minutes: i64,
}

fn default_frequency() -> String {
    "daily".to_string()
}

/// Configured collaborator. `Offline` forces the deterministic fallback and
/// is what tests use.
pub enum Provider {
    OpenAi(OpenAiClient),
    Claude(ClaudeClient),
    Offline,
}

pub struct RitualGateway {
    provider: Provider,
}

impl RitualGateway {
    pub fn from_config(cfg: &Config) -> Self {
        let provider = match cfg.provider.as_str() {
            "claude" => Provider::Claude(ClaudeClient::new(cfg.anthropic_api_key.clone())),
            "offline" => Provider::Offline,
            _ => Provider::OpenAi(OpenAiClient::new(cfg.openai_api_key.clone())),
        };
        Self::new(provider)
    }

    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Generates a ritual plan for the goal. Total: one collaborator
    /// attempt, then the fallback plan.
    pub async fn generate_ritual(&self, goal: &str, pillar: &str, language: &str) -> RitualPlan {
        match self.try_generate(goal, pillar, language).await {
            Ok(plan) => {
                info!("ritual generated for goal: {goal}");
                plan
            }
            Err(e) => {
                warn!("ritual generation fell back for goal {goal:?}: {e}");
                fallback_ritual(goal)
            }
        }
    }

    async fn try_generate(
        &self,
        goal: &str,
        pillar: &str,
        language: &str,
    ) -> Result<RitualPlan, EngineError> {
        let system_prompt = ritual_system_prompt(language);
        let prompt = format!("Create a system for the goal: '{goal}'. Pillar: {pillar}.");
        let text = self.infer(&prompt, &system_prompt, 800, 0.7).await?;
        parse_ritual_plan(&text)
    }

    /// One-paragraph coaching summary of the 7-day series. Total: degrades
    /// to a static encouragement string.
    pub async fn weekly_insight(&self, series: &[DailyCount], language: &str) -> String {
        let lines: Vec<String> = series
            .iter()
            .map(|d| format!("{}: {} completions", d.date.format("%Y-%m-%d"), d.count))
            .collect();
        let prompt = format!(
            "Analyze this user's weekly performance in a habit-consistency system:\n{}\n\n\
             Act as a gentle, stoic coach.\n\
             1. Praise consistency where it exists.\n\
             2. Where there are misses, suggest making the habit RIDICULOUSLY smaller.\n\
             3. Give one practical tip for next week.\n\n\
             Answer in one short paragraph (max 3 sentences) in {}.",
            lines.join("\n"),
            language_name(language),
        );

        match self
            .infer(
                &prompt,
                "You are a Kaizen coach specialized in habit formation.",
                300,
                0.7,
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => STATIC_INSIGHT.to_string(),
            Err(e) => {
                warn!("weekly insight fell back: {e}");
                STATIC_INSIGHT.to_string()
            }
        }
    }

    async fn infer(
        &self,
        prompt: &str,
        system_prompt: &str,
        max_tokens: i32,
        temperature: f32,
    ) -> Result<String, EngineError> {
        match &self.provider {
            Provider::OpenAi(client) => client
                .infer(prompt, system_prompt, max_tokens, temperature)
                .await
                .map_err(|e| EngineError::CollaboratorUnavailable(e.to_string())),
            Provider::Claude(client) => client
                .infer(prompt, system_prompt, max_tokens, temperature)
                .await
                .map_err(|e| EngineError::CollaboratorUnavailable(e.to_string())),
            Provider::Offline => Err(EngineError::CollaboratorUnavailable(
                "offline provider".to_string(),
            )),
        }
    }
}

fn ritual_system_prompt(language: &str) -> String {
    format!(
        r#"You are a habit architect specialized in Kaizen and antifragility.
Your mission: convert abstract goals into repeatable systems.

RULES:
1. KAIZEN PHILOSOPHY: the first step must be ridiculously small.
2. DUAL MODES: create two versions of the routine:
   - IDEAL MODE: what to do on a normal day (challenging but doable).
   - BAD DAY MODE: the absolute minimum that keeps the chain alive (e.g. 1 push-up, read 1 sentence).
3. LANGUAGE: field values must be written in {}.
4. OUTPUT VALID JSON ONLY.

REQUIRED JSON SHAPE (keys stay in English):
{{
    "system_title": "Creative name for the ritual",
    "description": "Short explanation of why it works",
    "frequency": "daily",
    "time_of_day": "morning",
    "micro_actions": [
        {{
            "action_ideal": "Full version (e.g. Run 5km)",
            "action_bad_day": "Survival version (e.g. Put on running shoes and walk 5 minutes)",
            "duration_minutes": 30
        }}
    ]
}}"#,
        language_name(language),
    )
}

fn language_name(code: &str) -> &'static str {
    match code {
        "pt" => "PORTUGUESE",
        "es" => "SPANISH",
        _ => "ENGLISH",
    }
}

/// Parses and validates collaborator output. Markdown code fences are
/// stripped first; models wrap JSON in them despite instructions.
pub fn parse_ritual_plan(text: &str) -> Result<RitualPlan, EngineError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let plan: RitualPlan = serde_json::from_str(cleaned.trim())
        .map_err(|e| EngineError::CollaboratorUnavailable(format!("invalid JSON: {e}")))?;
    normalize_plan(plan)
}

fn normalize_plan(mut plan: RitualPlan) -> Result<RitualPlan, EngineError> {
    plan.system_title = plan.system_title.trim().to_string();
    if plan.system_title.is_empty() {
        return Err(EngineError::CollaboratorUnavailable(
            "missing system_title".into(),
        ));
    }
    plan.description = plan.description.trim().to_string();
    plan.time_of_day = plan.time_of_day.trim().to_string();
    plan.frequency = normalize_frequency(&plan.frequency);

    if plan.micro_actions.is_empty() {
        return Err(EngineError::CollaboratorUnavailable(
            "no micro actions".into(),
        ));
    }
    for action in &mut plan.micro_actions {
        action.action_ideal = action.action_ideal.trim().to_string();
        action.action_bad_day = action.action_bad_day.trim().to_string();
        if action.action_ideal.is_empty() || action.action_bad_day.is_empty() {
            return Err(EngineError::CollaboratorUnavailable(
                "blank micro action variant".into(),
            ));
        }
        if action.duration_minutes <= 0 {
            return Err(EngineError::CollaboratorUnavailable(
                "non-positive duration".into(),
            ));
        }
    }

    Ok(plan)
}

/// Normalizes a frequency to "daily" or a cleaned weekday-token list.
/// Unknown tokens are dropped; an empty result normalizes to "daily".
pub fn normalize_frequency(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    if lowered == "daily" || lowered.is_empty() {
        return "daily".to_string();
    }
    let tokens: Vec<&str> = lowered
        .split(',')
        .map(str::trim)
        .filter(|t| WEEKDAY_TOKENS.contains(t))
        .collect();
    if tokens.is_empty() {
        "daily".to_string()
    } else {
        tokens.join(",")
    }
}

/// Deterministic offline plan: one system, one micro-action, a moderate
/// ideal version and a one-minute bad-day version, both naming the goal.
pub fn fallback_ritual(goal: &str) -> RitualPlan {
    RitualPlan {
        system_title: format!("Ritual for {goal}"),
        description: "Automatically generated starter system.".to_string(),
        frequency: "daily".to_string(),
        time_of_day: "morning".to_string(),
        micro_actions: vec![MicroActionPlan {
            action_ideal: format!("Spend 20 focused minutes on: {goal}"),
            action_bad_day: format!("Spend 1 minute on: {goal}"),
            duration_minutes: 20,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_plan() {
        let text = r#"{
            "system_title": "Runner Protocol",
            "description": "Small steps compound.",
            "frequency": "daily",
            "time_of_day": "morning",
            "micro_actions": [
                {"action_ideal": "Run 5km", "action_bad_day": "Put on shoes and walk 5 minutes", "duration_minutes": 30}
            ]
        }"#;
        let plan = parse_ritual_plan(text).unwrap();
        assert_eq!(plan.system_title, "Runner Protocol");
        assert_eq!(plan.micro_actions.len(), 1);
        assert_eq!(plan.micro_actions[0].duration_minutes, 30);
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let text = "```json\n{\"system_title\": \"X\", \"micro_actions\": [{\"action_ideal\": \"a\", \"action_bad_day\": \"b\", \"duration_minutes\": 5}]}\n```";
        let plan = parse_ritual_plan(text).unwrap();
        assert_eq!(plan.system_title, "X");
        // Omitted optional fields get defaults
        assert_eq!(plan.frequency, "daily");
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_ritual_plan("not json at all").is_err());
        assert!(parse_ritual_plan("").is_err());
        assert!(parse_ritual_plan("{\"system_title\": \"X\"}").is_err());
    }

    #[test]
    fn test_empty_micro_actions_rejected() {
        let text = r#"{"system_title": "X", "micro_actions": []}"#;
        assert!(parse_ritual_plan(text).is_err());
    }

    #[test]
    fn test_blank_variant_rejected() {
        let text = r#"{"system_title": "X", "micro_actions": [
            {"action_ideal": "Run", "action_bad_day": "   ", "duration_minutes": 5}
        ]}"#;
        assert!(parse_ritual_plan(text).is_err());
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let text = r#"{"system_title": "X", "micro_actions": [
            {"action_ideal": "Run", "action_bad_day": "Walk", "duration_minutes": 0}
        ]}"#;
        assert!(parse_ritual_plan(text).is_err());
    }

    #[test]
    fn test_blank_title_rejected() {
        let text = r#"{"system_title": "  ", "micro_actions": [
            {"action_ideal": "Run", "action_bad_day": "Walk", "duration_minutes": 5}
        ]}"#;
        assert!(parse_ritual_plan(text).is_err());
    }

    #[test]
    fn test_fields_are_trimmed() {
        let text = r#"{"system_title": " X ", "frequency": "Daily", "micro_actions": [
            {"action_ideal": " Run ", "action_bad_day": " Walk ", "duration_minutes": 5}
        ]}"#;
        let plan = parse_ritual_plan(text).unwrap();
        assert_eq!(plan.system_title, "X");
        assert_eq!(plan.frequency, "daily");
        assert_eq!(plan.micro_actions[0].action_ideal, "Run");
    }

    #[test]
    fn test_normalize_frequency() {
        assert_eq!(normalize_frequency("daily"), "daily");
        assert_eq!(normalize_frequency("Daily"), "daily");
        assert_eq!(normalize_frequency(""), "daily");
        assert_eq!(normalize_frequency("every full moon"), "daily");
        assert_eq!(normalize_frequency("MON, wed ,fri"), "mon,wed,fri");
        assert_eq!(normalize_frequency("mon,xyz,sun"), "mon,sun");
    }

    #[test]
    fn test_fallback_ritual_is_total_and_names_the_goal() {
        let plan = fallback_ritual("Run 5km");
        assert!(plan.system_title.contains("Run 5km"));
        assert_eq!(plan.frequency, "daily");
        assert_eq!(plan.micro_actions.len(), 1);

        let action = &plan.micro_actions[0];
        assert!(action.action_ideal.contains("Run 5km"));
        assert!(action.action_ideal.contains("20"));
        assert_eq!(action.duration_minutes, 20);
        assert!(action.action_bad_day.contains("Run 5km"));
        assert!(action.action_bad_day.contains("1 minute"));
        assert!(!action.action_ideal.is_empty());
        assert!(!action.action_bad_day.is_empty());
    }

    #[test]
    fn test_fallback_survives_validation() {
        // The fallback must always satisfy the same rules as parsed plans
        assert!(normalize_plan(fallback_ritual("anything")).is_ok());
        assert!(normalize_plan(fallback_ritual("")).is_ok());
    }

    #[tokio::test]
    async fn test_offline_gateway_falls_back() {
        let gateway = RitualGateway::new(Provider::Offline);
        let plan = gateway.generate_ritual("Run 5km", "health", "en").await;
        assert!(plan.system_title.contains("Run 5km"));
        assert_eq!(plan.micro_actions.len(), 1);
        assert_eq!(plan.micro_actions[0].duration_minutes, 20);
    }

    #[tokio::test]
    async fn test_offline_insight_uses_static_string() {
        let gateway = RitualGateway::new(Provider::Offline);
        let insight = gateway.weekly_insight(&[], "en").await;
        assert_eq!(insight, STATIC_INSIGHT);
    }
}
