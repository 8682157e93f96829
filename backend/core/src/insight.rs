//! Chart insight prompts.
//!
//! Every chart on the cockpit can ask the model for a short commentary. The
//! chart key selects a `(system, instruction)` prompt pair; unknown keys fall
//! back to the industry pair.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::ChatMessage;

/// Model used for chart commentary unless configured otherwise.
pub const INSIGHT_MODEL: &str = "doubao-seed-1-6-251015";

/// Sampling temperature used for chart commentary unless configured otherwise.
pub const INSIGHT_TEMPERATURE: f32 = 0.7;

/// Charts that have a dedicated prompt pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    /// Industry / channel structure.
    #[default]
    Industry,
    /// Project grade distribution.
    Grade,
    /// Follow-up node funnel.
    Node,
    /// High-risk projects.
    Risk,
    /// Stagnant projects.
    Stagnant,
}

/// System prompt plus the analysis instruction appended to the user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPair {
    pub system: &'static str,
    pub instruction: &'static str,
}

impl ChartType {
    pub const ALL: [ChartType; 5] = [
        ChartType::Industry,
        ChartType::Grade,
        ChartType::Node,
        ChartType::Risk,
        ChartType::Stagnant,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            ChartType::Industry => "industry",
            ChartType::Grade => "grade",
            ChartType::Node => "node",
            ChartType::Risk => "risk",
            ChartType::Stagnant => "stagnant",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_key() == key)
    }

    /// Total lookup: unknown keys resolve to the default chart.
    pub fn resolve(key: &str) -> Self {
        match Self::from_key(key) {
            Some(chart) => chart,
            None => {
                debug!(key = %key, fallback = %Self::default(), "Unknown chart type, using default prompts");
                Self::default()
            }
        }
    }

    pub fn prompts(self) -> PromptPair {
        match self {
            ChartType::Industry => PromptPair {
                system: "你是一位商用净水行业的专业经营数据分析师。\n\
                         请基于提供的数据，生成简洁、专业的图表结论。\n\
                         要求：\n\
                         1. 用一句话总结核心发现\n\
                         2. 指出最重要的趋势或问题\n\
                         3. 给出1-2条具体可执行的建议\n\
                         4. 控制在80字以内，语言精炼",
                instruction: "请分析行业/渠道结构数据，生成结论。",
            },
            ChartType::Grade => PromptPair {
                system: "你是一位商用净水行业的专业经营数据分析师。\n\
                         请基于提供的数据，生成简洁、专业的图表结论。\n\
                         要求：\n\
                         1. 指出项目等级分布的特点\n\
                         2. 分析不同等级项目的健康情况\n\
                         3. 给出资源分配建议\n\
                         4. 控制在80字以内，语言精炼",
                instruction: "请分析项目等级结构数据，生成结论。",
            },
            ChartType::Node => PromptPair {
                system: "你是一位商用净水行业的专业经营数据分析师。\n\
                         请基于提供的数据，生成简洁、专业的图表结论。\n\
                         要求：\n\
                         1. 分析各节点的转化率情况\n\
                         2. 指出瓶颈环节\n\
                         3. 给出优化建议\n\
                         4. 控制在80字以内，语言精炼",
                instruction: "请分析跟进节点分布数据，生成结论。",
            },
            ChartType::Risk => PromptPair {
                system: "你是一位商用净水行业的专业经营数据分析师。\n\
                         请基于提供的数据，生成简洁、专业的图表结论。\n\
                         要求：\n\
                         1. 指出高风险项目的规模\n\
                         2. 分析风险来源\n\
                         3. 给出风险管控建议\n\
                         4. 控制在80字以内，语言精炼",
                instruction: "请分析高风险项目数据，生成结论。",
            },
            ChartType::Stagnant => PromptPair {
                system: "你是一位商用净水行业的专业经营数据分析师。\n\
                         请基于提供的数据，生成简洁、专业的图表结论。\n\
                         要求：\n\
                         1. 指出停滞项目的情况\n\
                         2. 分析停滞原因\n\
                         3. 给出跟进建议\n\
                         4. 控制在80字以内，语言精炼",
                instruction: "请分析停滞项目数据，生成结论。",
            },
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

/// Body of `POST /api/ai-insight`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub chart_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl InsightRequest {
    pub fn new(chart_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            chart_type: chart_type.into(),
            data,
        }
    }

    pub fn chart(&self) -> ChartType {
        ChartType::resolve(&self.chart_type)
    }
}

/// Build the `[system, user]` conversation for one insight request.
pub fn build_messages(request: &InsightRequest) -> Vec<ChatMessage> {
    let prompts = request.chart().prompts();
    // Value -> string serialization cannot fail: map keys are always strings.
    let data = serde_json::to_string(&request.data).unwrap_or_else(|_| "null".to_string());
    vec![
        ChatMessage::system(prompts.system),
        ChatMessage::user(format!("数据：{data}\n{}", prompts.instruction)),
    ]
}
